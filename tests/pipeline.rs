use image::{ DynamicImage, GrayImage, ImageBuffer, Rgb, RgbImage };
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use std::error::Error;
use std::path::{ Path, PathBuf };

use vehicle_recognition::{ Pipeline, Stage };
use vehicle_recognition::classifier::{ Prediction, VehicleClassifier };
use vehicle_recognition::color::ColorBucket;
use vehicle_recognition::config::RecognitionConfig;
use vehicle_recognition::db::SqliteRegistry;
use vehicle_recognition::error::VrError;
use vehicle_recognition::ocr::{ PageSegMode, TextRecognizer };

const FOCUS: &str = "2012_2014_Ford Focus Ön";

struct FixedClassifier(Option<usize>);

impl VehicleClassifier for FixedClassifier {
    fn classify_image(&self, _img: &RgbImage) -> Result<Prediction, VrError> {
        let index = self.0.ok_or_else(|| VrError::model("session crashed"))?;
        let labels = RecognitionConfig::default().classifier.labels;
        let mut probabilities = vec![0.05; labels.len()];
        probabilities[index] = 0.85;
        Prediction::from_probabilities(&labels, &probabilities)
    }
}

struct FixedOcr(Option<&'static str>);

impl TextRecognizer for FixedOcr {
    fn recognize_text(&self, _img: &GrayImage, _mode: PageSegMode) -> Result<String, VrError> {
        self.0.map(str::to_string).ok_or_else(|| VrError::ocr("engine unavailable"))
    }
}

fn pipeline(classifier: Option<usize>, ocr: Option<&'static str>) -> Result<Pipeline, VrError> {
    let registry = SqliteRegistry::open_in_memory()?;
    registry.add_sample_data()?;
    Pipeline::new(
        &RecognitionConfig::default(),
        Box::new(FixedClassifier(classifier)),
        Box::new(FixedOcr(ocr)),
        Box::new(registry),
    )
}

/// light car with a dark plate kept clear of the color sample points
fn white_car() -> DynamicImage {
    let mut img: RgbImage = ImageBuffer::from_pixel(600, 450, Rgb([220, 220, 220]));
    draw_filled_rect_mut(&mut img, Rect::at(240, 300).of_size(120, 50), Rgb([30, 30, 30]));
    DynamicImage::ImageRgb8(img)
}

fn save(img: &DynamicImage, dir: &Path, name: &str) -> Result<PathBuf, Box<dyn Error>> {
    let path = dir.join(name);
    img.save(&path)?;
    Ok(path)
}

#[test]
fn registered_vehicle_matches() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = save(&white_car(), dir.path(), "car.png")?;

    let report = pipeline(Some(0), Some("34 ABC-123\n"))?.process_image(&path)?;
    assert_eq!(report.vehicle.as_ref().map(|v| v.label.as_str()), Some(FOCUS));
    assert_eq!(report.color.as_ref().map(|c| c.bucket), Some(ColorBucket::White));
    let plate = report.plate.as_ref().expect("plate stage ran");
    assert!(plate.detected);
    assert_eq!(plate.plate.as_deref(), Some("34ABC123"));
    assert!(plate.is_valid_format);
    assert!(report.success());
    assert!(report.is_match());
    assert!(report.summary().contains("database   : match"));
    Ok(())
}

#[test]
fn wrong_color_does_not_match() -> Result<(), Box<dyn Error>> {
    // the sample with this make and plate is registered as Red, this car reads White
    let report = pipeline(Some(0), Some("35TEST99"))?.process_decoded(&white_car(), Path::new("car.png"));
    assert_eq!(report.plate_text(), Some("35TEST99"));
    assert!(!report.is_match());
    assert!(report.errors.is_empty());
    Ok(())
}

#[test]
fn ocr_failure_keeps_other_results() -> Result<(), Box<dyn Error>> {
    let report = pipeline(Some(0), None)?.process_decoded(&white_car(), Path::new("car.png"));
    assert!(report.vehicle.is_some());
    assert!(report.color.is_some());
    assert!(report.plate.is_none());
    assert!(!report.success());
    assert!(!report.is_match());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].stage, Stage::Plate);
    Ok(())
}

#[test]
fn classifier_failure_skips_lookup() -> Result<(), Box<dyn Error>> {
    let report = pipeline(None, Some("34ABC123"))?.process_decoded(&white_car(), Path::new("car.png"));
    assert!(report.vehicle.is_none());
    assert_eq!(report.plate_text(), Some("34ABC123"));
    assert!(!report.is_match());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].stage, Stage::Vehicle);
    Ok(())
}

#[test]
fn invalid_plate_is_still_looked_up() -> Result<(), Box<dyn Error>> {
    let report = pipeline(Some(0), Some("xyz"))?.process_decoded(&white_car(), Path::new("car.png"));
    let plate = report.plate.as_ref().expect("plate stage ran");
    assert_eq!(plate.plate.as_deref(), Some("XYZ"));
    assert!(!plate.is_valid_format);
    assert!(!report.is_match());
    assert!(report.errors.is_empty());
    Ok(())
}

#[test]
fn no_plate_region_means_no_lookup() -> Result<(), Box<dyn Error>> {
    let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(600, 450, Rgb([220, 220, 220])));
    let report = pipeline(Some(0), Some("34ABC123"))?.process_decoded(&img, Path::new("blank.png"));
    let plate = report.plate.as_ref().expect("plate stage ran");
    assert!(!plate.detected);
    assert!(plate.plate.is_none());
    assert!(!report.is_match());
    assert!(report.summary().contains("plate      : not detected"));
    Ok(())
}

#[test]
fn missing_image_is_input_error() -> Result<(), Box<dyn Error>> {
    let err = pipeline(Some(0), Some("34ABC123"))?.process_image("no/such/car.jpg").err().expect("error");
    assert!(err.is_input_error());
    Ok(())
}

#[test]
fn batch_keeps_order_and_survives_bad_input() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let good = save(&white_car(), dir.path(), "a.png")?;
    let missing = dir.path().join("b.png");

    let pipeline = pipeline(Some(0), Some("34ABC123"))?;
    let results = pipeline.process_batch(&[good.clone(), missing.clone(), good.clone()]);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, good);
    assert_eq!(results[1].0, missing);
    assert!(results[0].1.as_ref().map(|r| r.is_match()).unwrap_or(false));
    assert!(results[1].1.is_err());
    assert!(results[2].1.is_ok());
    Ok(())
}

#[test]
fn added_vehicle_becomes_matchable() -> Result<(), Box<dyn Error>> {
    let pipeline = pipeline(Some(2), Some("06 ABC 1234"))?;
    let before = pipeline.process_decoded(&white_car(), Path::new("car.png"));
    assert!(!before.is_match());

    let id = pipeline.add_vehicle("2016_2019_Honda Civic Ön", "06ABC1234", "White")?;
    assert!(id > 0);
    let after = pipeline.process_decoded(&white_car(), Path::new("car.png"));
    assert!(after.is_match());
    Ok(())
}

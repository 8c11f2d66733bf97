use image::DynamicImage;
use log::{ info, warn };
use serde::{ Deserialize, Serialize };

use std::fmt;
use std::fmt::Write as _;
use std::path::{ Path, PathBuf };

use classifier::{ Prediction, VehicleClassifier };
use color::{ ColorClassifier, ColorInfo };
use config::RecognitionConfig;
use db::VehicleRegistry;
use error::VrError;
use locator::PlateLocator;
use ocr::{ PageSegMode, TextRecognizer };
use plate_text::PlateTextNormalizer;

pub mod classifier;
pub mod color;
pub mod config;
pub mod db;
pub mod error;
pub mod locator;
pub mod ocr;
pub mod plate_text;
pub mod utils;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Vehicle,
    Plate,
    Database,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Vehicle => "vehicle recognition",
            Stage::Plate => "plate recognition",
            Stage::Database => "database lookup",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

/// What the plate stage saw. `detected` is false when no plate-like region
/// was found; `plate` is `None` when OCR produced nothing usable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlateReading {
    pub plate: Option<String>,
    pub detected: bool,
    pub raw_text: Option<String>,
    pub is_valid_format: bool,
    pub confidence: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecognitionReport {
    pub image_path: PathBuf,
    pub vehicle: Option<Prediction>,
    pub color: Option<ColorInfo>,
    pub plate: Option<PlateReading>,
    pub database_match: bool,
    pub errors: Vec<StageError>,
}

impl RecognitionReport {

    fn new(image_path: PathBuf) -> Self {
        Self {
            image_path,
            vehicle: None,
            color: None,
            plate: None,
            database_match: false,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, stage: Stage, e: VrError) {
        warn!("{} failed: {}", stage, e);
        self.errors.push(StageError { stage, message: e.to_string() });
    }

    /// normalized plate text, if any
    pub fn plate_text(&self) -> Option<&str> {
        self.plate.as_ref().and_then(|p| p.plate.as_deref())
    }

    /// every stage ran without a recorded error
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_match(&self) -> bool {
        self.database_match
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "image      : {}", self.image_path.display());
        if let Some(vehicle) = &self.vehicle {
            let _ = writeln!(out, "make/model : {} ({:.2}%)", vehicle.label, vehicle.confidence * 100.0);
        }
        if let Some(color) = &self.color {
            let rgb = color.rgb;
            let _ = writeln!(out, "color      : {} (R={} G={} B={}, {:.2}%)",
                color.bucket, rgb.r, rgb.g, rgb.b, color.confidence * 100.0);
        }
        match &self.plate {
            Some(PlateReading { plate: Some(plate), is_valid_format, confidence, .. }) => {
                let format = if *is_valid_format { "valid" } else { "invalid" };
                let _ = writeln!(out, "plate      : {} ({} format, {:.2}%)", plate, format, confidence * 100.0);
            },
            Some(_) => { let _ = writeln!(out, "plate      : not detected"); },
            None => {},
        }
        let verdict = if self.database_match { "match" } else { "no match" };
        let _ = writeln!(out, "database   : {}", verdict);
        for error in &self.errors {
            let _ = writeln!(out, "error      : {}: {}", error.stage, error.message);
        }
        out
    }
}

/// Runs make/model, color and plate recognition on an image and checks the
/// combination against the registry.
pub struct Pipeline {
    locator: PlateLocator,
    color: ColorClassifier,
    normalizer: PlateTextNormalizer,
    ocr_mode: PageSegMode,
    classifier: Box<dyn VehicleClassifier>,
    ocr: Box<dyn TextRecognizer>,
    registry: Box<dyn VehicleRegistry>,
}

impl Pipeline {

    pub fn new(
        config: &RecognitionConfig,
        classifier: Box<dyn VehicleClassifier>,
        ocr: Box<dyn TextRecognizer>,
        registry: Box<dyn VehicleRegistry>,
    ) -> Result<Self, VrError> {
        Ok(Self {
            locator: PlateLocator::new(config.locator.clone()),
            color: ColorClassifier::new(config.color.clone()),
            normalizer: PlateTextNormalizer::new(config.plate.clone())?,
            ocr_mode: config.ocr.mode,
            classifier,
            ocr,
            registry,
        })
    }

    /// Fails only when the image cannot be used at all. Collaborator failures
    /// are recorded per stage in the report and the other stages still run.
    pub fn process_image(&self, path: impl AsRef<Path>) -> Result<RecognitionReport, VrError> {
        let path = path.as_ref();
        let img = utils::open_image(path)?;
        Ok(self.process_decoded(&img, path))
    }

    pub fn process_decoded(&self, img: &DynamicImage, path: &Path) -> RecognitionReport {
        info!("processing {}", path.display());
        let mut report = RecognitionReport::new(path.to_path_buf());

        match self.classifier.classify_image(&img.to_rgb8()) {
            Ok(prediction) => {
                info!("make/model {} ({:.2})", prediction.label, prediction.confidence);
                report.vehicle = Some(prediction);
            },
            Err(e) => report.fail(Stage::Vehicle, e),
        }

        let color = self.color.classify(img);
        info!("color {} ({:.2})", color.bucket, color.confidence);
        report.color = Some(color);

        match self.read_plate(img) {
            Ok(reading) => report.plate = Some(reading),
            Err(e) => report.fail(Stage::Plate, e),
        }

        // all three inputs are required for a lookup
        let lookup = match (&report.vehicle, &report.color, report.plate_text()) {
            (Some(vehicle), Some(color), Some(plate)) => {
                Some(self.registry.exists(&vehicle.label, plate, color.bucket.name()))
            },
            _ => None,
        };
        match lookup {
            Some(Ok(found)) => {
                info!("registry {}", if found { "match" } else { "no match" });
                report.database_match = found;
            },
            Some(Err(e)) => report.fail(Stage::Database, e),
            None => info!("registry lookup skipped, recognition incomplete"),
        }
        report
    }

    /// Images are processed one after another; one bad image does not stop the rest.
    pub fn process_batch<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<(PathBuf, Result<RecognitionReport, VrError>)> {
        paths.iter()
            .map(|path| (path.as_ref().to_path_buf(), self.process_image(path)))
            .collect()
    }

    pub fn add_vehicle(&self, make_model: &str, plate: &str, color: &str) -> Result<i64, VrError> {
        let id = self.registry.insert_vehicle(make_model, plate, color)?;
        info!("vehicle added with id {}", id);
        Ok(id)
    }

    fn read_plate(&self, img: &DynamicImage) -> Result<PlateReading, VrError> {
        let mut reading = PlateReading::default();
        let region = match self.locator.locate(img) {
            Some(region) => region,
            None => {
                info!("no plate region found");
                return Ok(reading);
            },
        };
        reading.detected = true;

        let raw = self.ocr.recognize_text(&region, self.ocr_mode)?;
        reading.plate = self.normalizer.normalize(&raw);
        reading.raw_text = Some(raw);
        if let Some(plate) = &reading.plate {
            let validation = self.normalizer.validate(plate);
            info!("plate {} valid={} ({:.2})", plate, validation.is_valid_format, validation.confidence);
            reading.is_valid_format = validation.is_valid_format;
            reading.confidence = validation.confidence;
        }
        Ok(reading)
    }
}

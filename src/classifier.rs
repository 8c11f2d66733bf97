//! Make/model classification.
//!
//! The model itself is external; this module fixes the contract around it:
//! inputs are resized to the model frame with nearest-neighbour sampling and
//! fed as raw 0-255 floats, outputs are one probability per configured label.

#[cfg(feature = "tf-classifier")]
use tensorflow::{ Tensor, Session, SessionOptions, Graph, SessionRunArgs, ImportGraphDefOptions };
use image::{ RgbImage, imageops::{ self, FilterType } };
use serde::{ Deserialize, Serialize };

use std::cmp::Ordering;
use std::path::Path;

use crate::config::ClassifierConfig;
use crate::error::VrError;
use crate::utils;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: String,
    pub class_index: usize,
    pub probability: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub class_index: usize,
    pub confidence: f32,
    /// every class, most probable first
    pub all_predictions: Vec<ClassProbability>,
}

impl Prediction {

    pub fn from_probabilities(labels: &[String], probabilities: &[f32]) -> Result<Self, VrError> {
        if labels.len() != probabilities.len() {
            return Err(VrError::model(format!(
                "model produced {} probabilities for {} labels", probabilities.len(), labels.len()
            )));
        }
        let class_index = utils::argmax(probabilities).ok_or_else(|| VrError::model("model produced no output"))?;

        let mut all_predictions: Vec<ClassProbability> = labels.iter().zip(probabilities).enumerate()
            .map(|(class_index, (label, probability))| ClassProbability {
                label: label.clone(),
                class_index,
                probability: *probability,
            })
            .collect();
        all_predictions.sort_by(|a, b| b.probability.partial_cmp(&a.probability).unwrap_or(Ordering::Equal));

        Ok(Self {
            label: labels[class_index].clone(),
            class_index,
            confidence: probabilities[class_index],
            all_predictions,
        })
    }
}

pub trait VehicleClassifier {
    fn classify_image(&self, img: &RgbImage) -> Result<Prediction, VrError>;
}

/// HWC, RGB, unnormalised
pub fn preprocess(img: &RgbImage, width: u32, height: u32) -> Vec<f32> {
    let resized = imageops::resize(img, width, height, FilterType::Nearest);
    resized.into_raw().into_iter().map(|v| v as f32).collect()
}

/// Loads the classifier for `model`. Without the `tf-classifier` feature there
/// is no backend to load it with and an error is returned.
pub fn load_classifier(model: impl AsRef<Path>, config: &ClassifierConfig) -> Result<Box<dyn VehicleClassifier>, VrError> {
    let model = model.as_ref();
    if !model.exists() {
        return Err(VrError::model(format!("model file not found: {}", model.display())));
    }
    load_backend(model, config)
}

#[cfg(feature = "tf-classifier")]
fn load_backend(model: &Path, config: &ClassifierConfig) -> Result<Box<dyn VehicleClassifier>, VrError> {
    Ok(Box::new(TfClassifier::load(model, config.clone())?))
}

#[cfg(not(feature = "tf-classifier"))]
fn load_backend(model: &Path, _config: &ClassifierConfig) -> Result<Box<dyn VehicleClassifier>, VrError> {
    Err(VrError::model(format!(
        "cannot load {}: built without the tf-classifier feature", model.display()
    )))
}

/// Frozen TensorFlow graph with a single image input and a softmax output
#[cfg(feature = "tf-classifier")]
pub struct TfClassifier {
    graph: Graph,
    session: Session,
    config: ClassifierConfig,
}

#[cfg(feature = "tf-classifier")]
impl TfClassifier {

    pub fn load(pb_file: impl AsRef<Path>, config: ClassifierConfig) -> Result<Self, VrError> {
        let pb = std::fs::read(pb_file)?;
        // import graph def
        let mut graph = Graph::new();
        graph.import_graph_def(&pb, &ImportGraphDefOptions::new())?;
        let session = Session::new(&SessionOptions::new(), &graph)?;
        log::info!("classifier loaded, {} labels", config.labels.len());
        Ok(Self { graph, session, config })
    }

    fn run(&self, input: &Tensor<f32>) -> Result<Vec<f32>, VrError> {
        let graph = &self.graph;
        let mut args = SessionRunArgs::new();
        args.add_feed(&graph.operation_by_name_required(&self.config.input_op)?, 0, input);
        let token = args.request_fetch(&graph.operation_by_name_required(&self.config.output_op)?, 0);
        self.session.run(&mut args)?;
        let res: Tensor<f32> = args.fetch(token)?;
        Ok(res.to_vec())
    }
}

#[cfg(feature = "tf-classifier")]
impl VehicleClassifier for TfClassifier {

    fn classify_image(&self, img: &RgbImage) -> Result<Prediction, VrError> {
        let (width, height) = (self.config.input_width, self.config.input_height);
        let data = preprocess(img, width, height);
        let tensor = Tensor::new(&[1, height as u64, width as u64, 3]).with_values(&data)?;
        let probabilities = self.run(&tensor)?;
        Prediction::from_probabilities(&self.config.labels, &probabilities)
    }
}

#[cfg(test)]
mod test {

    use image::{ ImageBuffer, Rgb, RgbImage };

    use super::{ Prediction, load_classifier, preprocess };
    use crate::config::ClassifierConfig;
    use crate::error::VrErrorKind;

    fn labels() -> Vec<String> {
        ClassifierConfig::default().labels
    }

    #[test]
    fn prediction_picks_most_probable() {
        let prediction = Prediction::from_probabilities(&labels(), &[0.1, 0.2, 0.6, 0.1]).expect("prediction");
        assert_eq!(prediction.label, "2016_2019_Honda Civic Ön");
        assert_eq!(prediction.class_index, 2);
        assert!((prediction.confidence - 0.6).abs() < 1e-6);

        let order: Vec<usize> = prediction.all_predictions.iter().map(|p| p.class_index).collect();
        assert_eq!(order, vec![2, 1, 0, 3]);
    }

    #[test]
    fn label_count_mismatch_is_model_error() {
        let err = Prediction::from_probabilities(&labels(), &[1.0]).err().expect("error");
        assert!(matches!(err.kind(), VrErrorKind::ModelError(_)));
    }

    #[test]
    fn preprocess_keeps_raw_values() {
        let img: RgbImage = ImageBuffer::from_pixel(40, 30, Rgb([10, 20, 250]));
        let data = preprocess(&img, 45, 60);
        assert_eq!(data.len(), 45 * 60 * 3);
        assert_eq!(&data[..3], &[10.0, 20.0, 250.0]);
    }

    #[test]
    fn missing_model_is_reported() {
        let err = load_classifier("no/such/model.pb", &ClassifierConfig::default()).err().expect("error");
        assert!(matches!(err.kind(), VrErrorKind::ModelError(_)));
        assert!(!err.is_input_error());
    }
}

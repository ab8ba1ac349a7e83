use async_trait::async_trait;
use ort::{session::Session, value::Tensor};
use tracing::debug;

use super::{yolo, Classifier, ClassifierError, Detection};
use crate::{config::ConfigModel, frame::Frame};

/// YOLO detector running in-process through ONNX Runtime
pub struct OnnxClassifier {
    session: Session,
    input_size: u32,
    labels: Vec<String>,
    min_score: f32,
}

impl OnnxClassifier {
    pub fn load(config: &ConfigModel) -> Result<Self, ClassifierError> {
        let session = Session::builder()
            .and_then(|builder| builder.commit_from_file(&config.path))
            .map_err(|e| ClassifierError::ModelLoad(format!("{}: {}", config.path, e)))?;
        Ok(Self {
            session,
            input_size: config.input_size,
            labels: config.labels.clone(),
            min_score: config.min_score,
        })
    }
}

#[async_trait]
impl Classifier for OnnxClassifier {
    async fn classify(&mut self, frame: &Frame) -> Result<Vec<Detection>, ClassifierError> {
        let size = self.input_size as usize;
        let input = Tensor::from_array(([1usize, 3, size, size], yolo::to_chw(frame, self.input_size)))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        debug!(shape = ?&shape[..], "Model output");
        Ok(yolo::decode(&shape[..], data, &self.labels, self.min_score))
    }
}

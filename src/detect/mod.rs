//! Boundary to the detection model. The model itself is opaque; all the loop
//! needs is a list of labelled, scored detections per frame.

#[cfg(feature = "onnx")]
mod onnx;
mod remote;
mod yolo;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::{
    config::{ConfigModel, ModelBackend},
    frame::Frame,
};

#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;
pub use remote::RemoteClassifier;

/// Also the wire format of the remote backend: `{"label": .., "confidence": ..}`
#[derive(Debug, PartialEq, Deserialize, Clone)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    #[cfg_attr(not(feature = "onnx"), allow(dead_code))]
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

#[async_trait]
pub trait Classifier: Send {
    async fn classify(&mut self, frame: &Frame) -> Result<Vec<Detection>, ClassifierError>;
}

/// Build the configured classifier. Failing here is fatal for the process.
pub fn load(config: &ConfigModel) -> Result<Box<dyn Classifier>, ClassifierError> {
    match config.backend {
        #[cfg(feature = "onnx")]
        ModelBackend::Onnx => {
            let classifier = OnnxClassifier::load(config)?;
            info!(path = %config.path, "ONNX model loaded");
            Ok(Box::new(classifier))
        }
        #[cfg(not(feature = "onnx"))]
        ModelBackend::Onnx => Err(ClassifierError::Unsupported(
            "built without the `onnx` feature; rebuild with it or use the remote backend".into(),
        )),
        ModelBackend::Remote => {
            let classifier = RemoteClassifier::new(config)?;
            info!(endpoint = ?config.endpoint, "Remote classifier configured");
            Ok(Box::new(classifier))
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum ClassifierError {
        ModelLoad(error: String) {
            display("Could not load model: {}", error)
        }
        Unsupported(reason: String) {
            display("Classifier backend unavailable: {}", reason)
        }
        Inference(error: String) {
            display("Inference failed: {}", error)
        }
        Encode(error: image::ImageError) {
            from()
            display("Frame could not be encoded for inference: {}", error)
            source(error)
        }
        Remote(error: reqwest::Error) {
            from()
            display("Inference service request failed: {}", error)
            source(error)
        }
        Payload(error: serde_json::Error) {
            from()
            display("Inference service answered with invalid JSON: {}", error)
            source(error)
        }
    }
}

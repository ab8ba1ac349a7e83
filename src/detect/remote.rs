use async_trait::async_trait;
use reqwest::header;
use tracing::trace;

use super::{Classifier, ClassifierError, Detection};
use crate::{config::ConfigModel, frame::{self, Frame}};

const UPLOAD_QUALITY: u8 = 90;

/// Delegates inference to an HTTP service. The frame goes up as `image/jpeg`,
/// the answer is a JSON array of `{"label", "confidence"}` objects.
pub struct RemoteClassifier {
    client: reqwest::Client,
    endpoint: String,
    min_score: f32,
}

impl RemoteClassifier {
    pub fn new(config: &ConfigModel) -> Result<Self, ClassifierError> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            ClassifierError::ModelLoad("no endpoint configured for the remote backend".into())
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self::with_client(client, endpoint, config.min_score))
    }

    pub fn with_client(client: reqwest::Client, endpoint: String, min_score: f32) -> Self {
        Self {
            client,
            endpoint,
            min_score,
        }
    }
}

#[async_trait]
impl Classifier for RemoteClassifier {
    async fn classify(&mut self, frame: &Frame) -> Result<Vec<Detection>, ClassifierError> {
        let body = frame::encode_jpeg(frame, UPLOAD_QUALITY)?;
        let res = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "image/jpeg")
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        let body = res.bytes().await?;
        let detections: Vec<Detection> = serde_json::from_slice(&body)?;
        trace!(count = detections.len(), "Remote detections");
        Ok(detections
            .into_iter()
            .filter(|d| d.confidence.is_finite() && d.confidence >= self.min_score)
            .collect())
    }
}

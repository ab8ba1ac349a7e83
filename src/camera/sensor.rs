use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::ConfigSensor;

/// Auxiliary environmental status (hive moisture). Missing data never stops a cycle.
#[async_trait]
pub trait SensorReader: Send {
    async fn read_status(&mut self) -> Option<String>;
}

/// Single-shot GET of a plain text status, no retries
pub struct HttpSensorReader {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSensorReader {
    pub fn new(config: &ConfigSensor) -> Result<Self, SensorError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(SensorError::ConnectionError)?;
        Ok(Self::with_client(client, config.url.clone(), config.timeout()))
    }

    pub fn with_client(client: reqwest::Client, url: String, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }

    async fn read(&self) -> Result<String, SensorError> {
        let res = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(SensorError::ConnectionError)?;
        if res.status() != StatusCode::OK {
            return Err(SensorError::BadStatus(res.status()));
        }
        let text = res.text().await.map_err(SensorError::InvalidBody)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SensorError::Empty);
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl SensorReader for HttpSensorReader {
    async fn read_status(&mut self) -> Option<String> {
        match self.read().await {
            Ok(status) => {
                debug!(%status, "Sensor status read");
                Some(status)
            }
            Err(e) => {
                warn!(url = %self.url, "Sensor status unavailable: {}", e);
                None
            }
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum SensorError {
        ConnectionError(error: reqwest::Error) {
            display("Unable to reach sensor: {}", error)
            source(error)
        }
        BadStatus(status: StatusCode) {
            display("Sensor answered with status {}", status)
        }
        InvalidBody(error: reqwest::Error) {
            display("Sensor returned mangled response body: {}", error)
            source(error)
        }
        Empty {
            display("Sensor returned an empty status")
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{HttpSensorReader, SensorReader};
    use crate::test_support::{self, Reply};

    fn reader(url: String) -> HttpSensorReader {
        HttpSensorReader::with_client(test_support::client(), url, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_reads_trimmed_status() {
        let server = test_support::serve(vec![Reply::new(200, "text/plain", "  Soil: wet\n")]).await;
        let mut sensor = reader(format!("{}/moisture", server.url));
        assert_eq!(sensor.read_status().await.as_deref(), Some("Soil: wet"));
    }

    #[tokio::test]
    async fn test_empty_body_is_absent() {
        let server = test_support::serve(vec![Reply::new(200, "text/plain", " \r\n")]).await;
        let mut sensor = reader(server.url.clone());
        assert_eq!(sensor.read_status().await, None);
    }

    #[tokio::test]
    async fn test_single_attempt_on_error_status() {
        let server = test_support::serve(vec![
            Reply::new(500, "text/plain", "broken"),
            Reply::new(200, "text/plain", "dry"),
        ])
        .await;
        let mut sensor = reader(server.url.clone());
        assert_eq!(sensor.read_status().await, None);
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_sensor() {
        let mut sensor = reader(test_support::dead_url().await);
        assert_eq!(sensor.read_status().await, None);
    }
}

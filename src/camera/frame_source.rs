use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use tracing::{debug, trace};

use super::RetryPolicy;
use crate::{
    config::ConfigCamera,
    frame::{self, Frame},
};

/// Something that can hand over the current camera picture
#[async_trait]
pub trait FrameSource: Send {
    /// `None` means no frame could be had this time; it is not an error
    async fn fetch_frame(&mut self) -> Option<Frame>;
}

/// Pulls single snapshots from an HTTP capture endpoint (e.g. ESP32-CAM `/capture`)
pub struct HttpFrameSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    policy: RetryPolicy,
}

impl HttpFrameSource {
    pub fn new(config: &ConfigCamera) -> Result<Self, FrameError> {
        let client = reqwest::Client::builder()
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(FrameError::ConnectionError)?;
        Ok(Self::with_client(
            client,
            config.url.clone(),
            config.timeout(),
            RetryPolicy::new(config.max_retries, config.retry_delay()),
        ))
    }

    pub fn with_client(
        client: reqwest::Client,
        url: String,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            url,
            timeout,
            policy,
        }
    }

    async fn attempt(&self) -> Result<Frame, FrameError> {
        let res = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(FrameError::ConnectionError)?;
        if res.status() != StatusCode::OK {
            return Err(FrameError::BadStatus(res.status()));
        }
        // Cameras in an error state tend to answer 200 with a text page
        if let Some(content_type) = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.parse::<mime::Mime>().ok())
        {
            if content_type.type_() == mime::TEXT {
                return Err(FrameError::NotAnImage(content_type.to_string()));
            }
        }
        let body = res.bytes().await.map_err(FrameError::InvalidBody)?;
        trace!(bytes = body.len(), "Frame payload received");
        Ok(frame::decode(&body)?)
    }
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn fetch_frame(&mut self) -> Option<Frame> {
        let frame = self
            .policy
            .run(|attempt| {
                debug!(attempt, url = %self.url, "Fetching frame");
                self.attempt()
            })
            .await;
        if frame.is_none() {
            debug!(url = %self.url, "No frame after {} attempts", self.policy.max_attempts);
        }
        frame
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum FrameError {
        ConnectionError(error: reqwest::Error) {
            display("Unable to reach camera: {}", error)
            source(error)
        }
        BadStatus(status: StatusCode) {
            display("Camera answered with status {}", status)
        }
        NotAnImage(content_type: String) {
            display("Camera returned {} instead of an image", content_type)
        }
        InvalidBody(error: reqwest::Error) {
            display("Camera returned mangled response body: {}", error)
            source(error)
        }
        Undecodable(error: image::ImageError) {
            from()
            display("Frame payload could not be decoded: {}", error)
            source(error)
        }
    }
}

#[cfg(test)]
mod test {
    use std::{io::Cursor, time::Duration};

    use image::{DynamicImage, ImageOutputFormat};

    use super::{FrameSource, HttpFrameSource};
    use crate::{
        camera::RetryPolicy,
        frame::sample,
        test_support::{self, Reply},
    };

    fn png_bytes() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(sample(8, 6))
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn source(url: String, attempts: u32) -> HttpFrameSource {
        HttpFrameSource::with_client(
            test_support::client(),
            url,
            Duration::from_secs(5),
            RetryPolicy::new(attempts, Duration::from_millis(10)),
        )
    }

    #[tokio::test]
    async fn test_fetches_image() {
        let server = test_support::serve(vec![Reply::new(200, "image/png", png_bytes())]).await;
        let mut src = source(format!("{}/capture", server.url), 3);
        let frame = src.fetch_frame().await.expect("frame");
        assert_eq!(frame.dimensions(), (8, 6));
        assert_eq!(server.requests().len(), 1);
        assert!(server.requests()[0].starts_with("GET /capture "));
    }

    #[tokio::test]
    async fn test_retries_past_bad_status_and_garbage() {
        let server = test_support::serve(vec![
            Reply::new(500, "text/plain", "busy"),
            Reply::new(200, "image/jpeg", "not a jpeg"),
            Reply::new(200, "image/png", png_bytes()),
        ])
        .await;
        let mut src = source(server.url.clone(), 3);
        assert!(src.fetch_frame().await.is_some());
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_text_body_is_not_a_frame() {
        let server = test_support::serve(vec![Reply::new(200, "text/html", png_bytes())]).await;
        let mut src = source(server.url.clone(), 1);
        assert!(src.fetch_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_absent_after_exactly_max_retries() {
        let server = test_support::serve(vec![
            Reply::new(503, "text/plain", ""),
            Reply::new(503, "text/plain", ""),
            Reply::new(503, "text/plain", ""),
            Reply::new(200, "image/png", png_bytes()),
        ])
        .await;
        let mut src = source(server.url.clone(), 3);
        assert!(src.fetch_frame().await.is_none());
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_camera() {
        let mut src = source(test_support::dead_url().await, 2);
        assert!(src.fetch_frame().await.is_none());
    }
}

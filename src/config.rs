use std::{path::Path, time::Duration};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Default, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub system: ConfigSystem,
    pub camera: ConfigCamera,
    pub sensor: ConfigSensor,
    pub model: ConfigModel,
    pub recording: ConfigRecording,
    pub telegram: ConfigTelegram,
    pub alerting: ConfigAlerting,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConfigSystem {
    pub log_level: String,
    /// Emit logs as JSON lines instead of the human readable format
    pub log_json: bool,
}

impl Default for ConfigSystem {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_json: false,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConfigCamera {
    pub url: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_ms: u64,
    /// Pause between attempts while the camera is unreachable
    pub reconnect_backoff_ms: u64,
}

impl ConfigCamera {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

impl Default for ConfigCamera {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1/capture".into(),
            max_retries: 3,
            retry_delay_ms: 2000,
            timeout_ms: 5000,
            reconnect_backoff_ms: 5000,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConfigSensor {
    pub url: String,
    pub timeout_ms: u64,
}

impl ConfigSensor {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ConfigSensor {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1/moisture".into(),
            timeout_ms: 5000,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    Onnx,
    Remote,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConfigModel {
    pub backend: ModelBackend,
    pub path: String,
    /// Inference service receiving JPEG frames (remote backend only)
    pub endpoint: Option<String>,
    /// Class index to label, in model output order
    pub labels: Vec<String>,
    pub input_size: u32,
    /// Boxes scoring below this are dropped by the classifier itself
    pub min_score: f32,
    /// The class whose detections feed the alerting window
    pub target_label: String,
    pub timeout_ms: u64,
}

impl ConfigModel {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ConfigModel {
    fn default() -> Self {
        Self {
            backend: ModelBackend::Onnx,
            path: "weights/best.onnx".into(),
            endpoint: None,
            labels: vec!["wax_moth".into()],
            input_size: 640,
            min_score: 0.1,
            target_label: "wax_moth".into(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConfigRecording {
    pub enabled: bool,
    /// Base name; segments are written next to it as `<stem>-<session>-<n>.<ext>`
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub jpeg_quality: u8,
    /// Length of one file, in seconds of video
    pub segment_secs: u64,
}

impl ConfigRecording {
    pub fn segment_frames(&self) -> u64 {
        self.segment_secs.saturating_mul(u64::from(self.fps))
    }
}

impl Default for ConfigRecording {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "esp32_stream_record.avi".into(),
            width: 640,
            height: 480,
            fps: 10,
            jpeg_quality: 80,
            segment_secs: 600,
        }
    }
}

const MAX_FRAME_SIDE: u32 = 8192;
const MAX_FPS: u32 = 120;

#[derive(PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConfigTelegram {
    pub bot_token: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub chat_id: Option<String>,
    pub api_base: String,
}

// Keeps the bot token out of trace logs
impl std::fmt::Debug for ConfigTelegram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigTelegram")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for ConfigTelegram {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".into(),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConfigAlerting {
    pub check_interval_secs: u64,
    pub min_confidence: f32,
    pub high_count: usize,
    pub low_count: usize,
    pub idle_delay_ms: u64,
}

impl ConfigAlerting {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }
}

impl Default for ConfigAlerting {
    fn default() -> Self {
        Self {
            check_interval_secs: 120,
            min_confidence: 0.5,
            high_count: 5,
            low_count: 2,
            idle_delay_ms: 100,
        }
    }
}

/// Chat ids are numeric, so env / TOML may hand them over as integers
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

/// Layers built-in defaults, the optional TOML file and `HIVEWATCH_` env vars (nested keys split on `__`)
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HIVEWATCH_").split("__"))
        .extract()?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "camera.max_retries must be at least 1".into(),
            ));
        }
        let alerting = &self.alerting;
        if !(0.0..=1.0).contains(&alerting.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "alerting.min_confidence must lie in [0, 1], got {}",
                alerting.min_confidence
            )));
        }
        if alerting.low_count > alerting.high_count {
            return Err(ConfigError::Invalid(format!(
                "alerting.low_count ({}) exceeds alerting.high_count ({})",
                alerting.low_count, alerting.high_count
            )));
        }
        if alerting.check_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "alerting.check_interval_secs must be positive".into(),
            ));
        }
        let rec = &self.recording;
        let side = 1..=MAX_FRAME_SIDE;
        if !side.contains(&rec.width)
            || !side.contains(&rec.height)
            || !(1..=MAX_FPS).contains(&rec.fps)
        {
            return Err(ConfigError::Invalid(format!(
                "recording must be at most {}x{} @ {} fps and non-zero, got {}x{} @ {}",
                MAX_FRAME_SIDE, MAX_FRAME_SIDE, MAX_FPS, rec.width, rec.height, rec.fps
            )));
        }
        if !(1..=100).contains(&rec.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "recording.jpeg_quality must lie in [1, 100], got {}",
                rec.jpeg_quality
            )));
        }
        if rec.segment_secs == 0 {
            return Err(ConfigError::Invalid(
                "recording.segment_secs must be positive".into(),
            ));
        }
        if self.model.backend == ModelBackend::Remote && self.model.endpoint.is_none() {
            return Err(ConfigError::Invalid(
                "model.endpoint is required for the remote backend".into(),
            ));
        }
        if self.model.labels.is_empty() {
            return Err(ConfigError::Invalid("model.labels cannot be empty".into()));
        }
        Ok(())
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum ConfigError {
        Figment(error: figment::Error) {
            from()
            display("Unable to read configuration: {}", error)
            source(error)
        }
        Invalid(reason: String) {
            display("Invalid configuration: {}", reason)
        }
    }
}

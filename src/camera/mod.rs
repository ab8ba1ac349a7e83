mod frame_source;
mod retry;
mod sensor;

pub use frame_source::{FrameError, FrameSource, HttpFrameSource};
pub use retry::RetryPolicy;
pub use sensor::{HttpSensorReader, SensorError, SensorReader};

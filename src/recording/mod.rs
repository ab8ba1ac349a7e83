mod segments;
#[cfg(feature = "video")]
mod video;

use tracing::info;

pub use segments::SegmentedRecorder;
#[cfg(feature = "video")]
pub use video::VideoFileSink;

use crate::{config::ConfigRecording, frame::Frame};

/// Append-only destination for processed frames
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecorderError>;
    /// Flush and close. Further writes fail; calling it again is a no-op.
    fn finish(&mut self) -> Result<(), RecorderError>;
}

/// `None` when recording is switched off in the configuration
pub fn open(config: &ConfigRecording) -> Result<Option<Box<dyn FrameSink>>, RecorderError> {
    if !config.enabled {
        info!("Recording disabled");
        return Ok(None);
    }
    let recorder = open_segments(config)?;
    info!(
        path = %config.path,
        segment_secs = config.segment_secs,
        "Recording {}x{} @ {} fps",
        config.width,
        config.height,
        config.fps
    );
    Ok(Some(recorder))
}

#[cfg(feature = "video")]
fn open_segments(config: &ConfigRecording) -> Result<Box<dyn FrameSink>, RecorderError> {
    let (width, height, fps, quality) = (config.width, config.height, config.fps, config.jpeg_quality);
    let recorder = SegmentedRecorder::start(&config.path, config.segment_frames(), move |path| {
        let sink = VideoFileSink::create(path, width, height, fps, quality)?;
        Ok(Box::new(sink) as Box<dyn FrameSink>)
    })?;
    Ok(Box::new(recorder))
}

#[cfg(not(feature = "video"))]
fn open_segments(_config: &ConfigRecording) -> Result<Box<dyn FrameSink>, RecorderError> {
    Err(RecorderError::Unsupported(
        "built without the `video` feature; rebuild with it or set recording.enabled = false".into(),
    ))
}

/// Repack RGB pixels into the BGR order OpenCV encoders expect. `out` holds `width * height * 3` bytes.
#[cfg_attr(not(feature = "video"), allow(dead_code))]
fn copy_as_bgr(frame: &Frame, out: &mut [u8]) {
    for (dst, px) in out.chunks_exact_mut(3).zip(frame.pixels()) {
        dst[0] = px[2];
        dst[1] = px[1];
        dst[2] = px[0];
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum RecorderError {
        Open(path: String) {
            display("Unable to open video file {}", path)
        }
        Backend(error: String) {
            display("Video encoder failed: {}", error)
        }
        Unsupported(reason: String) {
            display("Recording unavailable: {}", reason)
        }
        SizeMismatch(width: u32, height: u32, expected_width: u32, expected_height: u32) {
            display("Frame is {}x{}, recording expects {}x{}", width, height, expected_width, expected_height)
        }
        Finished {
            display("Recording already finalized")
        }
    }
}

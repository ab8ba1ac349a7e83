use std::path::Path;

use opencv::{
    core::{Mat, Scalar, Size, CV_8UC3},
    prelude::*,
    videoio::{self, VideoWriter},
};
use tracing::debug;

use super::{copy_as_bgr, FrameSink, RecorderError};
use crate::frame::Frame;

impl From<opencv::Error> for RecorderError {
    fn from(err: opencv::Error) -> Self {
        RecorderError::Backend(err.to_string())
    }
}

/// Motion-JPEG video file written through OpenCV's `VideoWriter`
pub struct VideoFileSink {
    writer: VideoWriter,
    buffer: Mat,
    width: u32,
    height: u32,
    released: bool,
}

impl VideoFileSink {
    pub fn create(
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        quality: u8,
    ) -> Result<Self, RecorderError> {
        let cols = to_i32(width)?;
        let rows = to_i32(height)?;
        let fourcc = VideoWriter::fourcc('M', 'J', 'P', 'G')?;
        let mut writer = VideoWriter::new(
            &path.to_string_lossy(),
            fourcc,
            f64::from(fps),
            Size::new(cols, rows),
            true,
        )?;
        if !writer.is_opened()? {
            return Err(RecorderError::Open(path.display().to_string()));
        }
        if !writer.set(videoio::VIDEOWRITER_PROP_QUALITY, f64::from(quality))? {
            debug!("Encoder ignored the quality setting");
        }
        let buffer = Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(0.0))?;
        Ok(Self {
            writer,
            buffer,
            width,
            height,
            released: false,
        })
    }
}

fn to_i32(value: u32) -> Result<i32, RecorderError> {
    i32::try_from(value).map_err(|_| RecorderError::Backend(format!("dimension {} out of range", value)))
}

impl FrameSink for VideoFileSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecorderError> {
        if self.released {
            return Err(RecorderError::Finished);
        }
        let (width, height) = frame.dimensions();
        if (width, height) != (self.width, self.height) {
            return Err(RecorderError::SizeMismatch(width, height, self.width, self.height));
        }
        copy_as_bgr(frame, self.buffer.data_bytes_mut()?);
        self.writer.write(&self.buffer)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecorderError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.writer.release()?;
        Ok(())
    }
}

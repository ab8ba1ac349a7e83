//! Decoded camera frames and the conversions shared by recording and classification

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ColorType, ImageResult, RgbImage};

pub type Frame = RgbImage;

/// Decode a raw image payload (JPEG, PNG, ...) as returned by the camera
pub fn decode(bytes: &[u8]) -> ImageResult<Frame> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Resize to exactly `width` x `height`. Frames already at that size are returned untouched.
pub fn normalize(frame: Frame, width: u32, height: u32) -> Frame {
    if frame.dimensions() == (width, height) {
        return frame;
    }
    image::imageops::resize(&frame, width, height, FilterType::Triangle)
}

pub fn encode_jpeg(frame: &Frame, quality: u8) -> ImageResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        ColorType::Rgb8,
    )?;
    Ok(out.into_inner())
}

#[cfg(test)]
pub(crate) fn sample(width: u32, height: u32) -> Frame {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

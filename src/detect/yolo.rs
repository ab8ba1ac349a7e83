//! Tensor layout helpers for YOLOv8-style exports: input `[1, 3, S, S]` in
//! 0..1 RGB, output `[1, 4 + classes, anchors]` (box centre/size then per-class scores).
#![cfg_attr(not(feature = "onnx"), allow(dead_code))]

use image::imageops::FilterType;

use super::Detection;
use crate::frame::Frame;

/// Planar RGB floats for a square model input of `size` pixels
pub fn to_chw(frame: &Frame, size: u32) -> Vec<f32> {
    let resized = image::imageops::resize(frame, size, size, FilterType::Triangle);
    let plane = (size * size) as usize;
    let mut out = vec![0.0f32; plane * 3];
    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            out[c * plane + i] = pixel[c] as f32 / 255.0;
        }
    }
    out
}

/// Best class per anchor, dropping anchors scoring under `min_score`. Sorted by confidence, highest first.
pub fn decode(shape: &[i64], data: &[f32], labels: &[String], min_score: f32) -> Vec<Detection> {
    let (rows, anchors) = match shape {
        [1, rows, anchors] if *rows > 4 && *anchors > 0 => (*rows as usize, *anchors as usize),
        _ => return Vec::new(),
    };
    if data.len() < rows * anchors {
        return Vec::new();
    }
    let classes = (rows - 4).min(labels.len());
    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let best = (0..classes)
            .map(|class| (class, data[(4 + class) * anchors + anchor]))
            .filter(|(_, score)| score.is_finite())
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((class, score)) = best {
            if score >= min_score {
                detections.push(Detection::new(labels[class].clone(), score.min(1.0)));
            }
        }
    }
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    detections
}

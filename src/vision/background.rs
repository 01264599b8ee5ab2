// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Background removal via an ONNX matting model
//!
//! The segmentation network is an external pretrained capability: we load
//! its exported ONNX graph once per process and reuse the session across
//! requests. The session emits a single-channel foreground probability map
//! that becomes the alpha channel of the prepared image.

use image::{imageops::FilterType, DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use ndarray::Array4;
use ort::execution_providers::{CPU as CPUExecutionProvider, CUDA as CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{fetch_artifact, FetchError};

/// Matting model input resolution (square)
const MATTING_INPUT_SIZE: u32 = 1024;

/// Input normalization: (x/255 - MEAN) / STD
const MATTING_MEAN: f32 = 0.5;
const MATTING_STD: f32 = 1.0;

#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to initialize segmentation session: {0}")]
    Session(String),

    #[error("segmentation inference failed: {0}")]
    Inference(String),

    #[error("malformed segmentation output: {0}")]
    Malformed(String),
}

/// External background-removal capability.
///
/// Implemented by the ONNX matting session in production and by mocks in
/// tests. Configured once per process, reused across requests.
pub trait Segmenter: Send + Sync {
    /// Isolate the subject, returning a 4-channel image whose alpha channel
    /// marks subject pixels.
    fn remove_background(&self, image: &DynamicImage) -> Result<RgbaImage, SegmentationError>;
}

/// ONNX-backed matting model (RMBG / ISNet family)
pub struct OnnxSegmenter {
    session: Mutex<Session>,
    input_name: String,
}

impl OnnxSegmenter {
    /// Load the matting session from a local weights file.
    ///
    /// Tries the CUDA execution provider first and falls back to CPU, the
    /// same policy as the reconstruction engine.
    pub fn load(weights: &Path) -> Result<Self, SegmentationError> {
        let session = build_session(weights)?;
        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| SegmentationError::Session("model declares no inputs".to_string()))?;

        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }

    /// Resolve the weights from the model registry, then load.
    pub fn from_registry(repo_id: &str, weights_name: &str) -> Result<Self, SegmentationError> {
        let weights = fetch_artifact(repo_id, weights_name)?;
        Self::load(&weights)
    }
}

impl Segmenter for OnnxSegmenter {
    fn remove_background(&self, image: &DynamicImage) -> Result<RgbaImage, SegmentationError> {
        let rgb = image.to_rgb8();
        let (orig_w, orig_h) = rgb.dimensions();

        let tensor = matting_input_tensor(image);
        let input_value = Value::from_array(tensor)
            .map_err(|e| SegmentationError::Inference(e.to_string()))?;

        let mut session = self.session.lock().unwrap();
        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| SegmentationError::Inference(e.to_string()))?;
        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| SegmentationError::Inference(e.to_string()))?;

        let shape = output.shape().to_vec();
        if shape.len() != 4 || shape[0] != 1 || shape[1] != 1 {
            return Err(SegmentationError::Malformed(format!(
                "expected [1, 1, H, W] mask, got {:?}",
                shape
            )));
        }

        let (mask_h, mask_w) = (shape[2], shape[3]);
        let mut mask: Vec<f32> = output.iter().copied().collect();
        normalize_mask(&mut mask);

        let mask_image = GrayImage::from_fn(mask_w as u32, mask_h as u32, |x, y| {
            let v = mask[y as usize * mask_w + x as usize];
            Luma([(v * 255.0).round().clamp(0.0, 255.0) as u8])
        });
        let mask_full = image::imageops::resize(&mask_image, orig_w, orig_h, FilterType::Triangle);

        Ok(apply_alpha(&rgb, &mask_full))
    }
}

fn build_session(weights: &Path) -> Result<Session, SegmentationError> {
    let cuda_result = Session::builder()
        .and_then(|b| Ok(b.with_execution_providers([CUDAExecutionProvider::default().build()])?))
        .and_then(|b| Ok(b.with_optimization_level(GraphOptimizationLevel::Level3)?))
        .and_then(|mut b| b.commit_from_file(weights));

    match cuda_result {
        Ok(session) => {
            info!("✅ Segmentation session initialized on CUDA");
            Ok(session)
        }
        Err(e) => {
            warn!("⚠️  CUDA unavailable for segmentation ({}), using CPU", e);
            Session::builder()
                .and_then(|b| Ok(b.with_execution_providers([CPUExecutionProvider::default().build()])?))
                .and_then(|b| Ok(b.with_optimization_level(GraphOptimizationLevel::Level3)?))
                .and_then(|mut b| b.commit_from_file(weights))
                .map_err(|e| SegmentationError::Session(e.to_string()))
        }
    }
}

/// Resize and normalize an image into the matting model's NCHW input.
fn matting_input_tensor(image: &DynamicImage) -> Array4<f32> {
    let resized = image
        .resize_exact(MATTING_INPUT_SIZE, MATTING_INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();

    let size = MATTING_INPUT_SIZE as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let v = (pixel[c] as f32 / 255.0 - MATTING_MEAN) / MATTING_STD;
            tensor[[0, c, y as usize, x as usize]] = v;
        }
    }
    tensor
}

/// Min-max normalize raw logits into [0, 1].
pub fn normalize_mask(mask: &mut [f32]) {
    let (mut min, mut max) = (f32::INFINITY, f32::NEG_INFINITY);
    for &v in mask.iter() {
        min = min.min(v);
        max = max.max(v);
    }
    let range = max - min;
    if range <= f32::EPSILON {
        mask.fill(0.0);
        return;
    }
    for v in mask.iter_mut() {
        *v = (*v - min) / range;
    }
}

/// Attach a grayscale mask to an RGB image as its alpha channel.
pub fn apply_alpha(rgb: &image::RgbImage, mask: &GrayImage) -> RgbaImage {
    debug_assert_eq!(rgb.dimensions(), mask.dimensions());
    RgbaImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        let a = mask.get_pixel(x, y)[0];
        Rgba([p[0], p[1], p[2], a])
    })
}

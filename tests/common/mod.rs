// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures: mock model stages and request builders

use axum::body::Body;
use axum::http::{Method, Request};
use image::{DynamicImage, Rgba, RgbaImage};
use ndarray::{array, ArrayD};
use std::io::Cursor;
use std::sync::Arc;

use fabstir_3d_node::reconstruction::{Mesh, ReconstructionError, SceneCode, SceneReconstructor};
use fabstir_3d_node::vision::{SegmentationError, Segmenter};
use fabstir_3d_node::{AppState, GenerationPipeline, PipelineOptions};

/// Segmenter that marks the center half of the image as foreground.
pub struct MockSegmenter;

impl Segmenter for MockSegmenter {
    fn remove_background(&self, image: &DynamicImage) -> Result<RgbaImage, SegmentationError> {
        let rgb = image.to_rgb8();
        let (w, h) = rgb.dimensions();
        Ok(RgbaImage::from_fn(w, h, |x, y| {
            let p = rgb.get_pixel(x, y);
            let inside = x >= w / 4 && x < (3 * w) / 4 && y >= h / 4 && y < (3 * h) / 4;
            Rgba([p[0], p[1], p[2], if inside { 255 } else { 0 }])
        }))
    }
}

pub struct FailingSegmenter;

impl Segmenter for FailingSegmenter {
    fn remove_background(&self, _image: &DynamicImage) -> Result<RgbaImage, SegmentationError> {
        Err(SegmentationError::Inference(
            "mock segmentation failure".to_string(),
        ))
    }
}

/// Reconstructor that returns one fixed tetrahedron per input image and
/// enforces the same grid-resolution check as the real engine.
pub struct MockReconstructor {
    pub grid_resolution: u32,
}

impl Default for MockReconstructor {
    fn default() -> Self {
        Self {
            grid_resolution: 256,
        }
    }
}

fn tetrahedron_code() -> Result<SceneCode, ReconstructionError> {
    SceneCode::from_tensors(
        ArrayD::zeros(vec![1, 8]),
        array![
            [0.0f32, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0]
        ],
        array![[0i64, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]],
        array![
            [0.5f32, 0.5, 0.5],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0]
        ],
    )
}

impl SceneReconstructor for MockReconstructor {
    fn reconstruct(
        &self,
        images: &[image::RgbImage],
    ) -> Result<Vec<SceneCode>, ReconstructionError> {
        images.iter().map(|_| tetrahedron_code()).collect()
    }

    fn extract_mesh(
        &self,
        codes: &[SceneCode],
        resolution: u32,
        with_vertex_color: bool,
    ) -> Result<Vec<Mesh>, ReconstructionError> {
        if resolution != self.grid_resolution {
            return Err(ReconstructionError::Resolution {
                requested: resolution,
                supported: self.grid_resolution,
            });
        }
        codes.iter().map(|c| c.to_mesh(with_vertex_color)).collect()
    }
}

pub struct FailingReconstructor;

impl SceneReconstructor for FailingReconstructor {
    fn reconstruct(
        &self,
        _images: &[image::RgbImage],
    ) -> Result<Vec<SceneCode>, ReconstructionError> {
        Err(ReconstructionError::Inference(
            "mock reconstruction failure".to_string(),
        ))
    }

    fn extract_mesh(
        &self,
        _codes: &[SceneCode],
        _resolution: u32,
        _with_vertex_color: bool,
    ) -> Result<Vec<Mesh>, ReconstructionError> {
        Err(ReconstructionError::Inference(
            "mock reconstruction failure".to_string(),
        ))
    }
}

pub fn test_pipeline(
    segmenter: Arc<dyn Segmenter>,
    reconstructor: Arc<dyn SceneReconstructor>,
    options: PipelineOptions,
) -> GenerationPipeline {
    GenerationPipeline::new(segmenter, reconstructor, options)
}

pub fn mock_state() -> AppState {
    AppState {
        pipeline: Arc::new(test_pipeline(
            Arc::new(MockSegmenter),
            Arc::new(MockReconstructor::default()),
            PipelineOptions::default(),
        )),
    }
}

pub fn failing_state() -> AppState {
    AppState {
        pipeline: Arc::new(test_pipeline(
            Arc::new(MockSegmenter),
            Arc::new(FailingReconstructor),
            PipelineOptions::default(),
        )),
    }
}

/// Encode an 8x8 solid-color PNG in memory.
pub fn png_image_bytes() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(8, 8, image::Rgb([180, 40, 40]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Build a multipart POST to /generate-3d with one file field.
pub fn multipart_request(field_name: &str, payload: &[u8]) -> Request<Body> {
    let boundary = "fixture-boundary";

    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"input.png\"\r\nContent-Type: image/png\r\n\r\n",
            boundary, field_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/generate-3d")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end generation pipeline: image in, mesh file out
//!
//! Both surfaces (HTTP and CLI) drive the same pipeline; they differ only
//! in where the input comes from and where the mesh file goes.

use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{DEFAULT_FOREGROUND_RATIO, MESH_RESOLUTION};
use crate::reconstruction::{Mesh, ReconstructionError, SceneReconstructor};
use crate::vision::{
    composite_over_gray, decode_image_bytes, resize_foreground, ImageError, SegmentationError,
    Segmenter,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request carried no image at all.
    #[error("No image provided")]
    MissingImage,

    /// The submitted bytes are not a usable image.
    #[error(transparent)]
    Input(#[from] ImageError),

    #[error("background removal failed: {0}")]
    Preparation(#[from] SegmentationError),

    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),
}

impl PipelineError {
    /// True when the failure is the caller's fault (bad or missing input).
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::MissingImage | PipelineError::Input(_))
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Fraction of the output frame the subject should occupy
    pub foreground_ratio: f32,

    /// Grid resolution passed to mesh extraction
    pub mesh_resolution: u32,

    /// Flatten the prepared image over mid-gray instead of dropping alpha.
    /// The CLI path composites; the HTTP path does not.
    pub composite_over_gray: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            foreground_ratio: DEFAULT_FOREGROUND_RATIO,
            mesh_resolution: MESH_RESOLUTION,
            composite_over_gray: false,
        }
    }
}

/// Shared generation pipeline.
///
/// Holds the long-lived model sessions behind trait objects so tests can
/// substitute mocks for the heavyweight stages.
pub struct GenerationPipeline {
    segmenter: Arc<dyn Segmenter>,
    reconstructor: Arc<dyn SceneReconstructor>,
    options: PipelineOptions,
}

impl GenerationPipeline {
    pub fn new(
        segmenter: Arc<dyn Segmenter>,
        reconstructor: Arc<dyn SceneReconstructor>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            segmenter,
            reconstructor,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Isolate and normalize the subject: background removal, foreground
    /// resize, then flatten to 3 channels.
    pub fn prepare(&self, image: &DynamicImage) -> Result<image::RgbImage, PipelineError> {
        let cutout = self.segmenter.remove_background(image)?;
        let framed = resize_foreground(&cutout, self.options.foreground_ratio);

        let rgb = if self.options.composite_over_gray {
            composite_over_gray(&framed)
        } else {
            DynamicImage::ImageRgba8(framed).to_rgb8()
        };
        Ok(rgb)
    }

    /// Run the full pipeline and write the mesh to `path`.
    ///
    /// Rerunning with the same path overwrites the previous mesh file.
    pub fn generate_to_path(
        &self,
        image: &DynamicImage,
        path: &Path,
    ) -> Result<Mesh, PipelineError> {
        let prepared = self.prepare(image)?;

        info!("🔄 Running 3D reconstruction...");
        let codes = self.reconstructor.reconstruct(&[prepared])?;
        let mut meshes =
            self.reconstructor
                .extract_mesh(&codes, self.options.mesh_resolution, true)?;
        let mesh = meshes.pop().ok_or_else(|| {
            ReconstructionError::Inference("extraction produced no mesh".to_string())
        })?;

        mesh.write_obj(path)
            .map_err(ReconstructionError::Export)?;
        info!(
            "✅ Mesh written to {} ({} vertices, {} faces)",
            path.display(),
            mesh.vertex_count(),
            mesh.face_count()
        );
        Ok(mesh)
    }

    /// Decode raw upload bytes, then run the full pipeline.
    pub fn generate_from_bytes(&self, bytes: &[u8], path: &Path) -> Result<Mesh, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::MissingImage);
        }
        let image = decode_image_bytes(bytes)?;
        self.generate_to_path(&image, path)
    }
}

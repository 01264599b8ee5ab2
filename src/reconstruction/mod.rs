// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image-to-3D reconstruction around the pretrained TripoSR export
//!
//! The network itself is an opaque pretrained capability. This module owns
//! the marshaling around it: building the input tensor, carrying the scene
//! code between the two pipeline steps, and unpacking geometry tensors
//! into a mesh.

pub mod engine;
pub mod mesh;

pub use engine::{Device, TsrConfig, TsrEngine};
pub use mesh::Mesh;

use image::RgbImage;
use ndarray::{Array2, ArrayD};
use thiserror::Error;

use crate::models::FetchError;

#[derive(Debug, Error)]
pub enum ReconstructionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to read model config {path}: {message}")]
    Config { path: String, message: String },

    #[error("failed to initialize inference session: {0}")]
    Session(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("malformed {tensor} tensor: {detail}")]
    Malformed { tensor: String, detail: String },

    #[error("unsupported mesh resolution {requested} (model grid is {supported})")]
    Resolution { requested: u32, supported: u32 },

    #[error("failed to write mesh file: {0}")]
    Export(std::io::Error),
}

/// External reconstruction capability.
///
/// One scene code per input image; one mesh per scene code. Implemented by
/// [`TsrEngine`] in production and by mocks in tests.
pub trait SceneReconstructor: Send + Sync {
    fn reconstruct(&self, images: &[RgbImage]) -> Result<Vec<SceneCode>, ReconstructionError>;

    fn extract_mesh(
        &self,
        codes: &[SceneCode],
        resolution: u32,
        with_vertex_color: bool,
    ) -> Result<Vec<Mesh>, ReconstructionError>;
}

/// Opaque intermediate representation for one input image.
///
/// The ONNX export fuses field decoding and surface extraction into the
/// graph, so a scene code carries the raw output tensors of one inference
/// call: the latent code plus the geometry buffers sampled at the model's
/// grid resolution. Consumed only by mesh extraction; never persisted.
#[derive(Debug)]
pub struct SceneCode {
    #[allow(dead_code)]
    code: ArrayD<f32>,
    vertices: Array2<f32>,
    faces: Array2<i64>,
    colors: Array2<f32>,
}

impl SceneCode {
    /// Wrap the raw output tensors of one reconstruction call.
    ///
    /// Shapes are validated here so extraction can assume well-formed
    /// buffers: vertices `[N, 3]`, faces `[M, 3]`, colors `[N, 3]`.
    pub fn from_tensors(
        code: ArrayD<f32>,
        vertices: Array2<f32>,
        faces: Array2<i64>,
        colors: Array2<f32>,
    ) -> Result<Self, ReconstructionError> {
        if vertices.ncols() != 3 {
            return Err(ReconstructionError::Malformed {
                tensor: "vertices".to_string(),
                detail: format!("expected [N, 3], got [N, {}]", vertices.ncols()),
            });
        }
        if faces.ncols() != 3 {
            return Err(ReconstructionError::Malformed {
                tensor: "faces".to_string(),
                detail: format!("expected [M, 3], got [M, {}]", faces.ncols()),
            });
        }
        if colors.dim() != vertices.dim() {
            return Err(ReconstructionError::Malformed {
                tensor: "vertex_colors".to_string(),
                detail: format!(
                    "expected {:?} to match vertices, got {:?}",
                    vertices.dim(),
                    colors.dim()
                ),
            });
        }

        Ok(Self {
            code,
            vertices,
            faces,
            colors,
        })
    }

    /// Unpack the geometry buffers into an explicit mesh.
    pub fn to_mesh(&self, with_vertex_color: bool) -> Result<Mesh, ReconstructionError> {
        let vertex_count = self.vertices.nrows();

        let vertices: Vec<[f32; 3]> = self
            .vertices
            .rows()
            .into_iter()
            .map(|r| [r[0], r[1], r[2]])
            .collect();

        let mut faces = Vec::with_capacity(self.faces.nrows());
        for row in self.faces.rows() {
            let mut face = [0u32; 3];
            for (i, &idx) in row.iter().enumerate() {
                if idx < 0 || idx as usize >= vertex_count {
                    return Err(ReconstructionError::Malformed {
                        tensor: "faces".to_string(),
                        detail: format!("index {} out of range for {} vertices", idx, vertex_count),
                    });
                }
                face[i] = idx as u32;
            }
            faces.push(face);
        }

        let colors = with_vertex_color.then(|| {
            self.colors
                .rows()
                .into_iter()
                .map(|r| [r[0].clamp(0.0, 1.0), r[1].clamp(0.0, 1.0), r[2].clamp(0.0, 1.0)])
                .collect()
        });

        Ok(Mesh {
            vertices,
            faces,
            colors,
        })
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime session around the pretrained reconstruction export
//!
//! Weights and configuration are loaded once at process start and shared
//! by all requests. Inference only; nothing here mutates the model.

use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;
use ort::execution_providers::{CPU as CPUExecutionProvider, CUDA as CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use serde::Deserialize;
use std::fmt;
use std::sync::Mutex;
use tracing::{info, warn};

use super::{Mesh, ReconstructionError, SceneCode, SceneReconstructor};
use crate::models::ModelArtifacts;

/// Graph output names in the TripoSR ONNX export
const OUT_SCENE_CODE: &str = "scene_code";
const OUT_VERTICES: &str = "vertices";
const OUT_FACES: &str = "faces";
const OUT_VERTEX_COLORS: &str = "vertex_colors";

fn default_input_size() -> u32 {
    512
}

fn default_grid_resolution() -> u32 {
    256
}

/// Model configuration, the first of the two registry artifacts.
#[derive(Debug, Clone, Deserialize)]
pub struct TsrConfig {
    /// Square input resolution the image is resized to
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// Grid resolution the export samples geometry at
    #[serde(default = "default_grid_resolution")]
    pub grid_resolution: u32,
}

/// Device the session ended up on after provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cuda => write!(f, "cuda"),
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

/// Pretrained reconstruction engine.
///
/// The session sits behind a `Mutex` because ort requires `&mut` to run;
/// the weights themselves are immutable after load.
pub struct TsrEngine {
    session: Mutex<Session>,
    input_name: String,
    config: TsrConfig,
    device: Device,
}

impl TsrEngine {
    /// Load the engine from resolved registry artifacts.
    ///
    /// GPU if available, else CPU: the CUDA execution provider is tried
    /// first and any failure falls back to the CPU provider.
    pub fn load(artifacts: &ModelArtifacts) -> Result<Self, ReconstructionError> {
        let config = read_config(artifacts)?;

        let (session, device) = build_session(artifacts)?;
        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| {
                ReconstructionError::Session("model declares no inputs".to_string())
            })?;

        info!(
            "✅ Reconstruction model loaded (device: {}, input: {}x{}, grid: {})",
            device, config.input_size, config.input_size, config.grid_resolution
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            config,
            device,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn config(&self) -> &TsrConfig {
        &self.config
    }

    fn run_one(&self, image: &RgbImage) -> Result<SceneCode, ReconstructionError> {
        let tensor = image_to_tensor(image, self.config.input_size);
        let input_value = Value::from_array(tensor)
            .map_err(|e| ReconstructionError::Inference(e.to_string()))?;

        let mut session = self.session.lock().unwrap();
        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| ReconstructionError::Inference(e.to_string()))?;

        let code = outputs
            .get(OUT_SCENE_CODE)
            .ok_or_else(|| missing_output(OUT_SCENE_CODE))?
            .try_extract_array::<f32>()
            .map_err(|e| malformed(OUT_SCENE_CODE, e))?
            .to_owned();

        let vertices = outputs
            .get(OUT_VERTICES)
            .ok_or_else(|| missing_output(OUT_VERTICES))?
            .try_extract_array::<f32>()
            .map_err(|e| malformed(OUT_VERTICES, e))?
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| malformed(OUT_VERTICES, e))?
            .to_owned();

        let colors = outputs
            .get(OUT_VERTEX_COLORS)
            .ok_or_else(|| missing_output(OUT_VERTEX_COLORS))?
            .try_extract_array::<f32>()
            .map_err(|e| malformed(OUT_VERTEX_COLORS, e))?
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| malformed(OUT_VERTEX_COLORS, e))?
            .to_owned();

        let faces = outputs
            .get(OUT_FACES)
            .ok_or_else(|| missing_output(OUT_FACES))?
            .try_extract_array::<i64>()
            .map_err(|e| malformed(OUT_FACES, e))?
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| malformed(OUT_FACES, e))?
            .to_owned();

        SceneCode::from_tensors(code, vertices, faces, colors)
    }
}

impl SceneReconstructor for TsrEngine {
    fn reconstruct(&self, images: &[RgbImage]) -> Result<Vec<SceneCode>, ReconstructionError> {
        images.iter().map(|image| self.run_one(image)).collect()
    }

    fn extract_mesh(
        &self,
        codes: &[SceneCode],
        resolution: u32,
        with_vertex_color: bool,
    ) -> Result<Vec<Mesh>, ReconstructionError> {
        // The export samples geometry at a fixed grid; anything else would
        // silently return meshes at the wrong density.
        if resolution != self.config.grid_resolution {
            return Err(ReconstructionError::Resolution {
                requested: resolution,
                supported: self.config.grid_resolution,
            });
        }

        codes
            .iter()
            .map(|code| code.to_mesh(with_vertex_color))
            .collect()
    }
}

fn read_config(artifacts: &ModelArtifacts) -> Result<TsrConfig, ReconstructionError> {
    let raw = std::fs::read_to_string(&artifacts.config).map_err(|e| {
        ReconstructionError::Config {
            path: artifacts.config.display().to_string(),
            message: e.to_string(),
        }
    })?;
    serde_json::from_str(&raw).map_err(|e| ReconstructionError::Config {
        path: artifacts.config.display().to_string(),
        message: e.to_string(),
    })
}

fn build_session(artifacts: &ModelArtifacts) -> Result<(Session, Device), ReconstructionError> {
    info!("   Attempting CUDA execution provider...");
    let cuda_result = Session::builder()
        .and_then(|b| Ok(b.with_execution_providers([CUDAExecutionProvider::default().build()])?))
        .and_then(|b| Ok(b.with_optimization_level(GraphOptimizationLevel::Level3)?))
        .and_then(|mut b| b.commit_from_file(&artifacts.weights));

    match cuda_result {
        Ok(session) => Ok((session, Device::Cuda)),
        Err(e) => {
            warn!("⚠️  CUDA execution provider failed: {}", e);
            warn!("   Falling back to CPU execution provider");
            let session = Session::builder()
                .and_then(|b| Ok(b.with_execution_providers([CPUExecutionProvider::default().build()])?))
                .and_then(|b| Ok(b.with_optimization_level(GraphOptimizationLevel::Level3)?))
                .and_then(|mut b| b.commit_from_file(&artifacts.weights))
                .map_err(|e| ReconstructionError::Session(e.to_string()))?;
            Ok((session, Device::Cpu))
        }
    }
}

fn missing_output(name: &str) -> ReconstructionError {
    ReconstructionError::Malformed {
        tensor: name.to_string(),
        detail: "output missing from inference result".to_string(),
    }
}

fn malformed(name: &str, e: impl fmt::Display) -> ReconstructionError {
    ReconstructionError::Malformed {
        tensor: name.to_string(),
        detail: e.to_string(),
    }
}

/// Resize and scale an RGB image into the model's NCHW input, values in [0, 1].
pub(crate) fn image_to_tensor(image: &RgbImage, input_size: u32) -> Array4<f32> {
    let resized = image::imageops::resize(image, input_size, input_size, FilterType::Triangle);

    let size = input_size as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }
    tensor
}

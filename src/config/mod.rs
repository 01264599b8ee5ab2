// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide settings loaded from the environment at startup

use std::env;
use thiserror::Error;

/// Default HTTP port for the generation endpoint
pub const DEFAULT_API_PORT: u16 = 5000;

/// Registry identifier for the pretrained reconstruction model
pub const DEFAULT_MODEL_REPO: &str = "stabilityai/TripoSR";

/// Fixed artifact names resolved from the model registry
pub const TSR_CONFIG_FILE: &str = "config.json";
pub const TSR_WEIGHTS_FILE: &str = "model.onnx";

/// Registry identifier for the background matting model
pub const DEFAULT_SEGMENTATION_REPO: &str = "briaai/RMBG-1.4";
pub const SEGMENTATION_WEIGHTS_FILE: &str = "onnx/model.onnx";

/// Fraction of the output frame the segmented subject should occupy
pub const DEFAULT_FOREGROUND_RATIO: f32 = 0.85;

/// Grid resolution for mesh extraction, shared by both front ends
pub const MESH_RESOLUTION: u32 = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is missing! Set the OPENAI_API_KEY environment variable.")]
    MissingOpenAiKey,
}

/// Settings read once at process start. Immutable afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_port: u16,
    pub model_repo: String,
    pub segmentation_repo: String,
    pub foreground_ratio: f32,
    pub mesh_resolution: u32,
    pub openai_api_key: Option<String>,
}

impl Settings {
    /// Parse settings from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_API_PORT);

        let model_repo =
            env::var("TSR_MODEL_REPO").unwrap_or_else(|_| DEFAULT_MODEL_REPO.to_string());
        let segmentation_repo = env::var("SEGMENTATION_MODEL_REPO")
            .unwrap_or_else(|_| DEFAULT_SEGMENTATION_REPO.to_string());

        let foreground_ratio = env::var("FOREGROUND_RATIO")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|r| *r > 0.0 && *r <= 1.0)
            .unwrap_or(DEFAULT_FOREGROUND_RATIO);

        let openai_api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());

        Self {
            api_port,
            model_repo,
            segmentation_repo,
            foreground_ratio,
            mesh_resolution: MESH_RESOLUTION,
            openai_api_key,
        }
    }

    /// The description service credential, required by the CLI entry point.
    ///
    /// Missing credential is a fatal configuration error: the process must
    /// refuse to start before any image processing occurs.
    pub fn require_openai_key(&self) -> Result<String, ConfigError> {
        self.openai_api_key
            .clone()
            .ok_or(ConfigError::MissingOpenAiKey)
    }
}

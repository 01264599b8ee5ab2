// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod describe;
pub mod models;
pub mod pipeline;
pub mod reconstruction;
pub mod vision;

// Re-export the main types
pub use api::{build_router, start_server, AppState};
pub use config::Settings;
pub use describe::{DescribeError, DescriptionClient, FALLBACK_DESCRIPTION};
pub use pipeline::{GenerationPipeline, PipelineError, PipelineOptions};
pub use reconstruction::{
    Device, Mesh, ReconstructionError, SceneCode, SceneReconstructor, TsrEngine,
};
pub use vision::{OnnxSegmenter, SegmentationError, Segmenter};

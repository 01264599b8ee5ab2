// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use fabstir_3d_node::config::{
    Settings, SEGMENTATION_WEIGHTS_FILE, TSR_CONFIG_FILE, TSR_WEIGHTS_FILE,
};
use fabstir_3d_node::models::fetch_model_artifacts;
use fabstir_3d_node::{
    start_server, AppState, GenerationPipeline, OnnxSegmenter, PipelineOptions, TsrEngine,
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting Fabstir 3D Generation Node...\n");

    let settings = Settings::from_env();

    println!(
        "📦 Resolving reconstruction artifacts from {}...",
        settings.model_repo
    );
    let artifacts =
        fetch_model_artifacts(&settings.model_repo, TSR_CONFIG_FILE, TSR_WEIGHTS_FILE)?;

    println!("🧠 Loading reconstruction engine...");
    let engine = TsrEngine::load(&artifacts)?;
    println!("   Device: {}", engine.device());

    println!(
        "✂️  Loading segmentation model from {}...",
        settings.segmentation_repo
    );
    let segmenter =
        OnnxSegmenter::from_registry(&settings.segmentation_repo, SEGMENTATION_WEIGHTS_FILE)?;
    println!("✅ Models ready\n");

    let pipeline = GenerationPipeline::new(
        Arc::new(segmenter),
        Arc::new(engine),
        PipelineOptions {
            foreground_ratio: settings.foreground_ratio,
            mesh_resolution: settings.mesh_resolution,
            composite_over_gray: false,
        },
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
    };
    start_server(state, settings.api_port).await
}

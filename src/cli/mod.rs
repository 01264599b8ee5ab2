// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Interactive CLI: one image in, a mesh file and a description out
//!
//! Failures after startup are reported to the terminal and the process
//! exits cleanly; only a missing API key is fatal.

use anyhow::Result;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{
    Settings, SEGMENTATION_WEIGHTS_FILE, TSR_CONFIG_FILE, TSR_WEIGHTS_FILE,
};
use crate::describe::DescriptionClient;
use crate::models::fetch_model_artifacts;
use crate::pipeline::{GenerationPipeline, PipelineOptions};
use crate::vision::{decode_image_file, OnnxSegmenter};
use crate::TsrEngine;

#[derive(Parser, Debug)]
#[command(
    name = "fabstir-3d-cli",
    about = "Generate a textured 3D mesh and a description from a single image"
)]
pub struct Cli {
    /// Path to the input image (prompted for interactively when omitted)
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Write the mesh to this exact path instead of a unique temp file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub async fn execute(cli: Cli) -> Result<()> {
    let settings = Settings::from_env();

    // The description step needs the key; fail before any model loading
    let api_key = settings.require_openai_key()?;

    let image_path = match cli.image {
        Some(path) => path,
        None => prompt_image_path()?,
    };

    if !image_path.exists() {
        println!("❌ Error: File not found!");
        println!("⚠️  Failed to generate the 3D model.");
        return Ok(());
    }

    let image = match decode_image_file(&image_path) {
        Ok(image) => image,
        Err(e) => {
            println!("❌ Error: {}", e);
            println!("⚠️  Failed to generate the 3D model.");
            return Ok(());
        }
    };

    println!("📦 Loading models...");
    let pipeline = build_pipeline(&settings)?;

    // Unique name per run so repeated invocations never clobber each other
    let output_path = cli.output.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("generated_3D_model-{}.obj", Uuid::new_v4()))
    });

    println!("🔄 Generating 3D model...");
    if let Err(e) = pipeline.generate_to_path(&image, &output_path) {
        println!("❌ Error: {}", e);
        println!("⚠️  Failed to generate the 3D model.");
        return Ok(());
    }

    println!("🖼️  Generating image description...");
    let client = DescriptionClient::new(api_key)?;
    let description = client.describe_or_fallback(&image).await;

    println!("\n🎨 **Final Results:**");
    println!("🔹 3D Model File: {}", output_path.display());
    println!("🔸 Image Description: {}", description);

    Ok(())
}

fn prompt_image_path() -> Result<PathBuf> {
    print!("📸 Enter the path of the image file: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(PathBuf::from(line.trim()))
}

fn build_pipeline(settings: &Settings) -> Result<GenerationPipeline> {
    let artifacts =
        fetch_model_artifacts(&settings.model_repo, TSR_CONFIG_FILE, TSR_WEIGHTS_FILE)?;
    let engine = TsrEngine::load(&artifacts)?;
    let segmenter =
        OnnxSegmenter::from_registry(&settings.segmentation_repo, SEGMENTATION_WEIGHTS_FILE)?;

    Ok(GenerationPipeline::new(
        Arc::new(segmenter),
        Arc::new(engine),
        PipelineOptions {
            foreground_ratio: settings.foreground_ratio,
            mesh_resolution: settings.mesh_resolution,
            composite_over_gray: true,
        },
    ))
}

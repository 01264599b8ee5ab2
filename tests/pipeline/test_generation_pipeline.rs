// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Tests for the end-to-end generation pipeline
//!
//! These tests drive the pipeline with mock model stages and verify the
//! mesh file output, error propagation, and the rerun-overwrite behavior.

use image::DynamicImage;
use std::sync::Arc;

use crate::common::{
    png_image_bytes, test_pipeline, FailingSegmenter, MockReconstructor, MockSegmenter,
};
use fabstir_3d_node::{PipelineError, PipelineOptions};

fn sample_image() -> DynamicImage {
    image::load_from_memory(&png_image_bytes()).unwrap()
}

fn default_pipeline() -> fabstir_3d_node::GenerationPipeline {
    test_pipeline(
        Arc::new(MockSegmenter),
        Arc::new(MockReconstructor::default()),
        PipelineOptions::default(),
    )
}

#[test]
fn test_generate_writes_obj_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.obj");

    let mesh = default_pipeline()
        .generate_to_path(&sample_image(), &path)
        .unwrap();

    assert_eq!(mesh.vertex_count(), 4);
    assert!(mesh.has_vertex_color());

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("# Faces: 4"));
}

#[test]
fn test_rerun_overwrites_previous_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.obj");
    let pipeline = default_pipeline();

    pipeline.generate_to_path(&sample_image(), &path).unwrap();
    let first = std::fs::read_to_string(&path).unwrap();
    pipeline.generate_to_path(&sample_image(), &path).unwrap();
    let second = std::fs::read_to_string(&path).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_empty_bytes_is_missing_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.obj");

    let err = default_pipeline()
        .generate_from_bytes(&[], &path)
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingImage));
    assert!(!path.exists());
}

#[test]
fn test_segmentation_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.obj");
    let pipeline = test_pipeline(
        Arc::new(FailingSegmenter),
        Arc::new(MockReconstructor::default()),
        PipelineOptions::default(),
    );

    let err = pipeline
        .generate_to_path(&sample_image(), &path)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Preparation(_)));
    assert!(!err.is_client_error());
}

#[test]
fn test_unsupported_resolution_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.obj");
    let pipeline = test_pipeline(
        Arc::new(MockSegmenter),
        Arc::new(MockReconstructor::default()),
        PipelineOptions {
            mesh_resolution: 128,
            ..PipelineOptions::default()
        },
    );

    let err = pipeline
        .generate_to_path(&sample_image(), &path)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Reconstruction(_)));
}

#[test]
fn test_prepare_composites_over_gray() {
    let pipeline = test_pipeline(
        Arc::new(MockSegmenter),
        Arc::new(MockReconstructor::default()),
        PipelineOptions {
            composite_over_gray: true,
            ..PipelineOptions::default()
        },
    );

    let prepared = pipeline.prepare(&sample_image()).unwrap();
    // The mock mask keeps only the center; corners land on mid-gray
    let corner = prepared.get_pixel(0, 0);
    assert_eq!(corner[0], corner[1]);
    assert_eq!(corner[1], corner[2]);
    assert!((corner[0] as i32 - 128).abs() <= 1);
}

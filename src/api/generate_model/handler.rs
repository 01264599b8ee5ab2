// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! 3D generation endpoint handler

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::Multipart;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::errors::{error_response, pipeline_error_response};
use crate::api::http_server::AppState;

/// Multipart field carrying the input image
const IMAGE_FIELD: &str = "image";

/// Download name presented to the client
const ATTACHMENT_NAME: &str = "3d_model.obj";

/// POST /generate-3d - Generate a textured 3D mesh from one image
///
/// Accepts a multipart form with an `image` field and responds with a
/// Wavefront OBJ file as an attachment.
///
/// # Errors
/// - 400 Bad Request: no `image` field, or the bytes are not a decodable image
/// - 500 Internal Server Error: background removal or reconstruction failed
pub async fn generate_model_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    let mut image_bytes: Option<Vec<u8>> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some(IMAGE_FIELD) {
                    match field.bytes().await {
                        Ok(bytes) => {
                            image_bytes = Some(bytes.to_vec());
                            break;
                        }
                        Err(e) => {
                            warn!("Failed to read image field: {}", e);
                            return error_response(
                                StatusCode::BAD_REQUEST,
                                format!("Failed to read image field: {}", e),
                            );
                        }
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart request: {}", e);
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Malformed multipart request: {}", e),
                );
            }
        }
    }

    let Some(bytes) = image_bytes else {
        warn!("Generation request without an image field");
        return error_response(StatusCode::BAD_REQUEST, "No image provided");
    };

    info!("📸 Generation request received ({} bytes)", bytes.len());

    // One file per request; reruns never collide
    let output_path = std::env::temp_dir().join(format!("model-{}.obj", Uuid::new_v4()));

    // The pipeline is CPU-bound ONNX work; keep it off the async runtime
    let pipeline = state.pipeline.clone();
    let blocking_path = output_path.clone();
    let result = tokio::task::spawn_blocking(move || {
        pipeline.generate_from_bytes(&bytes, &blocking_path)
    })
    .await;

    let mesh = match result {
        Ok(Ok(mesh)) => mesh,
        Ok(Err(e)) => {
            warn!("Generation failed: {}", e);
            return pipeline_error_response(&e);
        }
        Err(e) => {
            warn!("Generation task panicked: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "3D generation failed unexpectedly",
            );
        }
    };

    let obj_bytes = match tokio::fs::read(&output_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read generated mesh file: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read generated mesh: {}", e),
            );
        }
    };
    let _ = tokio::fs::remove_file(&output_path).await;

    info!(
        "✅ Returning mesh: {} vertices, {} faces, {} bytes",
        mesh.vertex_count(),
        mesh.face_count(),
        obj_bytes.len()
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", ATTACHMENT_NAME),
            ),
        ],
        obj_bytes,
    )
        .into_response()
}

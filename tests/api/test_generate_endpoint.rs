// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Tests for the /generate-3d endpoint
//!
//! These tests verify that:
//! - A multipart upload with an `image` field returns an OBJ attachment
//! - A request without an `image` field returns 400 with a JSON error
//! - Undecodable image bytes return 400
//! - Processing failures return 500 with a JSON error and no attachment
//! - The route rejects non-POST requests

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use tower::util::ServiceExt; // for `oneshot`

use crate::common::{failing_state, mock_state, multipart_request, png_image_bytes};
use fabstir_3d_node::build_router;

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_generate_returns_obj_attachment() {
    let app = build_router(mock_state());

    let response = app
        .oneshot(multipart_request("image", &png_image_bytes()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(disposition, "attachment; filename=\"3d_model.obj\"");

    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(body.contains("# Vertices: 4"));
    // Vertex-color OBJ lines carry six numbers
    assert!(body.lines().any(|l| l == "v 1 0 0 1 0 0"));
    assert!(body.lines().any(|l| l.starts_with("f ")));
}

#[tokio::test]
async fn test_missing_image_field_returns_400() {
    let app = build_router(mock_state());

    let response = app
        .oneshot(multipart_request("file", &png_image_bytes()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["error"], "No image provided");
}

#[tokio::test]
async fn test_undecodable_image_returns_400() {
    let app = build_router(mock_state());

    let response = app
        .oneshot(multipart_request("image", b"definitely not an image"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_processing_failure_returns_500() {
    let app = build_router(failing_state());

    let response = app
        .oneshot(multipart_request("image", &png_image_bytes()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .is_none());
    let json: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_generate_rejects_get() {
    let app = build_router(mock_state());

    let request = Request::builder()
        .method(Method::GET)
        .uri("/generate-3d")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_health_route() {
    let app = build_router(mock_state());

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "ok");
}

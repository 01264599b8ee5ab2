// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image description via the OpenAI vision chat API
//!
//! The description is a cosmetic companion to the mesh: a failure here
//! must never fail a generation run, so callers use
//! [`DescriptionClient::describe_or_fallback`] and get a fixed fallback
//! string when the upstream call degrades.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{imageops::FilterType, DynamicImage};
use reqwest::Client;
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";

const DESCRIPTION_MODEL: &str = "gpt-4-turbo-2024-04-09";

const SYSTEM_PROMPT: &str = "You are an AI that accurately describes images.";
const DESCRIBE_PROMPT: &str = "Describe this image. Identify objects, colors, and details.";

/// Returned in place of a description whenever the upstream call fails
pub const FALLBACK_DESCRIPTION: &str = "Error generating image description.";

/// Images are downscaled to this square size before upload
const ANALYSIS_SIZE: u32 = 256;

const MAX_DESCRIPTION_TOKENS: u32 = 150;

// --- OpenAI chat serde structs ---

#[derive(serde::Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(serde::Serialize)]
struct ChatMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(serde::Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("failed to encode image for analysis: {0}")]
    Encode(image::ImageError),

    #[error("description request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("description API returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("description API returned no choices")]
    EmptyResponse,
}

/// Client for describing images through the OpenAI chat completions API
pub struct DescriptionClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl DescriptionClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DescribeError> {
        Self::with_endpoint(api_key, OPENAI_ENDPOINT)
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_endpoint(
        api_key: impl Into<String>,
        endpoint: &str,
    ) -> Result<Self, DescribeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(DescribeError::Client)?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Describe an image, returning the model's text.
    pub async fn describe(&self, image: &DynamicImage) -> Result<String, DescribeError> {
        let data_url = analysis_data_url(image)?;

        let request = ChatRequest {
            model: DESCRIPTION_MODEL.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: serde_json::Value::String(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: serde_json::json!([
                        {"type": "text", "text": DESCRIBE_PROMPT},
                        {"type": "image_url", "image_url": {"url": data_url}}
                    ]),
                },
            ],
            max_tokens: MAX_DESCRIPTION_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DescribeError::Status(response.status()));
        }

        let chat_response: ChatResponse = response.json().await?;
        let description = chat_response
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or(DescribeError::EmptyResponse)?;

        info!("✅ Image description generated ({} chars)", description.len());
        Ok(description)
    }

    /// Describe an image, degrading to [`FALLBACK_DESCRIPTION`] on any
    /// failure. The cause is logged, never surfaced to the caller.
    pub async fn describe_or_fallback(&self, image: &DynamicImage) -> String {
        match self.describe(image).await {
            Ok(description) => description,
            Err(e) => {
                warn!("⚠️  Image description failed: {}", e);
                FALLBACK_DESCRIPTION.to_string()
            }
        }
    }
}

/// Downscale to the analysis size and encode as a PNG data URL.
fn analysis_data_url(image: &DynamicImage) -> Result<String, DescribeError> {
    let resized = image.resize_exact(ANALYSIS_SIZE, ANALYSIS_SIZE, FilterType::Triangle);

    let mut png = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(DescribeError::Encode)?;

    Ok(format!("data:image/png;base64,{}", BASE64.encode(&png)))
}

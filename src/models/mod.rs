// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pretrained artifact resolution from the Hugging Face registry
//!
//! Artifacts are resolved once at process start and cached by hf-hub under
//! its standard cache directory, so repeated startups do not re-download.

use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to initialize model registry client: {0}")]
    Registry(String),

    #[error("failed to resolve '{artifact}' from '{repo}': {message}")]
    Artifact {
        repo: String,
        artifact: String,
        message: String,
    },
}

/// Local paths of the two fixed reconstruction artifacts
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub config: PathBuf,
    pub weights: PathBuf,
}

/// Resolve a single artifact from a registry repo to a local path.
pub fn fetch_artifact(repo_id: &str, artifact: &str) -> Result<PathBuf, FetchError> {
    let api = hf_hub::api::sync::Api::new().map_err(|e| FetchError::Registry(e.to_string()))?;

    info!("Resolving {}/{} from model registry", repo_id, artifact);
    api.model(repo_id.to_string())
        .get(artifact)
        .map_err(|e| FetchError::Artifact {
            repo: repo_id.to_string(),
            artifact: artifact.to_string(),
            message: e.to_string(),
        })
}

/// Resolve the reconstruction model's config and weights artifacts.
pub fn fetch_model_artifacts(
    repo_id: &str,
    config_name: &str,
    weights_name: &str,
) -> Result<ModelArtifacts, FetchError> {
    let config = fetch_artifact(repo_id, config_name)?;
    let weights = fetch_artifact(repo_id, weights_name)?;
    Ok(ModelArtifacts { config, weights })
}

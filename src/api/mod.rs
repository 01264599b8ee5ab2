// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP API surface

pub mod errors;
pub mod generate_model;
pub mod http_server;

pub use errors::ErrorBody;
pub use http_server::{build_router, start_server, AppState};

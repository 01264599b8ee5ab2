// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! POST /generate-3d endpoint

pub mod handler;

pub use handler::generate_model_handler;

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preparation: decoding, background removal, foreground normalization

pub mod background;
pub mod foreground;
pub mod image_utils;

pub use background::{OnnxSegmenter, SegmentationError, Segmenter};
pub use foreground::{composite_over_gray, resize_foreground};
pub use image_utils::{decode_image_bytes, decode_image_file, ImageError, MAX_IMAGE_SIZE};

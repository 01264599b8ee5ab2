// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Foreground normalization after background removal
//!
//! The matting model hands us an RGBA image whose alpha channel marks the
//! subject. Before reconstruction the subject is recentered on a square
//! frame sized so its bounding box occupies the configured fraction of the
//! frame, and (on the CLI path) composited over a mid-gray backdrop to
//! avoid transparency edge artifacts.

use image::{imageops, Rgb, RgbImage, Rgba, RgbaImage};

/// Backdrop intensity used when flattening the alpha channel
pub const BACKGROUND_GRAY: f32 = 0.5;

/// Recenter and pad the segmented subject to the target occupancy ratio.
///
/// The alpha bounding box is cropped out and pasted centered onto a square
/// transparent canvas whose side is `max(bbox_w, bbox_h) / ratio`, so the
/// subject's larger dimension occupies `ratio` of the frame. Aspect ratio
/// is preserved; padding is fully transparent.
///
/// A fully transparent image has no subject to normalize and is returned
/// unchanged, so preparation never fails for a decodable image.
pub fn resize_foreground(image: &RgbaImage, ratio: f32) -> RgbaImage {
    debug_assert!(ratio > 0.0 && ratio <= 1.0, "ratio out of (0, 1]");
    let ratio = ratio.clamp(f32::MIN_POSITIVE, 1.0);

    let Some((x0, y0, x1, y1)) = alpha_bounding_box(image) else {
        return image.clone();
    };

    let bbox_w = x1 - x0 + 1;
    let bbox_h = y1 - y0 + 1;
    let cropped = imageops::crop_imm(image, x0, y0, bbox_w, bbox_h).to_image();

    let side = ((bbox_w.max(bbox_h) as f32) / ratio).round().max(1.0) as u32;
    let mut canvas = RgbaImage::from_pixel(side, side, Rgba([0, 0, 0, 0]));

    let off_x = (side.saturating_sub(bbox_w)) / 2;
    let off_y = (side.saturating_sub(bbox_h)) / 2;
    imageops::overlay(&mut canvas, &cropped, i64::from(off_x), i64::from(off_y));

    canvas
}

/// Flatten an RGBA image onto a constant mid-gray background.
///
/// Alpha acts as a blend weight per channel: `fg * a + gray * (1 - a)`.
pub fn composite_over_gray(image: &RgbaImage) -> RgbImage {
    let gray = BACKGROUND_GRAY * 255.0;
    let mut out = RgbImage::new(image.width(), image.height());

    for (x, y, pixel) in image.enumerate_pixels() {
        let a = pixel[3] as f32 / 255.0;
        let blend = |c: u8| -> u8 { (c as f32 * a + gray * (1.0 - a)).round() as u8 };
        out.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }

    out
}

/// Bounding box of pixels with non-zero alpha, inclusive corners.
fn alpha_bounding_box(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let mut bbox: Option<(u32, u32, u32, u32)> = None;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        bbox = Some(match bbox {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    bbox
}

//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mocks;

use procflow::types::ImageFrame;
use std::time::Duration;

/// How long a test waits before deciding another thread is blocked
pub fn settle_time() -> Duration {
    Duration::from_millis(100)
}

/// Uniform image of `value`
pub fn flat_image(width: u32, height: u32, value: u8) -> ImageFrame {
    ImageFrame::from_pixel(width, height, image::Luma([value]))
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

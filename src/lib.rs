//! Undistort Tools Library
//!
//! A Rust library for correcting lens distortion in images from calibrated cameras.
//! This library provides:
//! - Pinhole intrinsics and the radial-tangential (plumb-bob), rational and
//!   Kannala-Brandt fisheye distortion models
//! - Rectification maps that give, for every output pixel, the sub-pixel location to
//!   sample in the distorted image
//! - A resampler with nearest, bilinear, bicubic and Lanczos kernels and constant,
//!   replicate, reflect and transparent border handling
//!
//! Calibrations are read from and written to Kalibr-style YAML files, images go
//! through the `image` crate.

pub mod camera;
pub mod frame;
pub mod geometry;
pub mod rectify;
pub mod util;

// Re-export commonly used types
pub use camera::{
    CameraModel, CameraModelError, Distortion, Fisheye, ImageSize, Intrinsics, LensDistortion,
    PlumbBob, Rational,
};
pub use frame::Image;
pub use rectify::{
    apply_map, apply_map_into, build_map, BorderMode, InterpolationMode, NearestLookup,
    RectificationMap, RectifyError,
};

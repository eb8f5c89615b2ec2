//! Rectification maps and the resampler that applies them.
//!
//! Undistortion runs in two steps:
//!
//! 1. [`build_map`] turns a [`CameraModel`](crate::camera::CameraModel) and an output
//!    size into a [`RectificationMap`]: for every destination pixel, the sub-pixel
//!    location in the distorted source image to read from.
//! 2. [`apply_map`] (or [`apply_map_into`]) samples a source image at those locations
//!    with an [`InterpolationMode`], handling out-of-range reads with a [`BorderMode`].
//!
//! A map never touches pixel data, so one map serves every frame of a camera.
//! [`NearestLookup`] compiles a map further into integer index pairs for repeated
//! nearest-neighbour undistortion.
//!
//! # Examples
//!
//! ```rust
//! use undistort_tools::camera::{CameraModel, Distortion, ImageSize, Intrinsics, PlumbBob};
//! use undistort_tools::frame::Image;
//! use undistort_tools::rectify::{apply_map, build_map, BorderMode, InterpolationMode};
//!
//! let intrinsics = Intrinsics::new(50.0, 50.0, 32.0, 24.0).unwrap();
//! let distortion = Distortion::PlumbBob(PlumbBob::new(-0.2, 0.05, 0.0, 0.0, 0.0));
//! let model = CameraModel::new(intrinsics, distortion).unwrap();
//!
//! let map = build_map(&model, ImageSize::new(64, 48)).unwrap();
//! let source = Image::filled(64, 48, 3, 90);
//! let undistorted = apply_map(
//!     &source,
//!     &map,
//!     InterpolationMode::Bilinear,
//!     BorderMode::Constant(0),
//! )
//! .unwrap();
//! assert_eq!(undistorted.size(), source.size());
//! ```

use crate::camera::CameraModelError;

pub mod border;
pub mod interpolation;
pub mod lookup;
pub mod map;
pub mod resample;

pub use border::BorderMode;
pub use interpolation::InterpolationMode;
pub use lookup::NearestLookup;
pub use map::{build_map, RectificationMap};
pub use resample::{apply_map, apply_map_into};

#[derive(thiserror::Error, Debug)]
pub enum RectifyError {
    #[error("Invalid camera model: {0}")]
    InvalidModel(#[from] CameraModelError),
    #[error("Invalid image size {width}x{height}, both dimensions must be positive")]
    InvalidSize { width: u32, height: u32 },
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: String, found: String },
    #[error("Source image is empty")]
    EmptyImage,
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
}

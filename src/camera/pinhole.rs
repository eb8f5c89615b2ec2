//! Implements the pinhole projection used by every camera in this crate.
//!
//! The pinhole part of a camera is fully described by [`Intrinsics`]. This module
//! provides the conversions between pixel coordinates and the normalized image
//! plane, which both the distortion models and the rectification map build on.

use crate::camera::{validation, CameraModelError, ImageSize, Intrinsics};
use nalgebra::{DVector, Matrix3, Vector2};

impl Intrinsics {
    /// Creates a new [`Intrinsics`] and validates it.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    ///
    /// # Examples
    ///
    /// ```rust
    /// use undistort_tools::camera::Intrinsics;
    ///
    /// let intrinsics = Intrinsics::new(500.0, 500.0, 320.0, 240.0).unwrap();
    /// assert_eq!(intrinsics.fx, 500.0);
    /// assert!(Intrinsics::new(0.0, 500.0, 320.0, 240.0).is_err());
    /// ```
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraModelError> {
        let intrinsics = Intrinsics { fx, fy, cx, cy };
        intrinsics.validate()?;
        Ok(intrinsics)
    }

    /// Creates [`Intrinsics`] from a parameter vector `[fx, fy, cx, cy]`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidParams`]: if the vector does not hold exactly 4 values.
    /// * Any error from [`Intrinsics::validate`].
    pub fn from_params(parameters: &DVector<f64>) -> Result<Self, CameraModelError> {
        if parameters.len() != 4 {
            return Err(CameraModelError::InvalidParams(format!(
                "Intrinsics require 4 parameters (fx, fy, cx, cy), found {}",
                parameters.len()
            )));
        }
        Self::new(parameters[0], parameters[1], parameters[2], parameters[3])
    }

    /// Builds the intrinsics of an ideal camera from its resolution and field of view.
    ///
    /// The focal lengths are `size / (2 * tan(fov / 2))` and the principal point is the
    /// image centre.
    ///
    /// # Arguments
    ///
    /// * `resolution` - Image size in pixels.
    /// * `fov` - Horizontal and vertical field of view, in radians.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidParams`]: if a field of view is not in `(0, pi)`.
    pub fn from_resolution_fov(
        resolution: ImageSize,
        fov: (f64, f64),
    ) -> Result<Self, CameraModelError> {
        let (fov_x, fov_y) = fov;
        let valid = |angle: f64| angle > 0.0 && angle < std::f64::consts::PI;
        if !valid(fov_x) || !valid(fov_y) {
            return Err(CameraModelError::InvalidParams(format!(
                "Field of view must be in (0, pi), got ({}, {})",
                fov_x, fov_y
            )));
        }

        let width = resolution.width as f64;
        let height = resolution.height as f64;
        Self::new(
            width / (2.0 * (fov_x / 2.0).tan()),
            height / (2.0 * (fov_y / 2.0).tan()),
            width / 2.0,
            height / 2.0,
        )
    }

    /// Validates the focal lengths and principal point.
    pub fn validate(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(self)
    }

    /// Returns the 3x3 camera matrix `K`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Projects a point on the normalized image plane to pixel coordinates.
    ///
    /// `u = fx * x + cx`, `v = fy * y + cy`
    #[inline]
    pub fn project(&self, normalized: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            self.fx * normalized.x + self.cx,
            self.fy * normalized.y + self.cy,
        )
    }

    /// Back-projects pixel coordinates to the normalized image plane.
    ///
    /// `x = (u - cx) / fx`, `y = (v - cy) / fy`
    #[inline]
    pub fn unproject(&self, pixel: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            (pixel.x - self.cx) / self.fx,
            (pixel.y - self.cy) / self.fy,
        )
    }
}

//! Camera intrinsics, lens distortion models and the combined [`CameraModel`].
//!
//! A camera is described by its pinhole [`Intrinsics`] and a [`Distortion`] variant.
//! Every distortion variant implements [`LensDistortion`], which maps between ideal
//! and distorted coordinates on the normalized image plane (`z = 1`).

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod kannala_brandt;
pub mod model;
pub mod pinhole;
pub mod rad_tan;

pub use kannala_brandt::Fisheye;
pub use model::CameraModel;
pub use rad_tan::{PlumbBob, Rational};

/// Pinhole projection parameters, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered by this size.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    #[error("z is close to zero, point is at camera center")]
    PointAtCameraCenter,
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("Numerical error in computation: {0}")]
    NumericalError(String),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CameraModelError {
    fn from(err: std::io::Error) -> Self {
        CameraModelError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for CameraModelError {
    fn from(err: yaml_rust::ScanError) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

/// Maximum number of Newton steps used by [`LensDistortion::undistort`].
const MAX_ITERATIONS: u32 = 100;
/// Convergence threshold on the normalized image plane.
const EPS: f64 = 1e-9;

/// Trait defining the core functionality for lens distortion models.
///
/// Points passed to and returned from these methods live on the normalized image
/// plane, i.e. `(X / Z, Y / Z)` for a camera-space point `(X, Y, Z)`.
pub trait LensDistortion {
    /// Applies the forward lens model to an ideal (undistorted) normalized point.
    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64>;

    /// Inverts [`LensDistortion::distort`] with Newton iterations.
    ///
    /// The Jacobian is estimated with central differences so that every model gets
    /// an inverse from its forward formula alone.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::NumericalError`]: if the Jacobian becomes singular or the
    ///   iteration does not converge.
    fn undistort(&self, distorted: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
        const H: f64 = 1e-7;

        // The distorted point is a good initial guess for moderate distortion.
        let mut point = *distorted;

        for _ in 0..MAX_ITERATIONS {
            let error = self.distort(&point) - distorted;
            if error.norm() < EPS {
                return Ok(point);
            }

            let dx = Vector2::new(H, 0.0);
            let dy = Vector2::new(0.0, H);
            let col_x = (self.distort(&(point + dx)) - self.distort(&(point - dx))) / (2.0 * H);
            let col_y = (self.distort(&(point + dy)) - self.distort(&(point - dy))) / (2.0 * H);
            let jacobian = Matrix2::from_columns(&[col_x, col_y]);

            let inv_jacobian = jacobian.try_inverse().ok_or_else(|| {
                CameraModelError::NumericalError("Jacobian is singular".to_string())
            })?;
            let delta = inv_jacobian * error;
            point -= delta;

            if !point.x.is_finite() || !point.y.is_finite() {
                return Err(CameraModelError::NumericalError(
                    "Undistortion diverged".to_string(),
                ));
            }
            if delta.norm() < EPS {
                return Ok(point);
            }
        }

        Err(CameraModelError::NumericalError(format!(
            "Undistortion did not converge after {} iterations.",
            MAX_ITERATIONS
        )))
    }

    /// Coefficients in the order used by calibration files.
    fn coefficients(&self) -> Vec<f64>;

    /// Validate the distortion coefficients.
    fn validate_params(&self) -> Result<(), CameraModelError> {
        if self.coefficients().iter().all(|c| c.is_finite()) {
            Ok(())
        } else {
            Err(CameraModelError::InvalidParams(
                "Distortion coefficients must be finite".to_string(),
            ))
        }
    }
}

/// The lens distortion attached to a [`CameraModel`].
///
/// Each variant carries exactly the coefficients its model defines, so a plumb-bob
/// set can never be read as a rational one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coefficients", rename_all = "snake_case")]
pub enum Distortion {
    /// Ideal pinhole lens.
    None,
    PlumbBob(PlumbBob),
    Rational(Rational),
    Fisheye(Fisheye),
}

impl Distortion {
    /// Builds a distortion from a model name and a coefficient list.
    ///
    /// Accepted names are `pinhole`/`none`, `rad_tan`/`plumb_bob`, `rational` and
    /// `fisheye`/`kannala_brandt`. Coefficients follow the OpenCV order
    /// (`k1, k2, p1, p2[, k3[, k4, k5, k6]]` and `k1, k2, k3, k4` for fisheye).
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidParams`]: unknown model name or wrong number of coefficients.
    pub fn from_coefficients(model: &str, coefficients: &[f64]) -> Result<Self, CameraModelError> {
        let distortion = match model.to_lowercase().as_str() {
            "pinhole" | "none" => {
                if !coefficients.is_empty() && coefficients.iter().any(|&c| c != 0.0) {
                    return Err(CameraModelError::InvalidParams(format!(
                        "Pinhole model takes no distortion parameters, found {}",
                        coefficients.len()
                    )));
                }
                Distortion::None
            }
            "rad_tan" | "radtan" | "plumb_bob" | "plumbbob" => {
                Distortion::PlumbBob(PlumbBob::from_slice(coefficients)?)
            }
            "rational" | "rational_polynomial" => {
                Distortion::Rational(Rational::from_slice(coefficients)?)
            }
            "fisheye" | "kannala_brandt" | "kb" | "equidistant" => {
                Distortion::Fisheye(Fisheye::from_slice(coefficients)?)
            }
            other => {
                return Err(CameraModelError::InvalidParams(format!(
                    "Unsupported camera model: {}. Supported models: pinhole, rad_tan, rational, fisheye",
                    other
                )))
            }
        };
        distortion.validate_params()?;
        Ok(distortion)
    }

    /// True when [`LensDistortion::distort`] leaves every point unchanged: no
    /// distortion, or a radial-tangential model whose coefficients are all zero.
    pub fn is_identity(&self) -> bool {
        match self {
            Distortion::None => true,
            Distortion::PlumbBob(_) | Distortion::Rational(_) => {
                self.coefficients().iter().all(|&c| c == 0.0)
            }
            // Zero coefficients still leave the equidistant projection.
            Distortion::Fisheye(_) => false,
        }
    }

    /// Model name as written to calibration files.
    pub fn name(&self) -> &'static str {
        match self {
            Distortion::None => "pinhole",
            Distortion::PlumbBob(_) => "rad_tan",
            Distortion::Rational(_) => "rational",
            Distortion::Fisheye(_) => "fisheye",
        }
    }
}

impl LensDistortion for Distortion {
    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        match self {
            Distortion::None => *point,
            Distortion::PlumbBob(d) => d.distort(point),
            Distortion::Rational(d) => d.distort(point),
            Distortion::Fisheye(d) => d.distort(point),
        }
    }

    fn undistort(&self, distorted: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
        match self {
            Distortion::None => Ok(*distorted),
            Distortion::PlumbBob(d) => d.undistort(distorted),
            Distortion::Rational(d) => d.undistort(distorted),
            Distortion::Fisheye(d) => d.undistort(distorted),
        }
    }

    fn coefficients(&self) -> Vec<f64> {
        match self {
            Distortion::None => vec![],
            Distortion::PlumbBob(d) => d.coefficients(),
            Distortion::Rational(d) => d.coefficients(),
            Distortion::Fisheye(d) => d.coefficients(),
        }
    }
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CameraModelError> {
        // Written so that NaN focal lengths are rejected too.
        if !(intrinsics.fx > 0.0 && intrinsics.fy > 0.0)
            || !intrinsics.fx.is_finite()
            || !intrinsics.fy.is_finite()
        {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }
}

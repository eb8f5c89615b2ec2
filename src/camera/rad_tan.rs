//! Implements the Radial-Tangential (RadTan) distortion family.
//!
//! Two variants are provided:
//! * [`PlumbBob`]: the classic 5-parameter model (`k1, k2, p1, p2, k3`), also used
//!   with 4 parameters when `k3` is not calibrated.
//! * [`Rational`]: the 8-parameter rational model, which divides the radial
//!   polynomial by a second polynomial in `r^2` (`k4, k5, k6`).
//!
//! Both follow the OpenCV coefficient order.

use crate::camera::{CameraModelError, LensDistortion};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Radial-tangential distortion with 3 radial and 2 tangential coefficients.
///
/// # Examples
///
/// ```rust
/// use nalgebra::Vector2;
/// use undistort_tools::camera::{LensDistortion, PlumbBob};
///
/// let plumb_bob = PlumbBob::from_slice(&[-0.2, 0.05, 0.0, 0.0]).unwrap();
/// assert_eq!(plumb_bob.k3, 0.0);
///
/// // Barrel distortion pulls points towards the optical axis.
/// let distorted = plumb_bob.distort(&Vector2::new(0.5, 0.0));
/// assert!(distorted.x < 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlumbBob {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl PlumbBob {
    pub fn new(k1: f64, k2: f64, p1: f64, p2: f64, k3: f64) -> Self {
        Self { k1, k2, p1, p2, k3 }
    }

    /// Creates a [`PlumbBob`] from 4 (`k1, k2, p1, p2`) or 5 (`.., k3`) coefficients.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidParams`]: for any other number of coefficients.
    pub fn from_slice(coefficients: &[f64]) -> Result<Self, CameraModelError> {
        match *coefficients {
            [k1, k2, p1, p2] => Ok(Self::new(k1, k2, p1, p2, 0.0)),
            [k1, k2, p1, p2, k3] => Ok(Self::new(k1, k2, p1, p2, k3)),
            _ => Err(CameraModelError::InvalidParams(format!(
                "RadTan model requires 4 or 5 distortion parameters, found {}",
                coefficients.len()
            ))),
        }
    }
}

impl LensDistortion for PlumbBob {
    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let radial = |r2: f64| 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
        distort_rad_tan(point, radial, self.p1, self.p2)
    }

    fn coefficients(&self) -> Vec<f64> {
        vec![self.k1, self.k2, self.p1, self.p2, self.k3]
    }
}

/// Rational radial-tangential distortion with 6 radial and 2 tangential coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rational {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,
}

impl Rational {
    /// Creates a [`Rational`] from exactly 8 coefficients, `k1, k2, p1, p2, k3, k4, k5, k6`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidParams`]: for any other number of coefficients.
    pub fn from_slice(coefficients: &[f64]) -> Result<Self, CameraModelError> {
        match *coefficients {
            [k1, k2, p1, p2, k3, k4, k5, k6] => Ok(Self {
                k1,
                k2,
                p1,
                p2,
                k3,
                k4,
                k5,
                k6,
            }),
            _ => Err(CameraModelError::InvalidParams(format!(
                "Rational model requires 8 distortion parameters, found {}",
                coefficients.len()
            ))),
        }
    }
}

impl LensDistortion for Rational {
    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let radial = |r2: f64| {
            let r4 = r2 * r2;
            let r6 = r4 * r2;
            (1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6)
                / (1.0 + self.k4 * r2 + self.k5 * r4 + self.k6 * r6)
        };
        distort_rad_tan(point, radial, self.p1, self.p2)
    }

    fn coefficients(&self) -> Vec<f64> {
        vec![
            self.k1, self.k2, self.p1, self.p2, self.k3, self.k4, self.k5, self.k6,
        ]
    }
}

/// Shared radial scaling plus tangential terms.
#[inline]
fn distort_rad_tan(
    point: &Vector2<f64>,
    radial: impl Fn(f64) -> f64,
    p1: f64,
    p2: f64,
) -> Vector2<f64> {
    let x = point.x;
    let y = point.y;
    let r2 = x * x + y * y;
    let scale = radial(r2);

    let x_distorted = x * scale + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
    let y_distorted = y * scale + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

    Vector2::new(x_distorted, y_distorted)
}

//! Implements the Kannala-Brandt (equidistant fisheye) distortion model.
//!
//! The model distorts the angle of incidence `theta = atan(r)` with an odd polynomial
//! `theta_d = theta * (1 + k1 theta^2 + k2 theta^4 + k3 theta^6 + k4 theta^8)` and
//! rescales the normalized point so that its radius becomes `theta_d`.

use crate::camera::{CameraModelError, LensDistortion};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fisheye {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
}

impl Fisheye {
    pub fn new(k1: f64, k2: f64, k3: f64, k4: f64) -> Self {
        Self { k1, k2, k3, k4 }
    }

    /// Creates a [`Fisheye`] from exactly 4 coefficients, `k1, k2, k3, k4`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidParams`]: for any other number of coefficients.
    pub fn from_slice(coefficients: &[f64]) -> Result<Self, CameraModelError> {
        match *coefficients {
            [k1, k2, k3, k4] => Ok(Self::new(k1, k2, k3, k4)),
            _ => Err(CameraModelError::InvalidParams(format!(
                "Kannala-Brandt model requires 4 distortion parameters, found {}",
                coefficients.len()
            ))),
        }
    }
}

impl LensDistortion for Fisheye {
    fn distort(&self, point: &Vector2<f64>) -> Vector2<f64> {
        let r = point.norm();
        if r < f64::EPSILON {
            return *point;
        }

        let theta = r.atan();
        let theta2 = theta * theta;
        let theta4 = theta2 * theta2;
        let theta6 = theta4 * theta2;
        let theta8 = theta4 * theta4;
        let theta_d =
            theta * (1.0 + self.k1 * theta2 + self.k2 * theta4 + self.k3 * theta6 + self.k4 * theta8);

        point * (theta_d / r)
    }

    fn coefficients(&self) -> Vec<f64> {
        vec![self.k1, self.k2, self.k3, self.k4]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fisheye_zero_coefficients_is_equidistant() {
        let fisheye = Fisheye::new(0.0, 0.0, 0.0, 0.0);
        let point = Vector2::new(1.0, 0.0);
        // With no coefficients the radius becomes the incidence angle.
        let distorted = fisheye.distort(&point);
        assert_relative_eq!(distorted.x, std::f64::consts::FRAC_PI_4, epsilon = 1e-12);
        assert_eq!(distorted.y, 0.0);
    }

    #[test]
    fn test_fisheye_center_is_fixed() {
        let fisheye = Fisheye::new(0.1, 0.01, 0.001, 0.0001);
        let center = Vector2::new(0.0, 0.0);
        assert_eq!(fisheye.distort(&center), center);
    }

    #[test]
    fn test_fisheye_from_slice() {
        let fisheye = Fisheye::from_slice(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(fisheye.coefficients(), vec![0.1, 0.2, 0.3, 0.4]);
        assert!(Fisheye::from_slice(&[0.1, 0.2, 0.3]).is_err());
    }
}

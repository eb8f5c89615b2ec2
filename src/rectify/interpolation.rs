//! Interpolation kernels used to read a source image at sub-pixel positions.
//!
//! Every kernel is separable. For one axis it yields the index of the first tap and
//! one weight per tap; the resampler combines the two axes as an outer product.

use crate::rectify::RectifyError;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Widest kernel support, reached by [`InterpolationMode::Lanczos`].
pub(crate) const MAX_TAPS: usize = 8;

/// Keys' cubic convolution parameter.
const CUBIC_A: f32 = -0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMode {
    /// Copy of the nearest pixel, halves rounded away from zero.
    Nearest,
    /// 2x2 taps with linear weights.
    Bilinear,
    /// 4x4 taps with Keys' cubic convolution kernel (`a = -0.75`).
    Bicubic,
    /// 8x8 taps with the normalized Lanczos-4 window.
    Lanczos,
}

/// Taps of a kernel along one axis.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Taps {
    /// Source index of the first tap, before border handling.
    pub start: i64,
    pub weights: [f32; MAX_TAPS],
    pub len: usize,
}

impl Taps {
    /// `(source index, weight)` of every tap.
    pub fn iter(&self) -> impl Iterator<Item = (i64, f32)> + '_ {
        self.weights[..self.len]
            .iter()
            .enumerate()
            .map(move |(i, &w)| (self.start.saturating_add(i as i64), w))
    }
}

impl InterpolationMode {
    /// Number of taps per axis.
    pub fn support(self) -> usize {
        match self {
            InterpolationMode::Nearest => 1,
            InterpolationMode::Bilinear => 2,
            InterpolationMode::Bicubic => 4,
            InterpolationMode::Lanczos => 8,
        }
    }

    /// Kernel taps for a finite source coordinate along one axis.
    pub(crate) fn taps(self, coord: f32) -> Taps {
        let mut weights = [0.0; MAX_TAPS];
        let floor = coord.floor();
        let t = coord - floor;
        let base = floor as i64;

        let start = match self {
            InterpolationMode::Nearest => {
                weights[0] = 1.0;
                nearest_index(coord)
            }
            InterpolationMode::Bilinear => {
                weights[0] = 1.0 - t;
                weights[1] = t;
                base
            }
            InterpolationMode::Bicubic => {
                weights[0] = cubic(t + 1.0);
                weights[1] = cubic(t);
                weights[2] = cubic(1.0 - t);
                weights[3] = cubic(2.0 - t);
                base.saturating_sub(1)
            }
            InterpolationMode::Lanczos => {
                lanczos4(t, &mut weights);
                base.saturating_sub(3)
            }
        };

        Taps {
            start,
            weights,
            len: self.support(),
        }
    }
}

/// Index of the pixel nearest to a finite coordinate, halves rounded away from zero.
#[inline]
pub(crate) fn nearest_index(coord: f32) -> i64 {
    coord.round() as i64
}

/// Keys' cubic convolution kernel.
#[inline]
fn cubic(x: f32) -> f32 {
    let x = x.abs();
    if x <= 1.0 {
        ((CUBIC_A + 2.0) * x - (CUBIC_A + 3.0)) * x * x + 1.0
    } else if x < 2.0 {
        ((CUBIC_A * x - 5.0 * CUBIC_A) * x + 8.0 * CUBIC_A) * x - 4.0 * CUBIC_A
    } else {
        0.0
    }
}

/// Lanczos-4 weights for the 8 taps around fractional offset `t`, normalized to sum 1.
fn lanczos4(t: f32, weights: &mut [f32; MAX_TAPS]) {
    if t == 0.0 {
        weights.fill(0.0);
        weights[3] = 1.0;
        return;
    }

    let mut sum = 0.0;
    for (i, weight) in weights.iter_mut().enumerate() {
        let d = i as f32 - 3.0 - t;
        *weight = sinc(d) * sinc(d / 4.0);
        sum += *weight;
    }
    for weight in weights.iter_mut() {
        *weight /= sum;
    }
}

#[inline]
fn sinc(x: f32) -> f32 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

impl fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterpolationMode::Nearest => "nearest",
            InterpolationMode::Bilinear => "bilinear",
            InterpolationMode::Bicubic => "bicubic",
            InterpolationMode::Lanczos => "lanczos",
        };
        f.write_str(name)
    }
}

impl FromStr for InterpolationMode {
    type Err = RectifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(InterpolationMode::Nearest),
            "bilinear" | "linear" => Ok(InterpolationMode::Bilinear),
            "bicubic" | "cubic" => Ok(InterpolationMode::Bicubic),
            "lanczos" | "lanczos4" => Ok(InterpolationMode::Lanczos),
            other => Err(RectifyError::UnknownMode(format!(
                "{}. Supported interpolation modes: nearest, bilinear, bicubic, lanczos",
                other
            ))),
        }
    }
}

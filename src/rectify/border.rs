//! Policies for kernel taps that fall outside the source image.

use crate::rectify::RectifyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderMode {
    /// Out-of-range taps read this value on every channel.
    Constant(u8),
    /// Out-of-range taps read the nearest edge pixel (`aaa|abc...xyz|zzz`).
    Replicate,
    /// Out-of-range taps are mirrored with the edge pixel repeated (`cba|abc...xyz|zyx`).
    Reflect,
    /// Destination pixels whose coordinate lies outside the source are left untouched.
    Transparent,
}

impl BorderMode {
    /// Maps a tap index onto a source row or column of length `len`.
    ///
    /// Returns `None` when the tap reads the constant fill value instead.
    #[inline]
    pub(crate) fn resolve(self, index: i64, len: usize) -> Option<usize> {
        let n = len as i64;
        match self {
            BorderMode::Constant(_) => {
                if (0..n).contains(&index) {
                    Some(index as usize)
                } else {
                    None
                }
            }
            BorderMode::Replicate | BorderMode::Transparent => {
                Some(index.clamp(0, n - 1) as usize)
            }
            BorderMode::Reflect => Some(reflect_index(index, n) as usize),
        }
    }
}

/// Mirrors `index` into `[0, n)` with the edge sample repeated. The pattern repeats
/// every `2n` samples, so any index resolves.
#[inline]
fn reflect_index(index: i64, n: i64) -> i64 {
    if n == 1 {
        return 0;
    }
    let period = 2 * n;
    let m = index.rem_euclid(period);
    if m < n {
        m
    } else {
        period - 1 - m
    }
}

impl fmt::Display for BorderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BorderMode::Constant(value) => write!(f, "constant({})", value),
            BorderMode::Replicate => f.write_str("replicate"),
            BorderMode::Reflect => f.write_str("reflect"),
            BorderMode::Transparent => f.write_str("transparent"),
        }
    }
}

impl FromStr for BorderMode {
    type Err = RectifyError;

    /// Parses a border mode name. `constant` fills with 0; `constant(v)` uses `v`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.to_lowercase();
        match name.as_str() {
            "constant" => return Ok(BorderMode::Constant(0)),
            "replicate" => return Ok(BorderMode::Replicate),
            "reflect" => return Ok(BorderMode::Reflect),
            "transparent" => return Ok(BorderMode::Transparent),
            _ => {}
        }

        name.strip_prefix("constant(")
            .and_then(|rest| rest.strip_suffix(')'))
            .and_then(|value| value.trim().parse::<u8>().ok())
            .map(BorderMode::Constant)
            .ok_or_else(|| {
                RectifyError::UnknownMode(format!(
                    "{}. Supported border modes: constant, replicate, reflect, transparent",
                    s
                ))
            })
    }
}

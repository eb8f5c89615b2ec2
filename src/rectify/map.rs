//! The per-pixel source coordinate table and the function that builds it.

use crate::camera::{CameraModel, ImageSize};
use crate::rectify::RectifyError;
use log::debug;

/// Source sampling coordinates for every destination pixel.
///
/// Both grids are row-major with one entry per destination pixel. Coordinates are
/// stored unclamped, so entries may lie outside the source image; the resampler's
/// [`BorderMode`](crate::rectify::BorderMode) decides what such entries read.
#[derive(Debug, Clone, PartialEq)]
pub struct RectificationMap {
    size: ImageSize,
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl RectificationMap {
    /// Wraps caller-supplied coordinate grids.
    ///
    /// # Errors
    ///
    /// * [`RectifyError::InvalidSize`]: if `size` has a zero dimension.
    /// * [`RectifyError::DimensionMismatch`]: if a grid does not hold `width * height` entries.
    pub fn from_grids(
        size: ImageSize,
        map_x: Vec<f32>,
        map_y: Vec<f32>,
    ) -> Result<Self, RectifyError> {
        if size.is_empty() {
            return Err(RectifyError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }
        for grid in [&map_x, &map_y] {
            if grid.len() != size.area() {
                return Err(RectifyError::DimensionMismatch {
                    expected: format!("{} map entries ({})", size.area(), size),
                    found: format!("{} map entries", grid.len()),
                });
            }
        }
        Ok(Self { size, map_x, map_y })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn map_x(&self) -> &[f32] {
        &self.map_x
    }

    pub fn map_y(&self) -> &[f32] {
        &self.map_y
    }

    /// Source coordinate sampled by destination pixel `(u, v)`.
    #[inline]
    pub fn get(&self, u: u32, v: u32) -> Option<(f32, f32)> {
        if u >= self.size.width || v >= self.size.height {
            return None;
        }
        let index = v as usize * self.size.width as usize + u as usize;
        Some((self.map_x[index], self.map_y[index]))
    }

    /// Fraction of entries that fall inside `[0, w-1] x [0, h-1]` of a source image.
    pub fn valid_fraction(&self, source_size: ImageSize) -> f64 {
        if source_size.is_empty() || self.map_x.is_empty() {
            return 0.0;
        }
        let max_x = (source_size.width - 1) as f32;
        let max_y = (source_size.height - 1) as f32;
        let valid = self
            .map_x
            .iter()
            .zip(&self.map_y)
            .filter(|&(&x, &y)| (0.0..=max_x).contains(&x) && (0.0..=max_y).contains(&y))
            .count();
        valid as f64 / self.map_x.len() as f64
    }
}

/// Builds the rectification map of a camera for an output of `size`.
///
/// Destination pixel `(u, v)` is back-projected through the target intrinsics,
/// pushed through the forward distortion model and projected with the physical
/// intrinsics. Everything is computed in `f64` and stored as `f32`.
///
/// # Arguments
///
/// * `model` - Calibrated camera. Its target intrinsics define the output camera.
/// * `size` - Size of the undistorted output image.
///
/// # Errors
///
/// * [`RectifyError::InvalidModel`]: if the model fails validation (non-positive
///   focal length, non-finite principal point or coefficients).
/// * [`RectifyError::InvalidSize`]: if `size` has a zero dimension.
pub fn build_map(model: &CameraModel, size: ImageSize) -> Result<RectificationMap, RectifyError> {
    model.validate_params()?;
    if size.is_empty() {
        return Err(RectifyError::InvalidSize {
            width: size.width,
            height: size.height,
        });
    }

    debug!(
        "Building {} rectification map for the {} model",
        size,
        model.distortion.name()
    );

    // Going through the normalized plane can leave an ulp of residue, which f32 keeps
    // near zero. An undistorted camera rendered through itself maps every pixel onto itself.
    let identity = model.distortion.is_identity() && model.target() == &model.intrinsics;

    let mut map_x = Vec::with_capacity(size.area());
    let mut map_y = Vec::with_capacity(size.area());
    for v in 0..size.height {
        for u in 0..size.width {
            if identity {
                map_x.push(u as f32);
                map_y.push(v as f32);
            } else {
                let source = model.source_pixel(u as f64, v as f64);
                map_x.push(source.x as f32);
                map_y.push(source.y as f32);
            }
        }
    }

    Ok(RectificationMap { size, map_x, map_y })
}

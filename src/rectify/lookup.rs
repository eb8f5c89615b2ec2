//! A rectification map compiled to integer pixel indices for one source size.

use crate::camera::ImageSize;
use crate::frame::Image;
use crate::rectify::interpolation::nearest_index;
use crate::rectify::{RectificationMap, RectifyError};

/// Precomputed nearest-neighbour remapping.
///
/// Holds one `(destination index, source index)` pair per destination pixel whose
/// rounded source coordinate lies inside the source image. Indices are linear pixel
/// indices (`y * width + x`). Applying the lookup is a sequence of pixel copies and
/// produces the same image as [`apply_map`](crate::rectify::apply_map) with
/// [`InterpolationMode::Nearest`](crate::rectify::InterpolationMode::Nearest) and
/// [`BorderMode::Constant(0)`](crate::rectify::BorderMode::Constant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearestLookup {
    source_size: ImageSize,
    destination_size: ImageSize,
    pairs: Vec<(usize, usize)>,
}

impl NearestLookup {
    /// Compiles `map` for source images of `source_size`.
    ///
    /// # Errors
    ///
    /// * [`RectifyError::InvalidSize`]: if `source_size` has a zero dimension.
    pub fn new(map: &RectificationMap, source_size: ImageSize) -> Result<Self, RectifyError> {
        if source_size.is_empty() {
            return Err(RectifyError::InvalidSize {
                width: source_size.width,
                height: source_size.height,
            });
        }

        let width = source_size.width as i64;
        let height = source_size.height as i64;
        let pairs = map
            .map_x()
            .iter()
            .zip(map.map_y())
            .enumerate()
            .filter_map(|(dst, (&sx, &sy))| {
                if !sx.is_finite() || !sy.is_finite() {
                    return None;
                }
                let x = nearest_index(sx);
                let y = nearest_index(sy);
                if (0..width).contains(&x) && (0..height).contains(&y) {
                    Some((dst, (y * width + x) as usize))
                } else {
                    None
                }
            })
            .collect();

        Ok(Self {
            source_size,
            destination_size: map.size(),
            pairs,
        })
    }

    pub fn source_size(&self) -> ImageSize {
        self.source_size
    }

    pub fn destination_size(&self) -> ImageSize {
        self.destination_size
    }

    /// The `(destination index, source index)` pairs, in destination order.
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// Number of destination pixels that read from the source.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Remaps `source`. Destination pixels without a source pixel are 0.
    ///
    /// # Errors
    ///
    /// * [`RectifyError::EmptyImage`]: if the source has no samples.
    /// * [`RectifyError::DimensionMismatch`]: if the source size differs from the
    ///   size the lookup was compiled for.
    pub fn apply(&self, source: &Image) -> Result<Image, RectifyError> {
        if source.is_empty() {
            return Err(RectifyError::EmptyImage);
        }
        if source.size() != self.source_size {
            return Err(RectifyError::DimensionMismatch {
                expected: format!("source of {}", self.source_size),
                found: format!("source of {}", source.size()),
            });
        }

        let channels = source.channels();
        let mut destination = Image::new(
            self.destination_size.width,
            self.destination_size.height,
            channels,
        );
        let samples = source.as_raw();
        let output = destination.as_raw_mut();
        for &(dst, src) in &self.pairs {
            output[dst * channels..(dst + 1) * channels]
                .copy_from_slice(&samples[src * channels..(src + 1) * channels]);
        }
        Ok(destination)
    }
}

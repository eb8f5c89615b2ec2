//! Applies a [`RectificationMap`] to an image.

use crate::frame::Image;
use crate::rectify::{BorderMode, InterpolationMode, RectificationMap, RectifyError};

/// Coordinates are saturated to this magnitude before the kernel taps are computed.
const COORD_LIMIT: f32 = 1e9;

/// Resamples `source` through `map` into a new image of the source's size.
///
/// Each destination pixel reads the source at the map's coordinate with the given
/// kernel. Taps outside the source follow `border`. With [`BorderMode::Transparent`]
/// pixels that map outside the source stay 0, since the output starts zero-filled;
/// use [`apply_map_into`] to keep existing content instead.
///
/// # Arguments
///
/// * `source` - Distorted input image.
/// * `map` - Map built for the source's size.
/// * `interpolation` - Kernel used to read between pixels.
/// * `border` - Policy for reads outside the source.
///
/// # Errors
///
/// * [`RectifyError::EmptyImage`]: if the source has no samples.
/// * [`RectifyError::DimensionMismatch`]: if the map size differs from the source size.
pub fn apply_map(
    source: &Image,
    map: &RectificationMap,
    interpolation: InterpolationMode,
    border: BorderMode,
) -> Result<Image, RectifyError> {
    if source.is_empty() {
        return Err(RectifyError::EmptyImage);
    }
    if map.size() != source.size() {
        return Err(RectifyError::DimensionMismatch {
            expected: format!("map of {}", source.size()),
            found: format!("map of {}", map.size()),
        });
    }

    let mut destination = Image::new(map.width(), map.height(), source.channels());
    remap(source, map, interpolation, border, &mut destination);
    Ok(destination)
}

/// Resamples `source` through `map` into an existing `destination`.
///
/// The destination must match the map's size and the source's channel count; the
/// source may have any size. Pixels skipped by [`BorderMode::Transparent`] keep
/// their previous content.
///
/// # Errors
///
/// * [`RectifyError::EmptyImage`]: if the source has no samples.
/// * [`RectifyError::DimensionMismatch`]: if the destination size differs from the
///   map size, or the channel counts differ.
pub fn apply_map_into(
    source: &Image,
    map: &RectificationMap,
    interpolation: InterpolationMode,
    border: BorderMode,
    destination: &mut Image,
) -> Result<(), RectifyError> {
    if source.is_empty() {
        return Err(RectifyError::EmptyImage);
    }
    if destination.size() != map.size() {
        return Err(RectifyError::DimensionMismatch {
            expected: format!("destination of {}", map.size()),
            found: format!("destination of {}", destination.size()),
        });
    }
    if destination.channels() != source.channels() {
        return Err(RectifyError::DimensionMismatch {
            expected: format!("{} channels", source.channels()),
            found: format!("{} channels", destination.channels()),
        });
    }

    remap(source, map, interpolation, border, destination);
    Ok(())
}

/// Inner loop shared by [`apply_map`] and [`apply_map_into`]. Inputs are validated.
fn remap(
    source: &Image,
    map: &RectificationMap,
    interpolation: InterpolationMode,
    border: BorderMode,
    destination: &mut Image,
) {
    let channels = source.channels();
    let width = source.width() as usize;
    let height = source.height() as usize;
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let samples = source.as_raw();
    let fill = match border {
        BorderMode::Constant(value) => value as f32,
        _ => 0.0,
    };

    let mut accum = vec![0.0f32; channels];
    let coords = map.map_x().iter().zip(map.map_y());
    let pixels = destination.as_raw_mut().chunks_exact_mut(channels);

    for ((&sx, &sy), out) in coords.zip(pixels) {
        // NaN is outside the image with no nearest edge.
        if sx.is_nan() || sy.is_nan() {
            if let BorderMode::Constant(value) = border {
                out.fill(value);
            }
            continue;
        }
        // Infinities still have a nearest edge, so they resolve like any far coordinate.
        let sx = sx.clamp(-COORD_LIMIT, COORD_LIMIT);
        let sy = sy.clamp(-COORD_LIMIT, COORD_LIMIT);
        if border == BorderMode::Transparent
            && !((0.0..=max_x).contains(&sx) && (0.0..=max_y).contains(&sy))
        {
            continue;
        }

        let taps_x = interpolation.taps(sx);
        let taps_y = interpolation.taps(sy);

        accum.fill(0.0);
        for (yi, wy) in taps_y.iter() {
            if wy == 0.0 {
                continue;
            }
            let row = border.resolve(yi, height);
            for (xi, wx) in taps_x.iter() {
                let weight = wx * wy;
                if weight == 0.0 {
                    continue;
                }
                match (row, border.resolve(xi, width)) {
                    (Some(r), Some(c)) => {
                        let start = (r * width + c) * channels;
                        let pixel = &samples[start..start + channels];
                        for (acc, &sample) in accum.iter_mut().zip(pixel) {
                            *acc += weight * sample as f32;
                        }
                    }
                    _ => {
                        for acc in accum.iter_mut() {
                            *acc += weight * fill;
                        }
                    }
                }
            }
        }

        for (dst, &acc) in out.iter_mut().zip(&accum) {
            *dst = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ImageSize;

    const MODES: [InterpolationMode; 4] = [
        InterpolationMode::Nearest,
        InterpolationMode::Bilinear,
        InterpolationMode::Bicubic,
        InterpolationMode::Lanczos,
    ];

    fn pattern(width: u32, height: u32, channels: usize) -> Image {
        let mut image = Image::new(width, height, channels);
        for y in 0..height {
            for x in 0..width {
                let pixel = image.pixel_mut(x, y).unwrap();
                for (c, sample) in pixel.iter_mut().enumerate() {
                    *sample = ((x * 37 + y * 91 + c as u32 * 53) % 256) as u8;
                }
            }
        }
        image
    }

    fn identity_map(width: u32, height: u32) -> RectificationMap {
        let mut map_x = Vec::new();
        let mut map_y = Vec::new();
        for v in 0..height {
            for u in 0..width {
                map_x.push(u as f32);
                map_y.push(v as f32);
            }
        }
        RectificationMap::from_grids(ImageSize::new(width, height), map_x, map_y).unwrap()
    }

    fn constant_map(width: u32, height: u32, x: f32, y: f32) -> RectificationMap {
        let n = (width * height) as usize;
        RectificationMap::from_grids(ImageSize::new(width, height), vec![x; n], vec![y; n])
            .unwrap()
    }

    #[test]
    fn test_identity_map_reproduces_source() {
        let source = pattern(13, 9, 3);
        let map = identity_map(13, 9);
        let borders = [
            BorderMode::Constant(0),
            BorderMode::Replicate,
            BorderMode::Reflect,
            BorderMode::Transparent,
        ];

        for mode in MODES {
            for border in borders {
                let output = apply_map(&source, &map, mode, border).unwrap();
                assert_eq!(output, source, "mode {} border {}", mode, border);
            }
        }
    }

    #[test]
    fn test_constant_fill_far_outside() {
        let source = pattern(8, 8, 3);
        let map = constant_map(8, 8, -1000.5, 3.25);
        for mode in MODES {
            let output = apply_map(&source, &map, mode, BorderMode::Constant(77)).unwrap();
            assert!(output.as_raw().iter().all(|&s| s == 77), "mode {}", mode);
        }
    }

    #[test]
    fn test_replicate_far_outside_reads_corner() {
        let source = pattern(8, 6, 2);
        let map = constant_map(8, 6, -50.3, 1e6);
        for mode in MODES {
            let output = apply_map(&source, &map, mode, BorderMode::Replicate).unwrap();
            assert_eq!(output.pixel(4, 4), source.pixel(0, 5), "mode {}", mode);
        }
    }

    #[test]
    fn test_reflect_nearest() {
        let source = Image::from_raw(4, 1, 1, vec![10, 20, 30, 40]).unwrap();
        let map = RectificationMap::from_grids(
            ImageSize::new(4, 1),
            vec![-1.0, -2.0, 4.0, 5.0],
            vec![0.0, -1.0, 1.0, 0.0],
        )
        .unwrap();
        let output =
            apply_map(&source, &map, InterpolationMode::Nearest, BorderMode::Reflect).unwrap();
        assert_eq!(output.as_raw(), &[10, 20, 40, 30]);
    }

    #[test]
    fn test_midpoint_interpolation() {
        let source = Image::from_raw(2, 1, 1, vec![0, 100]).unwrap();
        let map = constant_map(2, 1, 0.5, 0.0);
        for mode in [InterpolationMode::Bilinear, InterpolationMode::Bicubic] {
            let output = apply_map(&source, &map, mode, BorderMode::Replicate).unwrap();
            assert_eq!(output.as_raw(), &[50, 50], "mode {}", mode);
        }

        // Halves round away from zero.
        let output = apply_map(
            &source,
            &map,
            InterpolationMode::Nearest,
            BorderMode::Replicate,
        )
        .unwrap();
        assert_eq!(output.as_raw(), &[100, 100]);
    }

    #[test]
    fn test_bilinear_is_continuous() {
        let mut source = Image::new(32, 4, 1);
        for y in 0..4 {
            for x in 0..32 {
                source.pixel_mut(x, y).unwrap()[0] = (x * 8) as u8;
            }
        }

        let sample = |x: f32| {
            let map = constant_map(1, 1, x, 1.5);
            let mut output = Image::new(1, 1, 1);
            apply_map_into(
                &source,
                &map,
                InterpolationMode::Bilinear,
                BorderMode::Replicate,
                &mut output,
            )
            .unwrap();
            output.as_raw()[0] as i32
        };

        for i in 0..300 {
            let x = i as f32 * 0.1;
            let here = sample(x);
            let nudged = sample(x + 0.01);
            assert!((here - nudged).abs() <= 1, "jump at x = {}", x);
        }
        assert_eq!(sample(10.5), 84);
    }

    #[test]
    fn test_transparent_keeps_destination() {
        let source = pattern(4, 4, 1);
        let map = RectificationMap::from_grids(
            ImageSize::new(3, 1),
            vec![1.0, -0.5, f32::NAN],
            vec![2.0, 1.0, 1.0],
        )
        .unwrap();
        let mut destination = Image::filled(3, 1, 1, 200);
        apply_map_into(
            &source,
            &map,
            InterpolationMode::Bilinear,
            BorderMode::Transparent,
            &mut destination,
        )
        .unwrap();
        assert_eq!(destination.as_raw(), &[source.pixel(1, 2).unwrap()[0], 200, 200]);
    }

    #[test]
    fn test_non_finite_coordinate_reads_fill() {
        let source = pattern(4, 4, 3);
        let map = RectificationMap::from_grids(
            ImageSize::new(2, 1),
            vec![f32::NAN, f32::INFINITY],
            vec![0.0, 0.0],
        )
        .unwrap();
        let mut destination = Image::new(2, 1, 3);
        apply_map_into(
            &source,
            &map,
            InterpolationMode::Lanczos,
            BorderMode::Constant(5),
            &mut destination,
        )
        .unwrap();
        assert!(destination.as_raw().iter().all(|&s| s == 5));
    }

    #[test]
    fn test_infinite_coordinate_reads_nearest_edge() {
        let source = pattern(4, 4, 1);
        let map = RectificationMap::from_grids(
            ImageSize::new(4, 1),
            vec![f32::INFINITY, f32::NEG_INFINITY, 1.0, f32::NEG_INFINITY],
            vec![2.0, 1.0, f32::INFINITY, f32::NEG_INFINITY],
        )
        .unwrap();

        let mut destination = Image::filled(4, 1, 1, 200);
        apply_map_into(
            &source,
            &map,
            InterpolationMode::Bilinear,
            BorderMode::Replicate,
            &mut destination,
        )
        .unwrap();
        let expected: Vec<u8> = [(3, 2), (0, 1), (1, 3), (0, 0)]
            .iter()
            .map(|&(x, y)| source.pixel(x, y).unwrap()[0])
            .collect();
        assert_eq!(destination.as_raw(), &expected[..]);

        let row = Image::from_raw(4, 1, 1, vec![10, 20, 30, 40]).unwrap();
        let map = constant_map(2, 1, f32::NEG_INFINITY, 0.0);
        let mut reflected = Image::filled(2, 1, 1, 200);
        apply_map_into(
            &row,
            &map,
            InterpolationMode::Nearest,
            BorderMode::Reflect,
            &mut reflected,
        )
        .unwrap();
        // -1e9 is a whole number of reflection periods away from column 0.
        assert_eq!(reflected.as_raw(), &[10, 10]);
    }

    /// Unclamped kernel response along one row of `row`, with replicated edges.
    fn raw_response(row: &[u8], mode: InterpolationMode, x: f32) -> f32 {
        mode.taps(x)
            .iter()
            .map(|(i, w)| w * row[i.clamp(0, row.len() as i64 - 1) as usize] as f32)
            .sum()
    }

    #[test]
    fn test_step_edge_overshoot_saturates() {
        let row: Vec<u8> = (0..16).map(|x| if x < 8 { 0 } else { 255 }).collect();
        let mut source = Image::new(16, 3, 1);
        for y in 0..3 {
            for x in 0..16 {
                source.pixel_mut(x, y).unwrap()[0] = row[x as usize];
            }
        }

        let xs = [0.25f32, 2.5, 6.5, 8.5, 12.5, 14.75];
        let map = RectificationMap::from_grids(
            ImageSize::new(xs.len() as u32, 1),
            xs.to_vec(),
            vec![1.0; xs.len()],
        )
        .unwrap();

        for mode in [InterpolationMode::Bicubic, InterpolationMode::Lanczos] {
            // Ringing on both sides of the edge leaves the representable range.
            assert!(raw_response(&row, mode, 8.5) > 255.5, "mode {}", mode);
            assert!(raw_response(&row, mode, 6.5) < -0.5, "mode {}", mode);

            let mut output = Image::filled(xs.len() as u32, 1, 1, 100);
            apply_map_into(&source, &map, mode, BorderMode::Replicate, &mut output).unwrap();
            assert_eq!(output.as_raw(), &[0, 0, 0, 255, 255, 255], "mode {}", mode);

            for (i, &x) in xs.iter().enumerate() {
                let expected = raw_response(&row, mode, x).round().clamp(0.0, 255.0) as u8;
                assert_eq!(output.as_raw()[i], expected, "mode {} at x = {}", mode, x);
            }
        }
    }

    #[test]
    fn test_errors() {
        let source = pattern(8, 6, 3);
        let map = identity_map(8, 6);

        let empty = Image::new(0, 6, 3);
        assert!(matches!(
            apply_map(&empty, &map, InterpolationMode::Nearest, BorderMode::Replicate),
            Err(RectifyError::EmptyImage)
        ));

        let other = identity_map(6, 8);
        assert!(matches!(
            apply_map(&source, &other, InterpolationMode::Nearest, BorderMode::Replicate),
            Err(RectifyError::DimensionMismatch { .. })
        ));

        let mut wrong_size = Image::new(6, 8, 3);
        assert!(matches!(
            apply_map_into(
                &source,
                &map,
                InterpolationMode::Nearest,
                BorderMode::Replicate,
                &mut wrong_size
            ),
            Err(RectifyError::DimensionMismatch { .. })
        ));

        let mut wrong_channels = Image::new(8, 6, 1);
        assert!(matches!(
            apply_map_into(
                &source,
                &map,
                InterpolationMode::Nearest,
                BorderMode::Replicate,
                &mut wrong_channels
            ),
            Err(RectifyError::DimensionMismatch { .. })
        ));
    }
}

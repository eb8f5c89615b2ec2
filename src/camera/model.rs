//! The complete camera description consumed by the rectification map builder.
//!
//! A [`CameraModel`] couples the physical [`Intrinsics`] of a camera with its lens
//! [`Distortion`] and, optionally, the intrinsics of the ideal camera the undistorted
//! image should be rendered through.

use crate::camera::{
    validation, CameraModelError, Distortion, ImageSize, Intrinsics, LensDistortion,
};
use crate::geometry;
use log::debug;
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use yaml_rust::{Yaml, YamlLoader};

/// Number of samples taken along each image side by [`CameraModel::fit_target_intrinsics`].
const BORDER_SAMPLES_PER_SIDE: usize = 64;

/// A calibrated camera: pinhole intrinsics, lens distortion and the target camera.
///
/// # Examples
///
/// ```rust
/// use undistort_tools::camera::{CameraModel, Distortion, Intrinsics, PlumbBob};
///
/// let intrinsics = Intrinsics::new(500.0, 500.0, 320.0, 240.0).unwrap();
/// let distortion = Distortion::PlumbBob(PlumbBob::new(-0.2, 0.05, 0.0, 0.0, 0.0));
/// let model = CameraModel::new(intrinsics, distortion).unwrap();
///
/// // Without an explicit target the undistorted image reuses the physical intrinsics.
/// assert_eq!(model.target(), &intrinsics);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    /// Intrinsics of the physical camera that captured the distorted image.
    pub intrinsics: Intrinsics,
    /// Lens distortion of the physical camera.
    pub distortion: Distortion,
    /// Intrinsics of the ideal camera the undistorted image is rendered through.
    /// `None` means the physical intrinsics are reused.
    pub target_intrinsics: Option<Intrinsics>,
    /// Resolution the camera was calibrated at, when known.
    pub resolution: Option<ImageSize>,
}

impl CameraModel {
    /// Creates a new [`CameraModel`] and validates its parameters.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    /// * [`CameraModelError::InvalidParams`]: non-finite distortion coefficients.
    pub fn new(intrinsics: Intrinsics, distortion: Distortion) -> Result<Self, CameraModelError> {
        let model = CameraModel {
            intrinsics,
            distortion,
            target_intrinsics: None,
            resolution: None,
        };
        model.validate_params()?;
        Ok(model)
    }

    /// Sets the intrinsics of the ideal camera the undistorted image is rendered through.
    pub fn with_target(mut self, target: Intrinsics) -> Self {
        self.target_intrinsics = Some(target);
        self
    }

    /// Intrinsics used to back-project destination pixels.
    pub fn target(&self) -> &Intrinsics {
        self.target_intrinsics.as_ref().unwrap_or(&self.intrinsics)
    }

    /// Validates the physical intrinsics, the target intrinsics and the distortion.
    pub fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        if let Some(target) = &self.target_intrinsics {
            validation::validate_intrinsics(target)?;
        }
        self.distortion.validate_params()
    }

    /// Location in the distorted source image that destination pixel `(u, v)` samples.
    ///
    /// The pixel is back-projected through the target intrinsics, distorted on the
    /// normalized plane and re-projected through the physical intrinsics. The result
    /// is not clamped and may lie outside the source image.
    #[inline]
    pub fn source_pixel(&self, u: f64, v: f64) -> Vector2<f64> {
        let ideal = self.target().unproject(&Vector2::new(u, v));
        let distorted = self.distortion.distort(&ideal);
        self.intrinsics.project(&distorted)
    }

    /// Inverse of [`CameraModel::source_pixel`]: maps a distorted source pixel to the
    /// pixel it lands on in the undistorted image.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::NumericalError`]: if the distortion cannot be inverted.
    pub fn undistort_pixel(&self, pixel: &Vector2<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let distorted = self.intrinsics.unproject(pixel);
        let ideal = self.distortion.undistort(&distorted)?;
        Ok(self.target().project(&ideal))
    }

    /// Projects a 3D point in camera coordinates to a distorted pixel.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::PointAtCameraCenter`]: if `z` is too close to zero.
    pub fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        // If z is very small, the point is at the camera center
        if point_3d.z < f64::EPSILON.sqrt() {
            return Err(CameraModelError::PointAtCameraCenter);
        }
        let ideal = Vector2::new(point_3d.x / point_3d.z, point_3d.y / point_3d.z);
        Ok(self.intrinsics.project(&self.distortion.distort(&ideal)))
    }

    /// Unprojects a distorted pixel to a unit-length ray in camera coordinates.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::NumericalError`]: if the distortion cannot be inverted.
    pub fn unproject(&self, pixel: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        let ideal = self.distortion.undistort(&self.intrinsics.unproject(pixel))?;
        Ok(Vector3::new(ideal.x, ideal.y, 1.0).normalize())
    }

    /// Computes target intrinsics that frame the undistorted image.
    ///
    /// Points along the border of the distorted image are undistorted. With
    /// `alpha = 0` the result zooms in until only valid source pixels are visible.
    /// With `alpha = 1` every source pixel is kept in view, which leaves empty
    /// regions near the edges. Intermediate values blend linearly.
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the distorted source image, also used for the output.
    /// * `alpha` - Free scaling parameter in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidParams`]: if `alpha` is outside `[0, 1]` or the
    ///   size is smaller than 2x2.
    /// * [`CameraModelError::NumericalError`]: if the border cannot be undistorted.
    pub fn fit_target_intrinsics(
        &self,
        size: ImageSize,
        alpha: f64,
    ) -> Result<Intrinsics, CameraModelError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(CameraModelError::InvalidParams(format!(
                "alpha must be in [0, 1], got {}",
                alpha
            )));
        }
        if size.width < 2 || size.height < 2 {
            return Err(CameraModelError::InvalidParams(format!(
                "Image size {}x{} is too small to fit intrinsics",
                size.width, size.height
            )));
        }

        let border = geometry::border_points(
            size.width as f64,
            size.height as f64,
            BORDER_SAMPLES_PER_SIDE,
        );
        let undistort_side = |points: &[Vector2<f64>]| -> Result<Vec<Vector2<f64>>, CameraModelError> {
            let ideal: Vec<Vector2<f64>> = points
                .iter()
                .filter_map(|p| {
                    self.distortion
                        .undistort(&self.intrinsics.unproject(p))
                        .ok()
                })
                .collect();
            if ideal.is_empty() {
                return Err(CameraModelError::NumericalError(
                    "No border point could be undistorted".to_string(),
                ));
            }
            Ok(ideal)
        };

        let left = undistort_side(&border.left[..])?;
        let right = undistort_side(&border.right[..])?;
        let top = undistort_side(&border.top[..])?;
        let bottom = undistort_side(&border.bottom[..])?;

        let all = || left.iter().chain(&right).chain(&top).chain(&bottom);
        let outer = (
            all().map(|p| p.x).fold(f64::INFINITY, f64::min),
            all().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max),
            all().map(|p| p.y).fold(f64::INFINITY, f64::min),
            all().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max),
        );
        let inner = (
            left.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max),
            right.iter().map(|p| p.x).fold(f64::INFINITY, f64::min),
            top.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max),
            bottom.iter().map(|p| p.y).fold(f64::INFINITY, f64::min),
        );
        if inner.1 <= inner.0 || inner.3 <= inner.2 {
            return Err(CameraModelError::NumericalError(
                "Undistorted border does not enclose a valid region".to_string(),
            ));
        }

        let span_x = size.width as f64 - 1.0;
        let span_y = size.height as f64 - 1.0;
        let frame = |(x0, x1, y0, y1): (f64, f64, f64, f64)| {
            let fx = span_x / (x1 - x0);
            let fy = span_y / (y1 - y0);
            (fx, fy, -fx * x0, -fy * y0)
        };
        let (ifx, ify, icx, icy) = frame(inner);
        let (ofx, ofy, ocx, ocy) = frame(outer);
        let blend = |a: f64, b: f64| a * (1.0 - alpha) + b * alpha;

        let fitted = Intrinsics::new(
            blend(ifx, ofx),
            blend(ify, ofy),
            blend(icx, ocx),
            blend(icy, ocy),
        )?;
        debug!("Fitted target intrinsics (alpha = {}): {:?}", alpha, fitted);
        Ok(fitted)
    }

    /// Loads a camera model from a YAML calibration file.
    ///
    /// The file is expected to contain a `cam0` node with `camera_model`,
    /// `intrinsics` (fx, fy, cx, cy) and `distortion`, plus the optional
    /// `resolution` (width, height) and `target_intrinsics`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::IOError`]: if the file cannot be read.
    /// * [`CameraModelError::YamlError`]: if the YAML content is malformed.
    /// * [`CameraModelError::InvalidParams`]: if fields are missing or have the wrong type or length.
    /// * Errors from [`CameraModel::validate_params`].
    ///
    /// # Related
    /// * [`CameraModel::save_to_yaml()`]
    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, CameraModelError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses a camera model from YAML text, see [`CameraModel::load_from_yaml`].
    pub fn from_yaml_str(contents: &str) -> Result<Self, CameraModelError> {
        let docs = YamlLoader::load_from_str(contents)?;
        if docs.is_empty() {
            return Err(CameraModelError::InvalidParams(
                "Empty YAML document".to_string(),
            ));
        }

        let cam = &docs[0]["cam0"];
        if cam.is_badvalue() {
            return Err(CameraModelError::InvalidParams(
                "YAML missing 'cam0'".to_string(),
            ));
        }

        let camera_model = cam["camera_model"].as_str().ok_or_else(|| {
            CameraModelError::InvalidParams("YAML missing 'camera_model' or not a string".to_string())
        })?;
        let intrinsics = parse_intrinsics(&cam["intrinsics"], "intrinsics")?;

        let coefficients = match &cam["distortion"] {
            Yaml::BadValue | Yaml::Null => Vec::new(),
            node => parse_floats(node, "distortion")?,
        };
        let distortion = Distortion::from_coefficients(camera_model, &coefficients)?;

        let target_intrinsics = match &cam["target_intrinsics"] {
            Yaml::BadValue | Yaml::Null => None,
            node => Some(parse_intrinsics(node, "target_intrinsics")?),
        };

        let resolution = match &cam["resolution"] {
            Yaml::BadValue | Yaml::Null => None,
            node => {
                let values = node.as_vec().ok_or_else(|| {
                    CameraModelError::InvalidParams("Invalid resolution: not an array".to_string())
                })?;
                if values.len() != 2 {
                    return Err(CameraModelError::InvalidParams(format!(
                        "Expected 2 resolution values, found {}",
                        values.len()
                    )));
                }
                let dimension = |value: &Yaml, name: &str| {
                    value
                        .as_i64()
                        .and_then(|v| u32::try_from(v).ok())
                        .ok_or_else(|| {
                            CameraModelError::InvalidParams(format!(
                                "Invalid {}: not a non-negative integer",
                                name
                            ))
                        })
                };
                Some(ImageSize {
                    width: dimension(&values[0], "width")?,
                    height: dimension(&values[1], "height")?,
                })
            }
        };

        let model = CameraModel {
            intrinsics,
            distortion,
            target_intrinsics,
            resolution,
        };

        // Validate parameters
        model.validate_params()?;

        Ok(model)
    }

    /// Saves the camera model to a YAML calibration file readable by
    /// [`CameraModel::load_from_yaml`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::YamlError`]: if serialization fails.
    /// * [`CameraModelError::IOError`]: if the file cannot be created or written.
    pub fn save_to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraModelError> {
        let yaml_err = |e: serde_yaml::Error| CameraModelError::YamlError(e.to_string());
        let intrinsics_value = |k: &Intrinsics| serde_yaml::to_value(vec![k.fx, k.fy, k.cx, k.cy]);

        let mut cam = serde_yaml::Mapping::new();
        cam.insert("camera_model".into(), self.distortion.name().into());
        cam.insert(
            "intrinsics".into(),
            intrinsics_value(&self.intrinsics).map_err(yaml_err)?,
        );
        cam.insert(
            "distortion".into(),
            serde_yaml::to_value(self.distortion.coefficients()).map_err(yaml_err)?,
        );
        if let Some(resolution) = &self.resolution {
            cam.insert(
                "resolution".into(),
                serde_yaml::to_value(vec![resolution.width, resolution.height])
                    .map_err(yaml_err)?,
            );
        }
        if let Some(target) = &self.target_intrinsics {
            cam.insert(
                "target_intrinsics".into(),
                intrinsics_value(target).map_err(yaml_err)?,
            );
        }

        let mut root = serde_yaml::Mapping::new();
        root.insert("cam0".into(), serde_yaml::Value::Mapping(cam));

        // Convert to string
        let yaml_string = serde_yaml::to_string(&root).map_err(yaml_err)?;

        // Write to file
        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;

        Ok(())
    }
}

/// Reads a YAML scalar as `f64`, accepting integer literals such as `500`.
fn yaml_f64(value: &Yaml) -> Option<f64> {
    value.as_f64().or_else(|| value.as_i64().map(|v| v as f64))
}

fn parse_floats(node: &Yaml, name: &str) -> Result<Vec<f64>, CameraModelError> {
    let values = node.as_vec().ok_or_else(|| {
        CameraModelError::InvalidParams(format!("Invalid {}: not an array", name))
    })?;
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            yaml_f64(value).ok_or_else(|| {
                CameraModelError::InvalidParams(format!(
                    "Invalid {} parameter at index {}: not a number",
                    name, i
                ))
            })
        })
        .collect()
}

fn parse_intrinsics(node: &Yaml, name: &str) -> Result<Intrinsics, CameraModelError> {
    let values = parse_floats(node, name)?;
    if values.len() != 4 {
        return Err(CameraModelError::InvalidParams(format!(
            "Expected 4 {} values (fx, fy, cx, cy), found {}",
            name,
            values.len()
        )));
    }
    Ok(Intrinsics {
        fx: values[0],
        fy: values[1],
        cx: values[2],
        cy: values[3],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Fisheye, PlumbBob};
    use approx::assert_relative_eq;

    fn barrel_model() -> CameraModel {
        let intrinsics = Intrinsics::new(500.0, 500.0, 320.0, 240.0).unwrap();
        let distortion = Distortion::PlumbBob(PlumbBob::new(-0.2, 0.05, 0.0, 0.0, 0.0));
        CameraModel::new(intrinsics, distortion).unwrap()
    }

    #[test]
    fn test_load_from_yaml() {
        let model = CameraModel::load_from_yaml("samples/rad_tan.yaml").unwrap();

        assert_eq!(model.intrinsics.fx, 461.629);
        assert_eq!(model.intrinsics.fy, 460.152);
        assert_eq!(model.intrinsics.cx, 362.68);
        assert_eq!(model.intrinsics.cy, 246.049);
        assert_eq!(model.resolution, Some(ImageSize::new(752, 480)));
        assert_eq!(model.target_intrinsics, None);

        match model.distortion {
            Distortion::PlumbBob(d) => {
                assert_eq!(d.k1, -0.28340811);
                assert_eq!(d.k2, 0.07395907);
                assert_eq!(d.p1, 0.00019359);
                assert_eq!(d.p2, 1.76187114e-05);
                assert_eq!(d.k3, 0.0);
            }
            other => panic!("Expected a plumb-bob distortion, got {:?}", other),
        }
    }

    #[test]
    fn test_load_sample_models() {
        let rational = CameraModel::load_from_yaml("samples/rational.yaml").unwrap();
        assert!(matches!(rational.distortion, Distortion::Rational(_)));
        assert!(rational.target_intrinsics.is_some());

        let fisheye = CameraModel::load_from_yaml("samples/fisheye.yaml").unwrap();
        assert!(matches!(fisheye.distortion, Distortion::Fisheye(_)));

        let pinhole = CameraModel::load_from_yaml("samples/pinhole.yaml").unwrap();
        assert_eq!(pinhole.distortion, Distortion::None);
    }

    #[test]
    fn test_save_to_yaml_round_trip() {
        std::fs::create_dir_all("output").expect("Failed to create output directory for test.");
        let output_path = "output/camera_model_round_trip.yaml";

        let model = barrel_model()
            .with_target(Intrinsics::new(400.0, 400.0, 320.0, 240.0).unwrap());
        let model = CameraModel {
            resolution: Some(ImageSize::new(640, 480)),
            ..model
        };
        model.save_to_yaml(output_path).unwrap();

        let saved = CameraModel::load_from_yaml(output_path).unwrap();
        assert_eq!(saved, model);

        std::fs::remove_file(output_path).unwrap();
    }

    #[test]
    fn test_from_yaml_str_errors() {
        let missing_cam = "cam1:\n  camera_model: rad_tan\n";
        assert!(matches!(
            CameraModel::from_yaml_str(missing_cam),
            Err(CameraModelError::InvalidParams(_))
        ));

        let wrong_count = "cam0:\n  camera_model: rad_tan\n  intrinsics: [500, 500, 320, 240]\n  distortion: [0.1, 0.2]\n";
        assert!(matches!(
            CameraModel::from_yaml_str(wrong_count),
            Err(CameraModelError::InvalidParams(_))
        ));

        let zero_focal = "cam0:\n  camera_model: pinhole\n  intrinsics: [0, 500, 320, 240]\n";
        assert!(matches!(
            CameraModel::from_yaml_str(zero_focal),
            Err(CameraModelError::FocalLengthMustBePositive)
        ));

        assert!(matches!(
            CameraModel::from_yaml_str("cam0: [unclosed"),
            Err(CameraModelError::YamlError(_))
        ));
    }

    #[test]
    fn test_integer_intrinsics_are_accepted() {
        let yaml = "cam0:\n  camera_model: rad_tan\n  intrinsics: [500, 500, 320, 240]\n  distortion: [-0.2, 0.05, 0, 0]\n";
        let model = CameraModel::from_yaml_str(yaml).unwrap();
        assert_eq!(model, barrel_model());
    }

    #[test]
    fn test_source_pixel_at_principal_point() {
        let model = barrel_model();
        let source = model.source_pixel(320.0, 240.0);
        assert_eq!(source, Vector2::new(320.0, 240.0));
    }

    #[test]
    fn test_undistort_pixel_inverts_source_pixel() {
        let model = barrel_model()
            .with_target(Intrinsics::new(450.0, 460.0, 318.0, 242.0).unwrap());
        for (u, v) in [(0.0, 0.0), (639.0, 0.0), (100.0, 400.0), (320.0, 240.0), (639.0, 479.0)] {
            let source = model.source_pixel(u, v);
            let back = model.undistort_pixel(&source).unwrap();
            assert_relative_eq!(back, Vector2::new(u, v), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_project_unproject() {
        let intrinsics = Intrinsics::new(380.0, 380.0, 320.0, 240.0).unwrap();
        let model = CameraModel::new(
            intrinsics,
            Distortion::Fisheye(Fisheye::new(-0.01, 0.004, 0.0, 0.0)),
        )
        .unwrap();

        let point_3d = Vector3::new(0.5, -0.3, 2.0);
        let pixel = model.project(&point_3d).unwrap();
        let ray = model.unproject(&pixel).unwrap();
        assert_relative_eq!(ray, point_3d.normalize(), epsilon = 1e-6);

        assert!(matches!(
            model.project(&Vector3::new(1.0, 1.0, 0.0)),
            Err(CameraModelError::PointAtCameraCenter)
        ));
    }

    #[test]
    fn test_fit_target_intrinsics() {
        let model = barrel_model();
        let size = ImageSize::new(640, 480);

        let inner = model.fit_target_intrinsics(size, 0.0).unwrap();
        let outer = model.fit_target_intrinsics(size, 1.0).unwrap();

        // Barrel distortion stretches the undistorted border outwards, so keeping all
        // source pixels in view needs a shorter focal length than cropping to valid ones.
        assert!(outer.fx < inner.fx);
        assert!(outer.fy < inner.fy);

        let half = model.fit_target_intrinsics(size, 0.5).unwrap();
        assert_relative_eq!(half.fx, 0.5 * (inner.fx + outer.fx), epsilon = 1e-9);

        assert!(matches!(
            model.fit_target_intrinsics(size, 1.5),
            Err(CameraModelError::InvalidParams(_))
        ));
        assert!(model.fit_target_intrinsics(ImageSize::new(1, 480), 0.0).is_err());
    }

    #[test]
    fn test_invalid_target_is_rejected() {
        let mut model = barrel_model();
        model.target_intrinsics = Some(Intrinsics {
            fx: -1.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
        });
        assert!(matches!(
            model.validate_params(),
            Err(CameraModelError::FocalLengthMustBePositive)
        ));
    }
}

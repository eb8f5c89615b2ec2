use crate::camera::{CameraModelError, ImageSize, Intrinsics};
use crate::frame::Image;
use crate::rectify::{BorderMode, InterpolationMode, RectifyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum UtilError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
    #[error("Image error: {0}")]
    ImageError(String),
    #[error("IO Error: {0}")]
    IOError(String),
    #[error(transparent)]
    Rectify(#[from] RectifyError),
    #[error(transparent)]
    Camera(#[from] CameraModelError),
}

impl From<std::io::Error> for UtilError {
    fn from(err: std::io::Error) -> Self {
        UtilError::IOError(err.to_string())
    }
}

/// Ensure the parent directory of `path` exists
pub fn ensure_parent_dir<P: AsRef<Path>>(path: P) -> Result<(), UtilError> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                UtilError::IOError(format!("Failed to create output directory: {e}"))
            })?;
        }
    }
    Ok(())
}

/// Load an image from disk, keeping its channel layout
///
/// # Arguments
///
/// * `image_path` - Path to the image file
///
/// # Returns
///
/// * `Result<Image, UtilError>` - Loaded 8-bit image with 1 to 4 channels
pub fn load_image<P: AsRef<Path>>(image_path: P) -> Result<Image, UtilError> {
    let img = image::open(image_path)
        .map_err(|e| UtilError::ImageError(format!("Failed to load image: {e}")))?;

    Ok(Image::from_dynamic(&img))
}

/// Save an image, choosing the format from the file extension
///
/// Missing parent directories are created.
pub fn save_image<P: AsRef<Path>>(image: &Image, image_path: P) -> Result<(), UtilError> {
    let dynamic = image.to_dynamic().ok_or_else(|| {
        UtilError::InvalidParams(format!(
            "Cannot encode an image with {} channels",
            image.channels()
        ))
    })?;
    ensure_parent_dir(&image_path)?;
    dynamic
        .save(image_path)
        .map_err(|e| UtilError::ImageError(format!("Failed to save image: {e}")))
}

/// Calculate Peak Signal-to-Noise Ratio (PSNR) between two images
///
/// Every sample of every channel contributes to the mean squared error.
///
/// # Arguments
///
/// * `img1` - First image
/// * `img2` - Second image
///
/// # Returns
///
/// * `Result<f64, UtilError>` - PSNR value in dB, infinite for identical images
pub fn calculate_psnr(img1: &Image, img2: &Image) -> Result<f64, UtilError> {
    if img1.size() != img2.size() || img1.channels() != img2.channels() {
        return Err(UtilError::InvalidParams(
            "Images must have the same dimensions".to_string(),
        ));
    }

    let samples = img1.as_raw().len();
    if samples == 0 {
        return Ok(f64::INFINITY); // Perfect match for empty images
    }

    let mse = img1
        .as_raw()
        .iter()
        .zip(img2.as_raw())
        .map(|(&a, &b)| {
            let diff = a as f64 - b as f64;
            diff * diff
        })
        .sum::<f64>()
        / samples as f64;

    if mse <= 1e-10 {
        Ok(f64::INFINITY) // Perfect match
    } else {
        Ok(10.0 * (255.0 * 255.0 / mse).log10())
    }
}

/// Summary of one undistortion run
#[derive(Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub input: String,
    pub output: String,
    pub calibration: String,
    pub camera_model: String,
    pub source_size: ImageSize,
    pub output_size: ImageSize,
    pub channels: usize,
    pub interpolation: InterpolationMode,
    pub border: BorderMode,
    pub target_intrinsics: Intrinsics,
    pub valid_fraction: f64,
    pub build_time_ms: f64,
    pub apply_time_ms: f64,
}

impl fmt::Debug for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run Report [ {} -> {}, model: {}, size: {}, interpolation: {}, border: {}, valid: {:.1}%, build: {:.2} ms, apply: {:.2} ms ]",
            self.input,
            self.output,
            self.camera_model,
            self.output_size,
            self.interpolation,
            self.border,
            self.valid_fraction * 100.0,
            self.build_time_ms,
            self.apply_time_ms
        )
    }
}

/// Export a run report as pretty-printed JSON
pub fn export_report_json<P: AsRef<Path>>(report: &RunReport, path: P) -> Result<(), UtilError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| UtilError::InvalidParams(format!("Failed to serialize report: {e}")))?;

    ensure_parent_dir(&path)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

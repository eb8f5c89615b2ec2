//! Image Undistortion Tool
//!
//! Removes lens distortion from an image using a calibration file. Supported camera
//! models:
//! - Pinhole (no distortion)
//! - Radial-Tangential distortion model (plumb bob)
//! - Rational polynomial distortion model
//! - Kannala-Brandt fisheye model
//!
//! Usage:
//! ```bash
//! cargo run --release --bin undistort -- \
//!   --input distorted.png \
//!   --calib samples/rad_tan.yaml \
//!   --output output/undistorted.png \
//!   --interpolation bicubic \
//!   --alpha 0.0
//! ```

use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Instant;
use undistort_tools::camera::CameraModel;
use undistort_tools::rectify::{self, BorderMode, InterpolationMode};
use undistort_tools::util::{self, RunReport};

/// Lens undistortion tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the distorted input image
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Path to the camera calibration YAML file
    #[arg(short = 'c', long)]
    calib: PathBuf,

    /// Path of the undistorted output image
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Interpolation kernel (nearest, bilinear, bicubic, lanczos)
    #[arg(long, default_value = "bilinear")]
    interpolation: InterpolationMode,

    /// Border handling (constant, constant(v), replicate, reflect, transparent)
    #[arg(long, default_value = "constant")]
    border: BorderMode,

    /// Fill value for the constant border, overrides the value given with --border
    #[arg(long)]
    fill: Option<u8>,

    /// Fit the output camera: 0 keeps only valid pixels, 1 keeps every source pixel
    #[arg(long)]
    alpha: Option<f64>,

    /// Optional path of a JSON run report
    #[arg(long)]
    report: Option<PathBuf>,
}

/// Applies `--fill` to a constant border. Other border modes ignore it.
fn resolve_border(border: BorderMode, fill: Option<u8>) -> BorderMode {
    match (border, fill) {
        (BorderMode::Constant(_), Some(value)) => BorderMode::Constant(value),
        (border, _) => border,
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    let cli = Cli::parse();

    info!("Loading calibration from: {:?}", cli.calib);
    let mut model = CameraModel::load_from_yaml(&cli.calib)?;
    info!(
        "Camera model: {}, intrinsics: {:?}, distortion: {:?}",
        model.distortion.name(),
        model.intrinsics,
        model.distortion
    );

    let start = Instant::now();
    let source = util::load_image(&cli.input)?;
    info!(
        "Loaded {} image with {} channels in {:.2} ms",
        source.size(),
        source.channels(),
        elapsed_ms(start)
    );

    if let Some(resolution) = model.resolution {
        if resolution != source.size() {
            warn!(
                "Calibration resolution {} differs from image size {}",
                resolution,
                source.size()
            );
        }
    }

    if let Some(alpha) = cli.alpha {
        let target = model.fit_target_intrinsics(source.size(), alpha)?;
        info!("Target intrinsics (alpha = {}): {:?}", alpha, target);
        model = model.with_target(target);
    }

    let border = resolve_border(cli.border, cli.fill);

    let start = Instant::now();
    let map = rectify::build_map(&model, source.size())?;
    let build_time_ms = elapsed_ms(start);
    let valid_fraction = map.valid_fraction(source.size());
    info!(
        "Built {} rectification map in {:.2} ms ({:.1}% of pixels inside the source)",
        map.size(),
        build_time_ms,
        valid_fraction * 100.0
    );

    let start = Instant::now();
    let output = rectify::apply_map(&source, &map, cli.interpolation, border)?;
    let apply_time_ms = elapsed_ms(start);
    info!(
        "Resampled with {} interpolation and {} border in {:.2} ms",
        cli.interpolation, border, apply_time_ms
    );

    util::save_image(&output, &cli.output)?;
    info!("Saved undistorted image to: {:?}", cli.output);

    if let Some(report_path) = &cli.report {
        let report = RunReport {
            input: cli.input.display().to_string(),
            output: cli.output.display().to_string(),
            calibration: cli.calib.display().to_string(),
            camera_model: model.distortion.name().to_string(),
            source_size: source.size(),
            output_size: output.size(),
            channels: output.channels(),
            interpolation: cli.interpolation,
            border,
            target_intrinsics: *model.target(),
            valid_fraction,
            build_time_ms,
            apply_time_ms,
        };
        util::export_report_json(&report, report_path)?;
        info!("{:?}", report);
        info!("Report exported to: {:?}", report_path);
    }

    Ok(())
}

//! Repaint a target image as brush strokes on a simulated canvas.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use impasto_mixer::{PaintMixer, Palette};
use impasto_renderer::{
    Brush, BrushStrokeSample, Canvas, FootprintBrush, Renderer, TextureBrush,
    TextureBrushDictionary,
};
use impasto_sbr::{PainterConfig, PictureTargetSbrPainter};
use tracing::{info, warn};

/// Longest canvas side of the painted output.
const RENDER_SIZE: usize = 2048;

#[derive(Debug, Parser)]
#[command(name = "sbr-painter", about = "Stroke-based painter")]
struct Args {
    /// Input picture
    #[arg(short = 'i', long = "image")]
    image: PathBuf,

    /// Optional painting mask (grayscale; zero pixels are skipped)
    #[arg(short = 'm', long = "mask")]
    mask: Option<PathBuf>,

    /// Optional initial canvas image
    #[arg(short = 'a', long = "canvas")]
    canvas: Option<PathBuf>,

    /// Painter configuration (JSON)
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Output file for the rendered image
    #[arg(short = 'o', long = "output", default_value = "sbr.png")]
    output: PathBuf,
}

/// Resolve a config-relative path.
fn resolve(config_path: &Path, file: &str) -> PathBuf {
    let candidate = PathBuf::from(file);
    if candidate.is_absolute() || candidate.exists() {
        return candidate;
    }
    config_path
        .parent()
        .map(|dir| dir.join(file))
        .unwrap_or(candidate)
}

fn run(args: &Args) -> anyhow::Result<()> {
    info!(path = %args.config.display(), "loading config");
    let config_file = File::open(&args.config)
        .with_context(|| format!("opening {}", args.config.display()))?;
    let config: PainterConfig = serde_json::from_reader(config_file)
        .with_context(|| format!("parsing {}", args.config.display()))?;

    info!("loading base pigments");
    let palette = match &config.base_pigments {
        Some(name) => {
            let path = resolve(&args.config, name);
            let file =
                File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            Palette::load(file).with_context(|| format!("parsing {}", path.display()))?
        }
        None => anyhow::bail!("config is missing base_pigments"),
    };

    info!(path = %args.image.display(), "loading target image");
    let image = impasto_io::read_image_rgb(&args.image, false)?;

    // canvas size: longest side at the render size, aspect preserved
    let (rows, cols) = if image.cols() > image.rows() {
        let cols = RENDER_SIZE;
        let rows = ((cols as f64 / image.cols() as f64) * image.rows() as f64) as usize;
        (rows.max(1), cols)
    } else {
        let rows = RENDER_SIZE;
        let cols = ((rows as f64 / image.rows() as f64) * image.cols() as f64) as usize;
        (rows, cols.max(1))
    };
    info!(rows, cols, "creating canvas");

    let mut canvas = Canvas::new(rows, cols);
    if let Some(millis) = config.drying_time_millis {
        canvas.set_drying_time(Duration::from_millis(millis));
    }
    if let Some(path) = &args.canvas {
        let background = impasto_io::read_image_rgb(path, true)?;
        canvas.set_background(&background.scaled(rows, cols));
    }

    // a scanned footprint selects the footprint brush; otherwise the
    // texture brush runs with a scanned or synthesized stroke sample
    let footprint_path = resolve(&args.config, "data/footprint/footprint.png");
    let brush: Box<dyn Brush> = match impasto_io::read_image_gray(&footprint_path) {
        Ok(footprint) => {
            info!(path = %footprint_path.display(), "using the footprint brush");
            Box::new(FootprintBrush::with_footprint(footprint, 10.0))
        }
        Err(_) => {
            let sample_dir = resolve(&args.config, "data/brush_sample/sample_0");
            let sample = match BrushStrokeSample::load(&sample_dir) {
                Ok(sample) => sample,
                Err(err) => {
                    warn!(%err, "no scanned brush sample; using the synthesized one");
                    BrushStrokeSample::default_sample()
                }
            };
            let mut texture_brush = TextureBrush::new(sample);
            texture_brush.set_smudge_enabled(config.enable_smudge.unwrap_or(true));
            // a folder of scanned stroke textures enables per-stroke
            // texture selection
            let textures_dir = resolve(&args.config, "data/textures");
            if let Ok(dictionary) = TextureBrushDictionary::load(&textures_dir) {
                info!(path = %textures_dir.display(), "using the texture dictionary");
                texture_brush.set_dictionary(Some(dictionary));
            }
            Box::new(texture_brush)
        }
    };

    let (mask_rows, mask_cols) = (image.rows(), image.cols());
    let mut painter = PictureTargetSbrPainter::new(
        canvas,
        PaintMixer::new(palette),
        brush,
        image,
    );
    painter.set_coat_canvas(config.coat_canvas);
    painter.params_input = config.image_params.clone();
    painter.params_orientations = config.orientation_params.clone();
    painter.params_stroke = config.stroke_params.clone();
    painter.params_convergence = config.convergence_params.clone();
    if let Some(path) = &args.mask {
        // the mask lives in target-image space
        let mask = impasto_io::read_image_gray(path)?;
        painter.set_mask(Some(mask.scaled(mask_rows, mask_cols)));
    }

    info!("start painting");
    let converged = painter.paint()?;
    info!(converged, "painting finished");

    let result = Renderer::new().render(painter.canvas());
    info!(path = %args.output.display(), "writing result");
    impasto_io::write_image_rgb(&args.output, &result, true)?;

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let _ = Args::command().print_help();
            ExitCode::FAILURE
        }
    }
}

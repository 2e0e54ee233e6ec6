//! Extract a paint palette matching an input picture, mixed from a set
//! of base pigments.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use impasto_mixer::{PaintMixer, Palette};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "palette-extract", about = "Mix a palette for an image from base pigments")]
struct Args {
    /// Path to the base pigment set file (JSON)
    #[arg(short = 'b', long = "basepigments")]
    base_pigments: PathBuf,

    /// Input picture
    #[arg(short = 'i', long = "image")]
    image: PathBuf,

    /// Desired number of pigments in the extracted palette
    #[arg(short = 'n')]
    count: u32,

    /// Output file for the extracted palette
    #[arg(short = 'o', long = "output", default_value = "extractedPalette.json")]
    output: PathBuf,
}

fn run(args: &Args) -> anyhow::Result<()> {
    info!(path = %args.base_pigments.display(), "loading base pigments");
    let file = File::open(&args.base_pigments)
        .with_context(|| format!("opening {}", args.base_pigments.display()))?;
    let base_pigments = Palette::load(file)
        .with_context(|| format!("parsing {}", args.base_pigments.display()))?;

    info!(path = %args.image.display(), "loading input picture");
    let image = impasto_io::read_image_rgb(&args.image, false)?;

    let mixer = PaintMixer::new(base_pigments);
    let palette = mixer.mix_from_image(&image, args.count)?;
    info!(paints = palette.len(), "palette mixed");

    let out = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    palette.save(out)?;

    // visualizations next to the palette
    let base_vis = args.output.with_extension("basePigments.jpg");
    impasto_io::write_image_rgb(&base_vis, &mixer.palette().visualize(1.0), false)?;
    let palette_vis = args.output.with_extension("jpg");
    impasto_io::write_image_rgb(&palette_vis, &palette.visualize(1.0), false)?;

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

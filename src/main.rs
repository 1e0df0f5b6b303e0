use std::{path::PathBuf, sync::Arc, thread::available_parallelism};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use retrotone::{
    batch::{run_directory, run_file},
    Filter, LineBlend, LineBlendConfig, Vintage, VintageConfig,
};

#[derive(Parser)]
#[command(version, about = "Line-blending and vintage filters for images")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// The amount of images processed concurrently for directory input
    #[arg(short = 'j', long, value_name = "NUM", global = true)]
    jobs: Option<usize>,
}

#[derive(clap::Args)]
struct Paths {
    /// Image file or directory of images to read
    input: PathBuf,

    /// Output file, or output directory when the input is a directory
    output: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Replaces near-black line pixels with a darkened mid-tone average
    LineBlend {
        #[command(flatten)]
        paths: Paths,

        /// Pixels with all channels below this value are recolored
        #[arg(short = 'b', long, value_name = "VALUE", default_value_t = 50)]
        black_threshold: u8,

        /// Pixels with all channels above this value are left out of the average
        #[arg(short = 'w', long, value_name = "VALUE", default_value_t = 230)]
        white_threshold: u8,

        /// Multiplier for the replacement color (0-1)
        #[arg(short = 's', long, default_value_t = 0.5)]
        saturation: f64,
    },

    /// Gives the image a faded sepia look with film grain
    Vintage {
        #[command(flatten)]
        paths: Paths,

        /// Weight of the sepia image against the original (0-1)
        #[arg(long, value_name = "AMOUNT", default_value_t = 0.5)]
        sepia_amount: f64,

        /// Standard deviation of the grain
        #[arg(long, value_name = "STDDEV", default_value_t = 5.0)]
        noise_amount: f64,

        /// Lets the grain cover pure white areas too
        #[arg(long)]
        no_preserve_white: bool,

        /// Larger images are downscaled so no side exceeds this
        #[arg(long, value_name = "PX", default_value_t = 1500)]
        max_dimension: usize,

        /// Contrast factor applied after the blur
        #[arg(long, value_name = "FACTOR", default_value_t = 0.85)]
        contrast: f64,

        /// Standard deviation of the softening blur
        #[arg(long, value_name = "SIGMA", default_value_t = 0.5)]
        blur_sigma: f64,

        /// Seed for the grain, for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // configs are validated here, before anything is decoded
    let (filter, paths, seed): (Arc<dyn Filter>, Paths, Option<u64>) = match args.command {
        Command::LineBlend {
            paths,
            black_threshold,
            white_threshold,
            saturation,
        } => {
            let config = LineBlendConfig {
                black_threshold,
                white_threshold,
                saturation,
            };
            (Arc::new(LineBlend::new(config)?), paths, None)
        }
        Command::Vintage {
            paths,
            sepia_amount,
            noise_amount,
            no_preserve_white,
            max_dimension,
            contrast,
            blur_sigma,
            seed,
        } => {
            let config = VintageConfig {
                sepia_amount,
                noise_amount,
                preserve_white: !no_preserve_white,
                max_dimension,
                contrast_factor: contrast,
                blur_sigma,
            };
            (Arc::new(Vintage::new(config)?), paths, seed)
        }
    };

    if paths.input.is_dir() {
        let jobs = args
            .jobs
            .unwrap_or_else(|| available_parallelism().map(|n| n.get()).unwrap_or(1));
        let summary = run_directory(filter, &paths.input, &paths.output, jobs, seed).await?;
        println!(
            "Processed {} of {} images ({} failed)",
            summary.processed(),
            summary.reports.len(),
            summary.failed()
        );
    } else {
        tokio::task::spawn_blocking(move || {
            run_file(filter.as_ref(), &paths.input, &paths.output, seed)
        })
        .await??;
    }

    Ok(())
}

//! Compute the sea area reachable from a start point.
//!
//! Datasets and checkpoints are cached under `GST_OUTPUT_DIR`; rerunning
//! with the same options resumes from the last completed step.

use clap::Parser;
use gst_cli::{init_tracing, RuntimeConfig, SailArgs};
use gst_core::{sail, GeoJsonProvider, RunOptions, SphericalEngine};

/// Sail outward from a start point and save every step of the wavefront
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(flatten)]
    sail: SailArgs,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.sail.debug)?;

    let runtime = RuntimeConfig::from_env();
    let config = args.sail.to_config();
    let provider = GeoJsonProvider::new(&runtime.data_dir);
    let engine = SphericalEngine::with_checks(config.debug);
    let options = RunOptions {
        threads: runtime.threads,
    };

    tracing::info!(
        lon = config.lon,
        lat = config.lat,
        speed_kn = config.speed_kn,
        duration_days = config.duration_days,
        "sailing"
    );
    let outcome = sail(&config, &provider, &engine, &runtime.output_dir, &options)?;

    println!("Run directory: {}", outcome.layout.run_dir().display());
    println!(
        "  Steps: {} ({} computed, {} resumed)",
        outcome.summary.nstep, outcome.summary.computed, outcome.summary.resumed
    );
    if let Some(bounds) = outcome.summary.region.bounds() {
        println!(
            "  Bounds: ({:.4}, {:.4}) .. ({:.4}, {:.4})",
            bounds.min().x,
            bounds.min().y,
            bounds.max().x,
            bounds.max().y
        );
    }
    Ok(())
}

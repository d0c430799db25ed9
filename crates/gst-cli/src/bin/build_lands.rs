//! Build the land, canal and mask datasets without sailing.

use clap::Parser;
use gst_cli::{init_tracing, RuntimeConfig, SailArgs};
use gst_core::{build_datasets, GeoJsonProvider, RunOptions, SphericalEngine};

/// Build or refresh the obstacle datasets for a set of sailing options
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

    let layout = build_datasets(&config, &provider, &engine, &runtime.output_dir, &options)?;

    println!("Datasets: {}", layout.dataset_dir().display());
    println!("  Lands:  {}", layout.unbuffered_lands().display());
    println!("  Canals: {}", layout.canals().display());
    println!("  Mask:   {}", layout.mask().display());
    Ok(())
}

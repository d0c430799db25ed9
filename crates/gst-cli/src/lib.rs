//! GST CLI - command line tools for the sailing reachability engine.
//!
//! Binaries:
//! - sail: run a full wavefront expansion from a start point
//! - build_lands: build the obstacle datasets only

use std::env;
use std::path::PathBuf;

use clap::Args;
use gst_core::{Resolution, SailConfig, DEFAULT_CANALS};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Runtime settings from the environment.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub output_dir: PathBuf,
    pub data_dir: PathBuf,
    pub threads: Option<usize>,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self {
            output_dir: env::var("GST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("gst-output")),
            data_dir: env::var("GST_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("gst-data")),
            threads: env::var("GST_THREADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0),
        }
    }
}

/// Install the global subscriber; `RUST_LOG` adds to the default filter.
pub fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let directive = if debug { "gst_core=debug" } else { "gst_core=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?))
        .try_init()?;
    Ok(())
}

fn parse_resolution(code: &str) -> Result<Resolution, String> {
    Resolution::from_code(code).ok_or_else(|| format!("unknown resolution '{code}', expected one of c, l, i, h, f"))
}

/// Options shared by every binary that needs a [`SailConfig`].
#[derive(Args, Debug, Clone)]
pub struct SailArgs {
    /// Start longitude in degrees
    #[arg(allow_hyphen_values = true)]
    pub lon: f64,

    /// Start latitude in degrees
    #[arg(allow_hyphen_values = true)]
    pub lat: f64,

    /// Vessel speed in knots
    pub spd: f64,

    /// Conservatism factor
    #[arg(long, default_value_t = 2.0)]
    pub conservatism: f64,

    /// Sailing time in days
    #[arg(long, default_value_t = 1.0)]
    pub duration: f64,

    /// Steps between obstacle re-evaluations
    #[arg(long, default_value_t = 100)]
    pub freq_land: usize,

    /// Steps between region simplifications
    #[arg(long, default_value_t = 25)]
    pub freq_simp: usize,

    /// Directions sampled around each vertex
    #[arg(long, default_value_t = 9)]
    pub n_ang: usize,

    /// Distance per step in meters
    #[arg(long, default_value_t = 10_000.0)]
    pub precision: f64,

    /// Dataset resolution tier (c, l, i, h, f)
    #[arg(long, default_value = "c", value_parser = parse_resolution)]
    pub resolution: Resolution,

    /// Coincidence tolerance in degrees
    #[arg(long, default_value_t = 1.0e-10)]
    pub tolerance: f64,

    /// Include minor islands
    #[arg(long)]
    pub detailed: bool,

    /// Only build the land reachable from the start point
    #[arg(long)]
    pub local: bool,

    /// Validate intermediate geometries and log verbosely
    #[arg(long)]
    pub debug: bool,

    /// Canal to open (repeatable; defaults to Panama and Suez)
    #[arg(long = "canal", conflicts_with = "no_canals")]
    pub canals: Vec<String>,

    /// Treat every canal as land
    #[arg(long)]
    pub no_canals: bool,
}

impl SailArgs {
    pub fn to_config(&self) -> SailConfig {
        let canals = if self.no_canals {
            Vec::new()
        } else if self.canals.is_empty() {
            DEFAULT_CANALS.iter().map(|s| s.to_string()).collect()
        } else {
            self.canals.clone()
        };
        SailConfig {
            lon: self.lon,
            lat: self.lat,
            speed_kn: self.spd,
            duration_days: self.duration,
            conservatism: self.conservatism,
            angular_resolution: self.n_ang,
            precision_m: self.precision,
            land_frequency: self.freq_land,
            simplify_frequency: self.freq_simp,
            tolerance_deg: self.tolerance,
            resolution: self.resolution,
            detailed: self.detailed,
            local: self.local,
            debug: self.debug,
            canals,
        }
    }
}

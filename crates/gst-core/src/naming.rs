//! Configuration-keyed directory layout for datasets and checkpoints.
//!
//! Every value that influences the geometry appears in a path segment, so two
//! configurations that differ in any of them never share a file.

use std::path::{Path, PathBuf};

use crate::config::SailConfig;

/// Format a number like C's `%.2e`, e.g. `1.00e+04`.
pub fn sci(value: f64) -> String {
    let formatted = format!("{value:.2e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        None => formatted,
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "T"
    } else {
        "F"
    }
}

fn position(lon: f64, lat: f64) -> String {
    format!("lon={lon:+011.6}_lat={lat:+010.6}")
}

/// File name of a checkpoint for one step.
pub fn step_file_name(step: usize) -> String {
    format!("istep={step:06}.wkb.gz")
}

/// Parse a step number back out of [`step_file_name`] output.
pub fn parse_step_file_name(name: &str) -> Option<usize> {
    name.strip_prefix("istep=")?
        .strip_suffix(".wkb.gz")?
        .parse()
        .ok()
}

/// Resolved paths of one configuration under an output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    dataset_dir: PathBuf,
    mask_dir: PathBuf,
    run_dir: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl AsRef<Path>, config: &SailConfig) -> Self {
        let dataset_dir = root.as_ref().join(format!(
            "res={}_detailed={}_cons={}_tol={}_canals={}",
            config.resolution,
            flag(config.detailed),
            sci(config.conservatism),
            sci(config.tolerance_deg),
            canal_segment(&config.canal_names()),
        ));

        let mut mask = format!(
            "local={}_nAng={}_prec={}",
            flag(config.local),
            config.angular_resolution,
            sci(config.precision_m),
        );
        if config.local {
            mask.push_str(&format!(
                "_{}_dur={:.2}_spd={:.1}",
                position(config.lon, config.lat),
                config.duration_days,
                config.speed_kn,
            ));
        }
        let mask_dir = dataset_dir.join(mask);

        let mut run = format!(
            "freqLand={}_freqSimp={}",
            config.land_frequency, config.simplify_frequency
        );
        if !config.local {
            run.push('_');
            run.push_str(&position(config.lon, config.lat));
        }
        let run_dir = mask_dir.join(run);

        Self {
            dataset_dir,
            mask_dir,
            run_dir,
        }
    }

    /// Directory of the unbuffered land and canal datasets.
    pub fn dataset_dir(&self) -> &Path {
        &self.dataset_dir
    }

    /// Directory of the buffered, canal-cut obstacle mask.
    pub fn mask_dir(&self) -> &Path {
        &self.mask_dir
    }

    /// Directory holding the checkpoints of one run.
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn unbuffered_lands(&self) -> PathBuf {
        self.dataset_dir.join("allLands.wkb.gz")
    }

    pub fn unbuffered_tiles(&self) -> PathBuf {
        self.dataset_dir.join("allLands")
    }

    pub fn canals(&self) -> PathBuf {
        self.dataset_dir.join("allCanals.wkb.gz")
    }

    pub fn mask(&self) -> PathBuf {
        self.mask_dir.join("allLands.wkb.gz")
    }

    pub fn mask_tiles(&self) -> PathBuf {
        self.mask_dir.join("allLands")
    }

    pub fn manifest(&self) -> PathBuf {
        self.run_dir.join("manifest.json")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.run_dir.join(".lock")
    }
}

/// Path-safe summary of a normalised canal list, `none` when empty.
fn canal_segment(names: &[String]) -> String {
    if names.is_empty() {
        return "none".to_string();
    }
    names
        .iter()
        .map(|name| {
            let mut slug = String::with_capacity(name.len());
            for c in name.chars() {
                if c.is_ascii_alphanumeric() {
                    slug.push(c.to_ascii_lowercase());
                } else if !slug.ends_with('-') {
                    slug.push('-');
                }
            }
            slug.trim_matches('-').to_string()
        })
        .collect::<Vec<_>>()
        .join("+")
}

/// Name of a land tile derived from its centroid and area.
pub fn tile_file_name(centroid_lon: f64, centroid_lat: f64, area: f64) -> String {
    format!("{centroid_lon:+011.6},{centroid_lat:+010.6},{area:012.7}.wkb.gz")
}

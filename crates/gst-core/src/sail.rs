//! End-to-end sailing run: datasets, checkpoints and the wavefront loop.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SailConfig;
use crate::engine::GeometryEngine;
use crate::errors::Result;
use crate::io;
use crate::naming::StoreLayout;
use crate::obstacles::ObstacleBuilder;
use crate::provider::DatasetProvider;
use crate::stepper::{RunSummary, Stepper};
use crate::store::{FsCheckpointStore, RunLock};

/// Description of a run directory, written once when the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub config: SailConfig,
    pub nstep: usize,
    pub max_distance_m: f64,
    pub step_duration_s: i64,
    pub created_at: DateTime<Utc>,
}

impl RunManifest {
    pub fn new(config: &SailConfig) -> Self {
        Self {
            config: config.clone(),
            nstep: config.nstep(),
            max_distance_m: config.max_distance_m(),
            step_duration_s: config.step_duration().num_seconds(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SailOutcome {
    pub layout: StoreLayout,
    pub summary: RunSummary,
}

/// Options that do not influence the geometry.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Tile builder threads; `None` uses every core.
    pub threads: Option<usize>,
}

/// Build or reuse every dataset for `config` under `root`.
pub fn build_datasets(
    config: &SailConfig,
    provider: &dyn DatasetProvider,
    engine: &dyn GeometryEngine,
    root: &Path,
    options: &RunOptions,
) -> Result<StoreLayout> {
    config.validate()?;
    let layout = StoreLayout::new(root, config);
    ObstacleBuilder::new(provider, engine, config)
        .threads(options.threads)
        .prepare(&layout)?;
    Ok(layout)
}

/// Sail `config` to completion, resuming from any checkpoints under `root`.
pub fn sail(
    config: &SailConfig,
    provider: &dyn DatasetProvider,
    engine: &dyn GeometryEngine,
    root: &Path,
    options: &RunOptions,
) -> Result<SailOutcome> {
    config.validate()?;
    config.check_precision()?;

    let layout = StoreLayout::new(root, config);
    let _lock = RunLock::acquire(layout.lock_file())?;
    tracing::info!(run_dir = %layout.run_dir().display(), "starting run");

    let manifest_path = layout.manifest();
    if !manifest_path.exists() {
        let manifest = serde_json::to_string_pretty(&RunManifest::new(config))?;
        io::write_atomic(&manifest_path, manifest.as_bytes())?;
    }

    let datasets = ObstacleBuilder::new(provider, engine, config)
        .threads(options.threads)
        .prepare(&layout)?;
    tracing::info!(
        obstacles = datasets.mask.len(),
        canals = datasets.canals.0.len(),
        "obstacle datasets ready"
    );

    let store = FsCheckpointStore::new(layout.run_dir());
    let summary = Stepper::new(config, engine, &store, &datasets.mask)?.run()?;
    Ok(SailOutcome { layout, summary })
}

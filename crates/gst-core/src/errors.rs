//! Error types shared by every stage of a sailing run.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::Slot;

pub type Result<T> = std::result::Result<T, GstError>;

#[derive(Debug, Error)]
pub enum GstError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "the maximum possible sailing distance is {:.2} kilometres but the precision is {:.2} kilometres",
        .max_distance_m / 1000.0,
        .precision_m / 1000.0
    )]
    PrecisionTooCoarse { max_distance_m: f64, precision_m: f64 },

    #[error("the ship is starting on land at ({lon}, {lat})")]
    StartOnLand { lon: f64, lat: f64 },

    #[error("unexpected geometry kind: expected {expected}, found {found}")]
    UnexpectedGeometryKind {
        expected: &'static str,
        found: String,
    },

    #[error("invalid geometry after {operation}: {problems}")]
    InvalidGeometry {
        operation: &'static str,
        problems: String,
    },

    #[error("malformed WKB: {0}")]
    MalformedWkb(String),

    #[error("malformed GeoJSON: {0}")]
    MalformedGeoJson(String),

    #[error("malformed dataset {}: {detail}", .path.display())]
    MalformedDataset { path: PathBuf, detail: String },

    #[error("no {slot} checkpoint for step {step}")]
    MissingCheckpoint { slot: Slot, step: usize },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl GstError {
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(io::Error) -> GstError {
        let path = path.as_ref().to_path_buf();
        move |source| GstError::Io { path, source }
    }

    pub fn unexpected(expected: &'static str, found: impl Into<String>) -> Self {
        GstError::UnexpectedGeometryKind {
            expected,
            found: found.into(),
        }
    }
}

pub mod config;
pub mod engine;
pub mod errors;
pub mod io;
pub mod models;
pub mod naming;
pub mod obstacles;
pub mod provider;
pub mod relevance;
pub mod rings;
pub mod sail;
pub mod spatial;
pub mod stepper;
pub mod store;
pub mod wkb;

pub use config::{SailConfig, DEFAULT_CANALS};
pub use engine::{BufferParams, GeometryEngine, SphericalEngine};
pub use errors::{GstError, Result};
pub use models::{Category, Record, Resolution, Shape, ShapeKind};
pub use naming::StoreLayout;
pub use obstacles::{LandBuild, LandRequest, ObstacleBuilder, ObstacleDatasets, TileStats};
pub use provider::{DatasetProvider, GeoJsonProvider, MemoryProvider};
pub use relevance::{filter_relevant, RelevantObstacles};
pub use sail::{build_datasets, sail, RunManifest, RunOptions, SailOutcome};
pub use spatial::haversine_distance;
pub use stepper::{Phase, RunSummary, StepReport, Stepper};
pub use store::{CheckpointStore, FsCheckpointStore, MemoryCheckpointStore, RunLock, Slot};

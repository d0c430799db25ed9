//! Step-indexed checkpoint storage.
//!
//! A checkpoint is written once and never mutated. The existence of a
//! [`Slot::Region`] checkpoint for a step is what lets a rerun skip it.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs4::fs_std::FileExt;

use crate::errors::{GstError, Result};
use crate::io;
use crate::models::Shape;
use crate::naming::{parse_step_file_name, step_file_name};

/// The kinds of geometry persisted per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    /// Reachable region after the step.
    Region,
    /// Frontier buffered during the step.
    Limit,
    /// Obstacles considered during an epoch, keyed by its first step.
    RelevantObstacles,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Region, Slot::Limit, Slot::RelevantObstacles];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Slot::Region => "ship",
            Slot::Limit => "limit",
            Slot::RelevantObstacles => "relevantLands",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

pub trait CheckpointStore: Send + Sync {
    fn exists(&self, slot: Slot, step: usize) -> Result<bool>;
    fn save(&self, slot: Slot, step: usize, shape: &Shape) -> Result<()>;
    fn load(&self, slot: Slot, step: usize) -> Result<Shape>;
    /// Steps with a checkpoint in `slot`, ascending.
    fn steps(&self, slot: Slot) -> Result<Vec<usize>>;
}

/// Checkpoints as gzip-compressed WKB files under a run directory.
#[derive(Debug, Clone)]
pub struct FsCheckpointStore {
    root: PathBuf,
}

impl FsCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, slot: Slot, step: usize) -> PathBuf {
        self.root.join(slot.dir_name()).join(step_file_name(step))
    }
}

impl CheckpointStore for FsCheckpointStore {
    fn exists(&self, slot: Slot, step: usize) -> Result<bool> {
        let path = self.path(slot, step);
        path.try_exists().map_err(GstError::io(&path))
    }

    fn save(&self, slot: Slot, step: usize, shape: &Shape) -> Result<()> {
        let path = self.path(slot, step);
        io::save_wkb_gz(&path, shape)?;
        if slot == Slot::RelevantObstacles {
            io::save_geojson(&path.with_extension("").with_extension("geojson"), shape)?;
        }
        tracing::debug!(path = %path.display(), "saved checkpoint");
        Ok(())
    }

    fn load(&self, slot: Slot, step: usize) -> Result<Shape> {
        let path = self.path(slot, step);
        if !self.exists(slot, step)? {
            return Err(GstError::MissingCheckpoint { slot, step });
        }
        io::load_wkb_gz(&path)
    }

    fn steps(&self, slot: Slot) -> Result<Vec<usize>> {
        let dir = self.root.join(slot.dir_name());
        if !dir.try_exists().map_err(GstError::io(&dir))? {
            return Ok(Vec::new());
        }
        let mut steps = Vec::new();
        for entry in fs::read_dir(&dir).map_err(GstError::io(&dir))? {
            let entry = entry.map_err(GstError::io(&dir))?;
            if let Some(step) = entry.file_name().to_str().and_then(parse_step_file_name) {
                steps.push(step);
            }
        }
        steps.sort_unstable();
        Ok(steps)
    }
}

/// Checkpoints held in memory as the same compressed bytes a file would hold.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    blobs: Mutex<BTreeMap<(Slot, usize), Vec<u8>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw compressed bytes of one checkpoint.
    pub fn blob(&self, slot: Slot, step: usize) -> Option<Vec<u8>> {
        self.lock().get(&(slot, step)).cloned()
    }

    /// Forget every checkpoint from `step` onwards.
    pub fn truncate(&self, step: usize) {
        self.lock().retain(|(_, s), _| *s < step);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<(Slot, usize), Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn exists(&self, slot: Slot, step: usize) -> Result<bool> {
        Ok(self.lock().contains_key(&(slot, step)))
    }

    fn save(&self, slot: Slot, step: usize, shape: &Shape) -> Result<()> {
        let bytes = io::encode_wkb_gz(shape)?;
        self.lock().insert((slot, step), bytes);
        Ok(())
    }

    fn load(&self, slot: Slot, step: usize) -> Result<Shape> {
        let bytes = self
            .blob(slot, step)
            .ok_or(GstError::MissingCheckpoint { slot, step })?;
        io::decode_wkb_gz(&bytes)
    }

    fn steps(&self, slot: Slot) -> Result<Vec<usize>> {
        Ok(self
            .lock()
            .keys()
            .filter(|(s, _)| *s == slot)
            .map(|(_, step)| *step)
            .collect())
    }
}

/// Exclusive advisory lock on a run directory, released when dropped.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
    path: PathBuf,
}

impl RunLock {
    /// Block until no other process holds the lock at `path`.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(GstError::io(parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(GstError::io(&path))?;
        file.lock_exclusive().map_err(GstError::io(&path))?;
        tracing::debug!(path = %path.display(), "acquired run lock");
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon, Point};

    fn square() -> Shape {
        Shape::MultiPolygon(MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]]))
    }

    #[test]
    fn fs_store_round_trips_and_lists_steps() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());

        assert!(!store.exists(Slot::Region, 3).unwrap());
        store.save(Slot::Region, 3, &square()).unwrap();
        store.save(Slot::Region, 1, &square()).unwrap();
        store.save(Slot::Limit, 1, &Shape::Point(Point::new(0.5, 0.5))).unwrap();

        assert!(store.exists(Slot::Region, 3).unwrap());
        assert_eq!(store.load(Slot::Region, 3).unwrap(), square());
        assert_eq!(store.steps(Slot::Region).unwrap(), vec![1, 3]);
        assert_eq!(store.steps(Slot::RelevantObstacles).unwrap(), Vec::<usize>::new());
        assert!(dir.path().join("ship").join("istep=000003.wkb.gz").is_file());
    }

    #[test]
    fn relevant_obstacles_get_a_geojson_export() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());
        store.save(Slot::RelevantObstacles, 0, &square()).unwrap();
        assert!(dir
            .path()
            .join("relevantLands")
            .join("istep=000000.geojson")
            .is_file());
        assert_eq!(store.steps(Slot::RelevantObstacles).unwrap(), vec![0]);
    }

    #[test]
    fn missing_checkpoint_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());
        assert!(matches!(
            store.load(Slot::Limit, 7),
            Err(GstError::MissingCheckpoint { slot: Slot::Limit, step: 7 })
        ));
    }

    #[test]
    fn memory_store_matches_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let fs_store = FsCheckpointStore::new(dir.path());
        let mem = MemoryCheckpointStore::new();

        fs_store.save(Slot::Region, 0, &square()).unwrap();
        mem.save(Slot::Region, 0, &square()).unwrap();

        let on_disk = fs::read(fs_store.path(Slot::Region, 0)).unwrap();
        assert_eq!(mem.blob(Slot::Region, 0).unwrap(), on_disk);

        mem.truncate(0);
        assert!(!mem.exists(Slot::Region, 0).unwrap());
    }

    #[test]
    fn run_lock_can_be_reacquired_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join(".lock");
        {
            let lock = RunLock::acquire(&path).unwrap();
            assert_eq!(lock.path(), path.as_path());
        }
        let _again = RunLock::acquire(&path).unwrap();
    }
}

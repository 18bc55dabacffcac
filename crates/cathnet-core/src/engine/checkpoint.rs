use super::state::RankedSnapshot;
use crate::data::stats::Normalization;
use crate::model::config::PotentialConfig;
use crate::model::potential::Potential;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::{Deserialize, Serialize};
use std::collections::BinaryHeap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Name of the manifest listing the retained snapshots.
pub const MANIFEST_FILE: &str = "checkpoints.json";
/// Weights of the most recent epoch, overwritten every epoch.
pub const LAST_FILE: &str = "last.mpk";
/// Metric that ranks snapshots; lower is better.
pub const MONITOR: &str = "val_loss";

type Recorder = NamedMpkFileRecorder<FullPrecisionSettings>;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to write snapshot {path:?}: {message}")]
    Save { path: PathBuf, message: String },

    #[error("Failed to restore snapshot {path:?}: {message}")]
    Restore { path: PathBuf, message: String },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed snapshot manifest {path:?}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("No snapshot is retained in {0:?}")]
    NoSnapshot(PathBuf),
}

/// Metadata written next to each snapshot and into the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub file: String,
    pub epoch: usize,
    pub step: usize,
    pub val_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub monitor: String,
    pub mode: String,
    pub save_top_k: usize,
    /// Best first.
    pub retained: Vec<SnapshotMeta>,
}

impl SnapshotManifest {
    pub fn best(&self) -> Option<&SnapshotMeta> {
        self.retained.first()
    }

    pub fn load(dir: &Path) -> Result<Self, CheckpointError> {
        let path = dir.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path).map_err(|source| CheckpointError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| CheckpointError::Manifest {
            path,
            message: e.to_string(),
        })
    }
}

/// The snapshot file name for an epoch and its validation loss.
pub fn snapshot_file_name(epoch: usize, val_loss: f64) -> String {
    format!("epoch={epoch}-val_loss={val_loss:.4}.mpk")
}

/// Keeps the `capacity` snapshots with the lowest validation loss.
#[derive(Debug)]
pub struct RetentionSet {
    capacity: usize,
    heap: BinaryHeap<RankedSnapshot>,
}

impl RetentionSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Whether a snapshot with this loss would be kept.
    pub fn admits(&self, val_loss: f64) -> bool {
        if self.capacity == 0 || val_loss.is_nan() {
            return false;
        }
        self.heap.len() < self.capacity
            || self
                .heap
                .peek()
                .is_some_and(|worst| val_loss < worst.val_loss)
    }

    /// Adds a snapshot, returning the one evicted to stay within capacity.
    pub fn insert(&mut self, snapshot: RankedSnapshot) -> Option<RankedSnapshot> {
        self.heap.push(snapshot);
        if self.heap.len() > self.capacity {
            self.heap.pop()
        } else {
            None
        }
    }

    pub fn best(&self) -> Option<&RankedSnapshot> {
        self.heap.iter().min()
    }

    /// Retained snapshots, best first.
    pub fn ranked(&self) -> Vec<RankedSnapshot> {
        let mut all = self.heap.clone().into_sorted_vec();
        all.truncate(self.capacity);
        all
    }
}

/// Writes snapshots of the potential into the run's log directory.
pub struct SnapshotStore {
    dir: PathBuf,
    retention: RetentionSet,
    recorder: Recorder,
}

fn meta_path(snapshot: &Path) -> PathBuf {
    snapshot.with_extension("json")
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, save_top_k: usize) -> Self {
        Self {
            dir: dir.into(),
            retention: RetentionSet::new(save_top_k),
            recorder: Recorder::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn retained(&self) -> usize {
        self.retention.len()
    }

    /// Offers the model at the end of an epoch; returns whether it was retained.
    pub fn offer<B: Backend>(
        &mut self,
        model: &Potential<B>,
        epoch: usize,
        step: usize,
        val_loss: f64,
    ) -> Result<bool, CheckpointError> {
        if !self.retention.admits(val_loss) {
            debug!(epoch, val_loss, "Snapshot not retained.");
            return Ok(false);
        }

        let file = snapshot_file_name(epoch, val_loss);
        let path = self.dir.join(&file);
        self.save_weights(model, &path)?;
        let meta = SnapshotMeta {
            file,
            epoch,
            step,
            val_loss,
        };
        write_json(&meta_path(&path), &meta)?;
        info!(epoch, val_loss, path = %path.display(), "Snapshot saved.");

        let evicted = self.retention.insert(RankedSnapshot {
            val_loss,
            epoch,
            step,
            path,
        });
        if let Some(worst) = evicted {
            debug!(epoch = worst.epoch, val_loss = worst.val_loss, "Evicting snapshot.");
            for stale in [worst.path.clone(), meta_path(&worst.path)] {
                match fs::remove_file(&stale) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(source) => {
                        return Err(CheckpointError::Io {
                            path: stale,
                            source,
                        });
                    }
                }
            }
        }
        self.write_manifest()?;
        Ok(true)
    }

    /// Overwrites `last.mpk` with the current weights.
    pub fn save_last<B: Backend>(&self, model: &Potential<B>) -> Result<(), CheckpointError> {
        self.save_weights(model, &self.dir.join(LAST_FILE))
    }

    pub fn manifest(&self) -> SnapshotManifest {
        SnapshotManifest {
            monitor: MONITOR.to_string(),
            mode: "min".to_string(),
            save_top_k: self.retention.capacity,
            retained: self
                .retention
                .ranked()
                .into_iter()
                .map(|s| SnapshotMeta {
                    file: s
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    epoch: s.epoch,
                    step: s.step,
                    val_loss: s.val_loss,
                })
                .collect(),
        }
    }

    pub fn write_manifest(&self) -> Result<(), CheckpointError> {
        write_json(&self.dir.join(MANIFEST_FILE), &self.manifest())
    }

    /// Path of the retained snapshot with the lowest validation loss.
    pub fn best_path(&self) -> Result<PathBuf, CheckpointError> {
        self.retention
            .best()
            .map(|s| s.path.clone())
            .ok_or_else(|| CheckpointError::NoSnapshot(self.dir.clone()))
    }

    fn save_weights<B: Backend>(
        &self,
        model: &Potential<B>,
        path: &Path,
    ) -> Result<(), CheckpointError> {
        model
            .clone()
            .save_file(path.to_path_buf(), &self.recorder)
            .map_err(|e| CheckpointError::Save {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CheckpointError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CheckpointError::Manifest {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    fs::write(path, text).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Path of the best snapshot recorded in a log directory's manifest.
pub fn best_snapshot(dir: &Path) -> Result<PathBuf, CheckpointError> {
    let manifest = SnapshotManifest::load(dir)?;
    manifest
        .best()
        .map(|meta| dir.join(&meta.file))
        .ok_or_else(|| CheckpointError::NoSnapshot(dir.to_path_buf()))
}

/// Restores a potential from a snapshot; the energy statistics come from the file.
pub fn load_potential<B: Backend>(
    config: &PotentialConfig,
    path: &Path,
    device: &B::Device,
) -> Result<Potential<B>, CheckpointError> {
    if !path.is_file() {
        return Err(CheckpointError::Restore {
            path: path.to_path_buf(),
            message: "file does not exist".to_string(),
        });
    }
    config
        .init::<B>(&Normalization::identity(), device)
        .load_file(path.to_path_buf(), &Recorder::new(), device)
        .map_err(|e| CheckpointError::Restore {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    fn tiny() -> PotentialConfig {
        PotentialConfig::new()
            .with_embedding_dimension(4)
            .with_num_layers(1)
            .with_num_rbf(4)
            .with_max_z(10)
    }

    fn ranked(val_loss: f64, epoch: usize) -> RankedSnapshot {
        RankedSnapshot {
            val_loss,
            epoch,
            step: 0,
            path: PathBuf::from(snapshot_file_name(epoch, val_loss)),
        }
    }

    #[test]
    fn file_name_follows_epoch_and_loss() {
        assert_eq!(snapshot_file_name(7, 0.123456), "epoch=7-val_loss=0.1235.mpk");
    }

    #[test]
    fn retention_never_exceeds_capacity_and_evicts_the_worst() {
        let mut set = RetentionSet::new(2);
        assert!(set.insert(ranked(0.5, 0)).is_none());
        assert!(set.insert(ranked(0.3, 1)).is_none());
        assert!(!set.admits(0.6));
        assert!(set.admits(0.4));
        let evicted = set.insert(ranked(0.4, 2)).unwrap();
        assert_eq!(evicted.epoch, 0);
        assert_eq!(set.len(), 2);
        assert_eq!(set.best().unwrap().epoch, 1);
        let order: Vec<usize> = set.ranked().iter().map(|s| s.epoch).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn nan_loss_is_never_retained() {
        let set = RetentionSet::new(3);
        assert!(!set.admits(f64::NAN));
    }

    #[test]
    fn store_removes_evicted_files_and_records_the_manifest() {
        let dir = tempdir().unwrap();
        let device = Default::default();
        let model = tiny().init::<TestBackend>(&Normalization::identity(), &device);
        let mut store = SnapshotStore::new(dir.path(), 2);

        assert!(store.offer(&model, 0, 10, 0.9).unwrap());
        assert!(store.offer(&model, 1, 20, 0.5).unwrap());
        assert!(!store.offer(&model, 2, 30, 0.95).unwrap());
        assert!(store.offer(&model, 3, 40, 0.7).unwrap());

        assert!(!dir.path().join(snapshot_file_name(0, 0.9)).exists());
        assert!(!dir.path().join("epoch=0-val_loss=0.9000.json").exists());
        assert!(dir.path().join(snapshot_file_name(1, 0.5)).is_file());
        assert!(dir.path().join(snapshot_file_name(3, 0.7)).is_file());

        let manifest = SnapshotManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.retained.len(), 2);
        assert_eq!(manifest.best().unwrap().epoch, 1);
        assert_eq!(
            best_snapshot(dir.path()).unwrap(),
            dir.path().join(snapshot_file_name(1, 0.5))
        );
        assert_eq!(store.best_path().unwrap(), best_snapshot(dir.path()).unwrap());
    }

    #[test]
    fn restored_potential_carries_its_statistics() {
        let dir = tempdir().unwrap();
        let device = Default::default();
        let stats = Normalization { mean: -12.5, std: 4.0 };
        let model = tiny().init::<TestBackend>(&stats, &device);
        let store = SnapshotStore::new(dir.path(), 1);
        store.save_last(&model).unwrap();

        let restored = load_potential::<TestBackend>(&tiny(), &dir.path().join(LAST_FILE), &device)
            .unwrap();
        assert_eq!(restored.normalization(), stats);
    }

    #[test]
    fn missing_snapshot_is_a_restore_error() {
        let dir = tempdir().unwrap();
        let err = load_potential::<TestBackend>(&tiny(), &dir.path().join("nope.mpk"), &Default::default())
            .unwrap_err();
        assert!(matches!(err, CheckpointError::Restore { .. }));
        assert!(matches!(
            best_snapshot(dir.path()),
            Err(CheckpointError::Io { .. })
        ));
    }
}

//! Immutable, versioned stage results.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Record consolidation.
    Consolidation,
    /// Eligibility filtering.
    Eligibility,
    /// Proration and value calculation.
    Calculation,
    /// Output assembly.
    Output,
    /// Audit and reconciliation.
    Audit,
}

impl Stage {
    /// Position of the stage in the pipeline, starting at 1.
    pub fn ordinal(&self) -> u8 {
        match self {
            Stage::Consolidation => 1,
            Stage::Eligibility => 2,
            Stage::Calculation => 3,
            Stage::Output => 4,
            Stage::Audit => 5,
        }
    }

    /// Snake-case name used in logs and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Consolidation => "consolidation",
            Stage::Eligibility => "eligibility",
            Stage::Calculation => "calculation",
            Stage::Output => "output",
            Stage::Audit => "audit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published stage result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    /// The run that produced it.
    pub run_id: Uuid,
    /// The stage that produced it.
    pub stage: Stage,
    /// Format version.
    pub version: u32,
    /// When it was published.
    pub created_at: DateTime<Utc>,
    /// The stage result.
    pub payload: T,
}

impl<T> Snapshot<T> {
    /// Wraps a stage result.
    pub fn new(run_id: Uuid, stage: Stage, payload: T) -> Self {
        Self {
            run_id,
            stage,
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
            payload,
        }
    }
}

/// Where published snapshots go.
///
/// Payloads cross the store as JSON so any stage result can be stored
/// without the store knowing its type.
pub trait SnapshotStore: Send + Sync {
    /// Persists a snapshot. Publishing the same stage twice for one run is
    /// an error.
    fn put(&self, snapshot: Snapshot<serde_json::Value>) -> EngineResult<()>;

    /// Loads a snapshot if one was published.
    fn get(&self, run_id: Uuid, stage: Stage) -> EngineResult<Option<Snapshot<serde_json::Value>>>;
}

/// Serializes a typed snapshot and publishes it.
pub fn publish<T: Serialize>(store: &dyn SnapshotStore, snapshot: &Snapshot<T>) -> EngineResult<()> {
    let payload = serde_json::to_value(&snapshot.payload).map_err(|e| EngineError::Snapshot {
        path: format!("{}/{}", snapshot.run_id, snapshot.stage),
        message: e.to_string(),
    })?;
    store.put(Snapshot {
        run_id: snapshot.run_id,
        stage: snapshot.stage,
        version: snapshot.version,
        created_at: snapshot.created_at,
        payload,
    })
}

/// Loads a typed snapshot, for re-running a later stage.
pub fn load<T: DeserializeOwned>(
    store: &dyn SnapshotStore,
    run_id: Uuid,
    stage: Stage,
) -> EngineResult<Option<Snapshot<T>>> {
    let Some(raw) = store.get(run_id, stage)? else {
        return Ok(None);
    };
    let payload = serde_json::from_value(raw.payload).map_err(|e| EngineError::Snapshot {
        path: format!("{}/{}", run_id, stage),
        message: e.to_string(),
    })?;
    Ok(Some(Snapshot {
        run_id: raw.run_id,
        stage: raw.stage,
        version: raw.version,
        created_at: raw.created_at,
        payload,
    }))
}

fn already_published(run_id: Uuid, stage: Stage) -> EngineError {
    EngineError::Snapshot {
        path: format!("{}/{}", run_id, stage),
        message: "snapshot already published".to_string(),
    }
}

/// Keeps snapshots in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<(Uuid, Stage), Snapshot<serde_json::Value>>>,
}

impl MemorySnapshotStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages published for a run, in pipeline order.
    pub fn stages(&self, run_id: Uuid) -> Vec<Stage> {
        let snapshots = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stages: Vec<Stage> = snapshots
            .keys()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, stage)| *stage)
            .collect();
        stages.sort();
        stages
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn put(&self, snapshot: Snapshot<serde_json::Value>) -> EngineResult<()> {
        let mut snapshots = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (snapshot.run_id, snapshot.stage);
        if snapshots.contains_key(&key) {
            return Err(already_published(key.0, key.1));
        }
        snapshots.insert(key, snapshot);
        Ok(())
    }

    fn get(&self, run_id: Uuid, stage: Stage) -> EngineResult<Option<Snapshot<serde_json::Value>>> {
        let snapshots = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(snapshots.get(&(run_id, stage)).cloned())
    }
}

/// Writes snapshots as `<root>/<run_id>/<nn>-<stage>.json`.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    /// Creates a store rooted at `root`. Directories are created lazily.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Path a snapshot is stored at.
    pub fn path_for(&self, run_id: Uuid, stage: Stage) -> PathBuf {
        self.root
            .join(run_id.to_string())
            .join(format!("{:02}-{}.json", stage.ordinal(), stage))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn put(&self, snapshot: Snapshot<serde_json::Value>) -> EngineResult<()> {
        let path = self.path_for(snapshot.run_id, snapshot.stage);
        let io_error = |message: String| EngineError::Snapshot {
            path: path.display().to_string(),
            message,
        };

        if path.exists() {
            return Err(already_published(snapshot.run_id, snapshot.stage));
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_error(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(&snapshot).map_err(|e| io_error(e.to_string()))?;
        fs::write(&path, json).map_err(|e| io_error(e.to_string()))?;

        debug!(path = %path.display(), "Snapshot written");
        Ok(())
    }

    fn get(&self, run_id: Uuid, stage: Stage) -> EngineResult<Option<Snapshot<serde_json::Value>>> {
        let path = self.path_for(run_id, stage);
        if !path.exists() {
            return Ok(None);
        }
        let io_error = |message: String| EngineError::Snapshot {
            path: path.display().to_string(),
            message,
        };
        let content = fs::read_to_string(&path).map_err(|e| io_error(e.to_string()))?;
        let snapshot = serde_json::from_str(&content).map_err(|e| io_error(e.to_string()))?;
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        eligible: Vec<String>,
    }

    fn payload() -> Payload {
        Payload {
            eligible: vec!["1001".to_string(), "1002".to_string()],
        }
    }

    #[test]
    fn test_memory_store_round_trips_typed_payload() {
        let store = MemorySnapshotStore::new();
        let run_id = Uuid::new_v4();
        publish(&store, &Snapshot::new(run_id, Stage::Eligibility, payload())).unwrap();

        let loaded: Snapshot<Payload> = load(&store, run_id, Stage::Eligibility).unwrap().unwrap();
        assert_eq!(loaded.payload, payload());
        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        assert_eq!(store.stages(run_id), vec![Stage::Eligibility]);
    }

    #[test]
    fn test_snapshots_are_immutable() {
        let store = MemorySnapshotStore::new();
        let run_id = Uuid::new_v4();
        publish(&store, &Snapshot::new(run_id, Stage::Output, payload())).unwrap();

        let second = publish(&store, &Snapshot::new(run_id, Stage::Output, payload()));
        assert!(matches!(second, Err(EngineError::Snapshot { .. })));
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let store = MemorySnapshotStore::new();
        let loaded: Option<Snapshot<Payload>> =
            load(&store, Uuid::new_v4(), Stage::Audit).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_file_store_layout() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let run_id = Uuid::new_v4();

        publish(&store, &Snapshot::new(run_id, Stage::Calculation, payload())).unwrap();

        let expected = dir
            .path()
            .join(run_id.to_string())
            .join("03-calculation.json");
        assert!(expected.exists());

        let loaded: Snapshot<Payload> = load(&store, run_id, Stage::Calculation).unwrap().unwrap();
        assert_eq!(loaded.payload, payload());
        assert_eq!(loaded.stage, Stage::Calculation);
    }

    #[test]
    fn test_stage_ordinals_follow_pipeline_order() {
        let stages = [
            Stage::Consolidation,
            Stage::Eligibility,
            Stage::Calculation,
            Stage::Output,
            Stage::Audit,
        ];
        let ordinals: Vec<u8> = stages.iter().map(Stage::ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4, 5]);
    }
}

//! Snapshot persistence with atomic, serialized writes.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use cutover_rest_api_contract::{ArtifactKind, RunArtifact, SNAPSHOT_VERSION};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::artifacts::is_path_inside_run;
use crate::error::{Error, Result};
use crate::migration::{self, RawSnapshot};
use crate::snapshot::StorageSnapshot;

const SNAPSHOT_FILE: &str = "snapshot.json";

/// A stage output waiting to be registered. The backing file must
/// already exist when registration happens.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub kind: ArtifactKind,
    pub label: String,
    pub relative_path: String,
}

impl NewArtifact {
    pub fn new<L: Into<String>, P: Into<String>>(kind: ArtifactKind, label: L, path: P) -> Self {
        Self {
            kind,
            label: label.into(),
            relative_path: path.into(),
        }
    }
}

/// Process-wide home of the [`StorageSnapshot`] and the artifact tree.
///
/// Reads return a consistent clone of the current state. Writes go
/// through [`SnapshotStore::mutate`], which serializes writers,
/// persists atomically, and only then publishes the new state, so a
/// crash at any instant leaves the previous snapshot intact.
#[derive(Debug)]
pub struct SnapshotStore {
    snapshot_path: PathBuf,
    artifact_root: PathBuf,
    current: RwLock<StorageSnapshot>,
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    /// Open (or initialize) the store under `data_dir`. Runs the legacy
    /// migration when the on-disk document is older than the current
    /// version and persists the result before returning.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let artifact_root = data_dir.join("artifacts");
        fs::create_dir_all(&artifact_root)?;

        let snapshot_path = data_dir.join(SNAPSHOT_FILE);
        let (snapshot, needs_persist) = if snapshot_path.exists() {
            let bytes = fs::read(&snapshot_path)?;
            let raw: RawSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
                Error::corruption(format!(
                    "cannot parse {}: {e}",
                    snapshot_path.display()
                ))
            })?;
            let stale = raw.version.unwrap_or(1) < SNAPSHOT_VERSION || !raw.jobs.is_empty();
            let (snapshot, migrated) = migration::migrate(raw);
            if migrated > 0 {
                info!(migrated, "migrated legacy jobs on load");
            }
            (snapshot, stale || migrated > 0)
        } else {
            (StorageSnapshot::default(), true)
        };

        let store = Self {
            snapshot_path,
            artifact_root,
            current: RwLock::new(snapshot),
            write_lock: Mutex::new(()),
        };
        if needs_persist {
            let guard = store.current.try_read().expect("fresh store is uncontended");
            store.persist(&guard)?;
        }
        Ok(store)
    }

    /// Root directory of the artifact file tree.
    pub fn artifact_root(&self) -> &Path {
        &self.artifact_root
    }

    /// Directory holding one run's artifacts.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.artifact_root.join(run_id)
    }

    /// A consistent copy of the current snapshot.
    pub async fn snapshot(&self) -> StorageSnapshot {
        self.current.read().await.clone()
    }

    /// Apply a read-modify-write cycle. The mutation runs against a
    /// private copy; the result is persisted atomically and only then
    /// published to readers. A failing mutation or a failing persist
    /// leaves both memory and disk untouched.
    pub async fn mutate<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut StorageSnapshot) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let _serialize = self.write_lock.lock().await;
        let mut working = self.current.read().await.clone();
        let value = f(&mut working)?;
        self.persist(&working).map_err(E::from)?;
        *self.current.write().await = working;
        Ok(value)
    }

    /// Idempotent legacy migration on demand: re-reads the raw on-disk
    /// document, converts any legacy jobs not yet represented, and
    /// persists. Returns the number converted.
    pub async fn migrate_pending(&self) -> Result<usize> {
        let raw: RawSnapshot = match fs::read(&self.snapshot_path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::corruption(format!("cannot parse snapshot: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RawSnapshot::default(),
            Err(e) => return Err(e.into()),
        };
        if raw.jobs.is_empty() {
            return Ok(0);
        }
        self.mutate(|snapshot| {
            Ok::<usize, Error>(migration::merge_legacy(snapshot, raw.jobs, raw.version))
        })
        .await
    }

    /// Register stage outputs for a run in a single snapshot save.
    /// Every path must point at an existing file inside the run's
    /// directory; a crash before this call leaves orphan files but
    /// never a dangling registry row.
    pub async fn register_artifacts(
        &self,
        run_id: &str,
        entries: Vec<NewArtifact>,
    ) -> Result<Vec<RunArtifact>> {
        for entry in &entries {
            if !is_path_inside_run(&entry.relative_path, run_id) {
                return Err(Error::artifact(format!(
                    "path {:?} is outside the directory of run {run_id}",
                    entry.relative_path
                )));
            }
            let file = self.artifact_root.join(&entry.relative_path);
            if !file.is_file() {
                return Err(Error::artifact(format!(
                    "no backing file at {:?}",
                    file.display()
                )));
            }
        }

        let run_id = run_id.to_string();
        self.mutate(move |snapshot| {
            if snapshot.run(&run_id).is_none() {
                return Err(Error::run_not_found(&run_id));
            }
            let now = chrono::Utc::now();
            let rows: Vec<RunArtifact> = entries
                .into_iter()
                .map(|entry| RunArtifact {
                    id: uuid::Uuid::new_v4().to_string(),
                    run_id: run_id.clone(),
                    kind: entry.kind,
                    label: entry.label,
                    path: entry.relative_path,
                    created_at: now,
                })
                .collect();
            snapshot.artifacts.extend(rows.iter().cloned());
            Ok(rows)
        })
        .await
    }

    /// Register a single artifact. See [`SnapshotStore::register_artifacts`].
    pub async fn register_artifact(
        &self,
        run_id: &str,
        artifact: NewArtifact,
    ) -> Result<RunArtifact> {
        let mut rows = self.register_artifacts(run_id, vec![artifact]).await?;
        Ok(rows.remove(0))
    }

    /// Best-effort removal of artifact directories after a job cascade.
    /// Orphan files are tolerable; orphan registry rows are not, so the
    /// registry rows must already be gone when this is called.
    pub fn sweep_run_dirs(&self, run_ids: &[String]) {
        for run_id in run_ids {
            let dir = self.run_dir(run_id);
            if !dir.exists() {
                continue;
            }
            match fs::remove_dir_all(&dir) {
                Ok(()) => debug!(run_id = %run_id, "removed artifact directory"),
                Err(e) => warn!(run_id = %run_id, error = %e, "failed to remove artifact directory"),
            }
        }
    }

    /// Atomic write: sibling temp file, flush + fsync, rename over the
    /// target.
    fn persist(&self, snapshot: &StorageSnapshot) -> Result<()> {
        let tmp = self.snapshot_path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.snapshot_path)?;
        Ok(())
    }
}

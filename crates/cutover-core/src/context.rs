//! Per-run shared state and the artifact accumulator.

use cutover_browser::BrowserContext;
use cutover_rest_api_contract::{ArtifactKind, ComparisonJob};
use cutover_store::NewArtifact;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// State shared across the stages of one run: the job as it looked at
/// enqueue time, the run id, the cancellation signal, and, once the
/// capture stage has opened them, the two live browser contexts the
/// middle stages reuse.
pub struct RunContext {
    pub job: ComparisonJob,
    pub run_id: String,
    pub cancel: CancellationToken,
    artifact_root: PathBuf,
    contexts: Mutex<Option<SideContexts>>,
}

/// The baseline/candidate context pair opened by the capture stage.
#[derive(Clone)]
pub struct SideContexts {
    pub baseline: Arc<dyn BrowserContext>,
    pub candidate: Arc<dyn BrowserContext>,
}

impl RunContext {
    pub fn new(job: ComparisonJob, run_id: String, artifact_root: PathBuf) -> Self {
        Self {
            job,
            run_id,
            cancel: CancellationToken::new(),
            artifact_root,
            contexts: Mutex::new(None),
        }
    }

    /// Start a fresh artifact batch for one stage.
    pub fn batch(&self) -> ArtifactBatch {
        ArtifactBatch::new(&self.artifact_root, &self.run_id)
    }

    /// Absolute path of a file under this run's artifact directory.
    pub fn run_file(&self, relative: &str) -> PathBuf {
        self.artifact_root.join(&self.run_id).join(relative)
    }

    /// Publish the browser contexts for the middle stages.
    pub async fn set_contexts(&self, contexts: SideContexts) {
        *self.contexts.lock().await = Some(contexts);
    }

    /// The shared contexts, when capture has completed.
    pub async fn contexts(&self) -> Option<SideContexts> {
        self.contexts.lock().await.clone()
    }

    /// Take the contexts for closing; later calls see none.
    pub async fn take_contexts(&self) -> Option<SideContexts> {
        self.contexts.lock().await.take()
    }
}

/// The mutable artifact accumulator a stage writes through. Files go
/// to disk immediately under the run's directory; the registry rows
/// are committed by the orchestrator when the stage ends, so partial
/// evidence from a failing stage is still registered.
pub struct ArtifactBatch {
    root: PathBuf,
    run_id: String,
    entries: Vec<NewArtifact>,
}

impl ArtifactBatch {
    pub fn new(root: &Path, run_id: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            run_id: run_id.to_string(),
            entries: Vec::new(),
        }
    }

    fn registry_path(&self, relative: &str) -> String {
        format!("{}/{relative}", self.run_id)
    }

    fn file_path(&self, relative: &str) -> PathBuf {
        self.root.join(self.run_id.as_str()).join(relative)
    }

    /// Write raw bytes and queue the registry row.
    pub fn write_bytes<L: Into<String>>(
        &mut self,
        relative: &str,
        bytes: &[u8],
        kind: ArtifactKind,
        label: L,
    ) -> Result<()> {
        let path = self.file_path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        self.entries.push(NewArtifact::new(kind, label, self.registry_path(relative)));
        Ok(())
    }

    /// Write a UTF-8 text file and queue the registry row.
    pub fn write_text<L: Into<String>>(
        &mut self,
        relative: &str,
        text: &str,
        kind: ArtifactKind,
        label: L,
    ) -> Result<()> {
        self.write_bytes(relative, text.as_bytes(), kind, label)
    }

    /// Serialize a value as pretty JSON and queue the registry row.
    pub fn write_json<T: Serialize, L: Into<String>>(
        &mut self,
        relative: &str,
        value: &T,
        kind: ArtifactKind,
        label: L,
    ) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(relative, &bytes, kind, label)
    }

    /// Queued registry rows, leaving the batch reusable. Called on
    /// both success and failure paths.
    pub fn take_entries(&mut self) -> Vec<NewArtifact> {
        std::mem::take(&mut self.entries)
    }

    /// Number of rows queued so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any rows are queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

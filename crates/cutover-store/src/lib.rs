//! Durable, crash-safe storage for the cutover control plane.
//!
//! The storage layer owns two things: the [`StorageSnapshot`] JSON
//! document (jobs, runs, artifact registry rows) and the artifact file
//! tree beneath `data/artifacts/`. Snapshot writes are atomic
//! (temp-file-then-rename) and serialized, so state transitions are
//! linearizable and a crash at any instant leaves either the old or
//! the new snapshot on disk, never a partial one.

pub mod artifacts;
pub mod error;
pub mod migration;
pub mod snapshot;
pub mod store;

pub use artifacts::{is_path_inside_run, sanitize_path_segment};
pub use error::{Error, Result};
pub use snapshot::{SnapshotMetadata, StorageSnapshot};
pub use store::{NewArtifact, SnapshotStore};

// ── Store persistence (hydration) ──
//
// The whole store survives a restart as one JSON blob under a single
// fixed location. Hydration runs once at startup, before any live
// effect touches the store; afterwards every accepted transition
// schedules a write. Writes are best-effort and coalesced: the task
// watches the store revision, and a `watch` receiver only ever yields
// the latest value, so rapidly superseded states collapse into one
// write (last-write-wins).

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::DataStore;
use crate::model::{
    ConditionCheckResult, Notification, Plugin, Server, Status, User, UserToken,
};
use crate::report::{FaultReporter, Subsystem};

/// JSON shape of the persisted store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub plugins: Vec<Plugin>,
    #[serde(default)]
    pub disabled_plugins: Vec<String>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub user_tokens: Vec<UserToken>,
    #[serde(default)]
    pub statuses: Vec<Status>,
    #[serde(default)]
    pub checks: Vec<ConditionCheckResult>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

// ── Storage backend ──────────────────────────────────────────────────

/// Where the snapshot blob lives. Synchronous by design: writes are
/// small, local, and best-effort.
pub trait SnapshotStore: Send + Sync {
    /// Read the raw blob. `Ok(None)` when no snapshot exists.
    fn read(&self) -> io::Result<Option<String>>;
    /// Replace the blob.
    fn write(&self, raw: &str) -> io::Result<()>;
    /// Remove the blob (logout, or corrupt-snapshot discard).
    fn clear(&self) -> io::Result<()>;
}

/// File-backed snapshot storage.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn read(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, raw: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, raw)
    }

    fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// No-op storage for sessions with persistence disabled.
pub(crate) struct NullSnapshotStore;

impl SnapshotStore for NullSnapshotStore {
    fn read(&self) -> io::Result<Option<String>> {
        Ok(None)
    }
    fn write(&self, _raw: &str) -> io::Result<()> {
        Ok(())
    }
    fn clear(&self) -> io::Result<()> {
        Ok(())
    }
}

// ── Hydration ────────────────────────────────────────────────────────

/// What hydration found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationOutcome {
    /// A snapshot existed and seeded the store.
    Restored,
    /// No snapshot existed; the store proceeds empty.
    NoSnapshot,
    /// A snapshot existed but did not parse. It was removed so a bad
    /// blob cannot poison every future startup; the store proceeds
    /// empty, same as [`NoSnapshot`](Self::NoSnapshot), but recorded as
    /// a failure for diagnostics.
    Discarded,
}

/// Seed the store from persisted storage.
///
/// Runs once per session, before any live effect mutates the store. An
/// unreadable or unparseable blob is never an error to the caller.
pub fn hydrate(store: &DataStore, storage: &dyn SnapshotStore) -> HydrationOutcome {
    let raw = match storage.read() {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("no persisted snapshot");
            return HydrationOutcome::NoSnapshot;
        }
        Err(e) => {
            warn!(error = %e, "snapshot read failed, proceeding empty");
            return HydrationOutcome::NoSnapshot;
        }
    };

    match serde_json::from_str::<StoreSnapshot>(&raw) {
        Ok(snapshot) => {
            store.load(snapshot);
            info!(servers = store.servers().len(), "store hydrated from snapshot");
            HydrationOutcome::Restored
        }
        Err(e) => {
            warn!(error = %e, "corrupt snapshot discarded");
            if let Err(e) = storage.clear() {
                warn!(error = %e, "failed to remove corrupt snapshot");
            }
            HydrationOutcome::Discarded
        }
    }
}

// ── Persistence task ─────────────────────────────────────────────────

/// Write the store to storage on every transition after hydration.
///
/// Spawned right after [`hydrate`] resolves; the freshly subscribed
/// revision receiver treats the hydration seed as already seen, so the
/// seed itself is never written back.
pub(crate) async fn persist_task(
    store: Arc<DataStore>,
    storage: Arc<dyn SnapshotStore>,
    reporter: FaultReporter,
    cancel: CancellationToken,
) {
    let mut revision = store.revision();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = revision.changed() => {
                if changed.is_err() {
                    break; // store dropped
                }

                let snapshot = store.dump();
                match serde_json::to_string(&snapshot) {
                    Ok(raw) => {
                        if let Err(e) = storage.write(&raw) {
                            reporter.report(
                                Subsystem::Persistence,
                                format!("snapshot write failed: {e}"),
                            );
                        }
                    }
                    Err(e) => reporter.report(
                        Subsystem::Persistence,
                        format!("snapshot serialization failed: {e}"),
                    ),
                }
            }
        }
    }

    debug!("persistence task exiting");
}

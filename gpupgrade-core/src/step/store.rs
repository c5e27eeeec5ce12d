//! The substep status log.
//!
//! Every status transition is appended to a JSON-lines file in the state directory. The current
//! status of a phase or substep is the last entry recorded for it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{Phase, Status, Substep};
use crate::config::STATUS_FILE;
use crate::error::StepError;

/// One status transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub phase: Phase,
    /// The substep of this entry; `None` for the status of the phase as a whole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substep: Option<Substep>,
    pub status: Status,
}

/// A handle to the substep status log of a state directory.
#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    /// Set once the state directory is about to be removed; writes become no-ops.
    disabled: AtomicBool,
    /// Serializes read-check-append cycles.
    lock: Mutex<()>,
}

impl StatusStore {
    /// Create a handle to the status log of the given state directory.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: state_dir.join(STATUS_FILE),
                disabled: AtomicBool::new(false),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Stop writing to the status log.
    ///
    /// Used by substeps which delete the state directory holding the log.
    pub fn disable(&self) {
        self.inner.disabled.store(true, Ordering::SeqCst);
    }

    pub fn is_disabled(&self) -> bool {
        self.inner.disabled.load(Ordering::SeqCst)
    }

    /// Read every entry of the log, oldest first. A missing log has no entries.
    pub async fn entries(&self) -> Result<Vec<Entry>> {
        let data = match tokio::fs::read_to_string(&self.inner.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("error reading status log {}", self.inner.path.display()))
            }
        };
        data.lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(idx, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("error decoding line {} of status log {}", idx + 1, self.inner.path.display())
                })
            })
            .collect()
    }

    /// The current status of the given phase as a whole.
    pub async fn phase_status(&self, phase: Phase) -> Result<Status> {
        self.status(phase, None).await
    }

    /// The current status of the given substep of a phase.
    pub async fn substep_status(&self, phase: Phase, substep: Substep) -> Result<Status> {
        self.status(phase, Some(substep)).await
    }

    async fn status(&self, phase: Phase, substep: Option<Substep>) -> Result<Status> {
        Ok(latest(&self.entries().await?, phase, substep))
    }

    /// Record a new status for the given phase as a whole.
    pub async fn write_phase(&self, phase: Phase, status: Status) -> Result<()> {
        self.append(phase, None, status).await
    }

    /// Record a new status for the given substep of a phase.
    pub async fn write(&self, phase: Phase, substep: Substep, status: Status) -> Result<()> {
        self.append(phase, Some(substep), status).await
    }

    async fn append(&self, phase: Phase, substep: Option<Substep>, status: Status) -> Result<()> {
        if self.is_disabled() {
            return Ok(());
        }
        let _guard = self.inner.lock.lock().await;

        let current = latest(&self.entries().await?, phase, substep);
        if !current.can_transition_to(status) {
            let subject = match substep {
                Some(substep) => format!("{} substep {}", phase, substep),
                None => phase.to_string(),
            };
            return Err(StepError::InvalidTransition { subject, from: current, to: status }.into());
        }

        let mut line = serde_json::to_vec(&Entry { phase, substep, status }).context("error encoding status entry")?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)
            .await
            .with_context(|| format!("error opening status log {}", self.inner.path.display()))?;
        file.write_all(&line)
            .await
            .with_context(|| format!("error writing status log {}", self.inner.path.display()))?;
        file.sync_data()
            .await
            .with_context(|| format!("error syncing status log {}", self.inner.path.display()))?;
        tracing::debug!(%phase, substep = ?substep, %status, "status recorded");
        Ok(())
    }
}

fn latest(entries: &[Entry], phase: Phase, substep: Option<Substep>) -> Status {
    entries
        .iter()
        .rev()
        .find(|entry| entry.phase == phase && entry.substep == substep)
        .map(|entry| entry.status)
        .unwrap_or(Status::Pending)
}

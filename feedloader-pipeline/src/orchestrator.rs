//! Drive one torrent from submission to cleanup.
//!
//! ```text
//! Submitted ──▶ Polling ──┬─▶ Seeding ──▶ delete ──▶ Cleaned
//!                  ▲      ├─▶ Stalled ──▶ shutdown ──▶ Cleaned
//!                  └──────┘ (not complete yet, or transient poll failure)
//!
//! any state ──▶ Abandoned  (timeout, cancellation, fatal daemon error)
//! ```
//!
//! `add` strictly precedes the first poll and `delete` strictly follows the
//! poll that observed completion. Every exit after a successful `add` other
//! than `Cleaned` attempts a best-effort `delete` first so the daemon is
//! never left holding an untracked torrent.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use feedloader_core::{FieldId, HandleId, Settings, TorrentSource};
use feedloader_daemon::DaemonClient;

use crate::error::OrchestrationError;

/// Fields requested on every poll.
const POLL_FIELDS: [FieldId; 2] = [FieldId::Id, FieldId::State];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub poll_interval: Duration,
    /// Upper bound between submission and completion.
    pub max_wait: Duration,
    /// After deleting a finished torrent, stop the daemon if it tracks
    /// nothing else.
    pub shutdown_when_idle: bool,
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            max_wait: settings.max_wait(),
            shutdown_when_idle: settings.shutdown_when_idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestrationState {
    Submitted,
    Polling,
    Seeding,
    /// The daemon reported no torrents at all.
    Stalled,
    Cleaned,
    Abandoned,
}

/// How a successful orchestration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// The tracked torrent reached the completion predicate and was deleted.
    Finished,
    /// The daemon's torrent set went empty before this handle was seen
    /// complete; the daemon was shut down.
    DaemonEmpty,
}

/// A submitted torrent the orchestrator is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingDownload {
    pub daemon_id: HandleId,
    pub source_link: String,
    pub download_dir: PathBuf,
    pub submitted_at: DateTime<Utc>,
}

/// Result of a run that reached `Cleaned`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Orchestration {
    pub download: PendingDownload,
    pub completion: Completion,
    /// States visited, in order.
    pub trace: Vec<OrchestrationState>,
}

/// Cooperative abort flag, checked once per poll tick.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Orchestrator<'a, C: DaemonClient + ?Sized> {
    client: &'a mut C,
    config: OrchestratorConfig,
    cancel: CancelToken,
    trace: Vec<OrchestrationState>,
}

impl<'a, C: DaemonClient + ?Sized> Orchestrator<'a, C> {
    pub fn new(client: &'a mut C, config: OrchestratorConfig) -> Self {
        Self {
            client,
            config,
            cancel: CancelToken::new(),
            trace: Vec::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Submit `source`, poll until done and clean up.
    pub fn run(
        mut self,
        source: &TorrentSource,
        source_link: &str,
        download_dir: &Path,
    ) -> Result<Orchestration, OrchestrationError> {
        let daemon_id = self.client.add_torrent(source, download_dir)?;
        let download = PendingDownload {
            daemon_id,
            source_link: source_link.to_string(),
            download_dir: download_dir.to_path_buf(),
            submitted_at: Utc::now(),
        };
        self.enter(OrchestrationState::Submitted, daemon_id);

        if let Err(err) = self.client.start_torrent(daemon_id) {
            return Err(self.abandon(daemon_id, err.into()));
        }
        tracing::info!(
            daemon = self.client.kind(),
            handle = %daemon_id,
            link = source_link,
            "downloading"
        );

        let completion = self.poll_until_done(daemon_id)?;
        self.enter(OrchestrationState::Cleaned, daemon_id);
        Ok(Orchestration {
            download,
            completion,
            trace: self.trace,
        })
    }

    fn poll_until_done(&mut self, id: HandleId) -> Result<Completion, OrchestrationError> {
        let started = Instant::now();
        loop {
            if self.cancel.is_cancelled() {
                let reason = "cancelled".to_string();
                return Err(self.abandon(id, OrchestrationError::Abandoned { handle: id, reason }));
            }

            self.enter(OrchestrationState::Polling, id);
            match self.client.list_torrents(&POLL_FIELDS) {
                Ok(records) if records.is_empty() => {
                    self.enter(OrchestrationState::Stalled, id);
                    self.client.shutdown()?;
                    return Ok(Completion::DaemonEmpty);
                }
                Ok(records) => {
                    let state = records
                        .iter()
                        .find(|record| record.id() == Some(id))
                        .and_then(|record| record.state());
                    tracing::debug!(handle = %id, state = ?state, torrents = records.len(), "poll");
                    if state.is_some_and(|state| state.is_complete()) {
                        self.enter(OrchestrationState::Seeding, id);
                        self.client.delete_torrent(id)?;
                        self.stop_if_idle();
                        return Ok(Completion::Finished);
                    }
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(handle = %id, error = %err, "poll failed, retrying next tick");
                }
                Err(err) => return Err(self.abandon(id, err.into())),
            }

            let waited = started.elapsed();
            if waited >= self.config.max_wait {
                return Err(self.abandon(id, OrchestrationError::Timeout { handle: id, waited }));
            }
            sleep(self.config.poll_interval);
        }
    }

    /// Shut the daemon down when the deleted torrent was its last one.
    /// Failures only cost a running idle daemon, so they are logged.
    fn stop_if_idle(&mut self) {
        if !self.config.shutdown_when_idle {
            return;
        }
        match self.client.list_torrents(&POLL_FIELDS) {
            Ok(records) if records.is_empty() => {
                if let Err(err) = self.client.shutdown() {
                    tracing::warn!(error = %err, "idle daemon did not shut down");
                } else {
                    tracing::info!(daemon = self.client.kind(), "daemon idle, shut down");
                }
            }
            Ok(records) => {
                tracing::debug!(torrents = records.len(), "daemon still busy");
            }
            Err(err) => tracing::warn!(error = %err, "idle check failed"),
        }
    }

    /// Best-effort delete, then hand back the error that ended the run.
    fn abandon(&mut self, id: HandleId, cause: OrchestrationError) -> OrchestrationError {
        if let Err(err) = self.client.delete_torrent(id) {
            tracing::warn!(handle = %id, error = %err, "cleanup delete failed");
        }
        self.enter(OrchestrationState::Abandoned, id);
        tracing::warn!(handle = %id, error = %cause, "orchestration abandoned");
        cause
    }

    fn enter(&mut self, state: OrchestrationState, id: HandleId) {
        if state == OrchestrationState::Polling {
            tracing::debug!(handle = %id, state = ?state, "orchestrator state");
        } else {
            tracing::info!(handle = %id, state = ?state, "orchestrator state");
        }
        self.trace.push(state);
    }
}

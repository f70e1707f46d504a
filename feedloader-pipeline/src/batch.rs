//! Candidate and batch processing: dedup, fetch, orchestrate, report.
//!
//! [`Pipeline::process_candidate`] is the one entry point feed scanners
//! need. [`Pipeline::process_batch`] runs candidates in order, collects
//! failures instead of stopping at the first one, and reports the entries
//! that appeared in the download directory for a notifier to announce.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use feedloader_core::{HandleId, RateLimits};
use feedloader_daemon::{DaemonClient, LaunchGuard, LaunchOutcome};

use crate::dedup::DedupStore;
use crate::error::{io_err, OrchestrationError};
use crate::fetch::Fetcher;
use crate::orchestrator::{CancelToken, Completion, Orchestrator, OrchestratorConfig};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A candidate that made it all the way to `Cleaned`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedDownload {
    pub link: String,
    pub handle: HandleId,
    pub completion: Completion,
    /// Download-directory entries that did not exist before submission.
    pub new_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// Already recorded in the dedup store; nothing was submitted.
    AlreadySeen,
    Completed(CompletedDownload),
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<CompletedDownload>,
    pub skipped: Vec<String>,
    pub failures: Vec<(String, OrchestrationError)>,
}

impl BatchReport {
    /// Newly completed item names across the batch, in completion order.
    pub fn new_items(&self) -> Vec<String> {
        self.completed
            .iter()
            .flat_map(|done| done.new_items.iter().cloned())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<'a, C: DaemonClient + ?Sized> {
    client: &'a mut C,
    dedup: &'a DedupStore,
    fetcher: Fetcher,
    config: OrchestratorConfig,
    download_dir: PathBuf,
    cancel: CancelToken,
    launcher: Option<LaunchGuard>,
    rate_limits: Option<RateLimits>,
}

impl<'a, C: DaemonClient + ?Sized> Pipeline<'a, C> {
    pub fn new(
        client: &'a mut C,
        dedup: &'a DedupStore,
        config: OrchestratorConfig,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            dedup,
            fetcher: Fetcher::new(),
            config,
            download_dir: download_dir.into(),
            cancel: CancelToken::new(),
            launcher: None,
            rate_limits: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Probe the daemon before every submission and relaunch it through
    /// `launcher` when an earlier candidate left it shut down.
    pub fn with_launcher(mut self, launcher: LaunchGuard) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Limits to re-apply whenever the daemon is relaunched.
    pub fn with_rate_limits(mut self, limits: Option<RateLimits>) -> Self {
        self.rate_limits = limits;
        self
    }

    /// Dedup-check, fetch, submit, poll and clean up one candidate.
    ///
    /// The link is recorded before anything is downloaded, so a candidate
    /// that fails later is not retried by the next scan.
    pub fn process_candidate(
        &mut self,
        link: &str,
    ) -> Result<CandidateOutcome, OrchestrationError> {
        let link = link.trim();
        if self.dedup.has_seen(link)? {
            tracing::debug!(link, "skipping link seen before");
            return Ok(CandidateOutcome::AlreadySeen);
        }

        let source = self.fetcher.resolve(link)?;
        self.ensure_daemon()?;
        std::fs::create_dir_all(&self.download_dir)
            .map_err(|e| io_err(&self.download_dir, e))?;
        let before = snapshot(&self.download_dir)?;

        let run = Orchestrator::new(&mut *self.client, self.config)
            .with_cancel(self.cancel.clone())
            .run(&source, link, &self.download_dir)?;

        let after = snapshot(&self.download_dir)?;
        let new_items: Vec<String> = after.difference(&before).cloned().collect();
        tracing::info!(link, handle = %run.download.daemon_id, new_items = new_items.len(), "download complete");

        Ok(CandidateOutcome::Completed(CompletedDownload {
            link: link.to_string(),
            handle: run.download.daemon_id,
            completion: run.completion,
            new_items,
        }))
    }

    /// Process every candidate; one failure never stops the batch.
    pub fn process_batch<I, S>(&mut self, links: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = BatchReport::default();
        for link in links {
            let link = link.as_ref().trim();
            if link.is_empty() {
                continue;
            }
            if self.cancel.is_cancelled() {
                tracing::info!("batch cancelled");
                break;
            }
            match self.process_candidate(link) {
                Ok(CandidateOutcome::AlreadySeen) => report.skipped.push(link.to_string()),
                Ok(CandidateOutcome::Completed(done)) => report.completed.push(done),
                Err(err) => {
                    tracing::error!(link, error = %err, "unable to load torrent");
                    report.failures.push((link.to_string(), err));
                }
            }
        }
        report
    }

    fn ensure_daemon(&mut self) -> Result<(), OrchestrationError> {
        let Some(launcher) = &self.launcher else {
            return Ok(());
        };
        let outcome = launcher
            .ensure_running(&mut *self.client)
            .map_err(OrchestrationError::Launch)?;
        if let LaunchOutcome::Launched { probes } = outcome {
            tracing::info!(daemon = self.client.kind(), probes, "relaunched daemon");
            if let Some(limits) = self.rate_limits {
                self.client
                    .set_rate_limits(limits.upload_kbs, limits.download_kbs)?;
            }
        }
        Ok(())
    }
}

/// Names of the entries directly inside `dir`.
fn snapshot(dir: &Path) -> Result<BTreeSet<String>, OrchestrationError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    entries
        .map(|entry| {
            entry
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .map_err(|e| io_err(dir, e))
        })
        .collect()
}

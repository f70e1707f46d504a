//! Start the daemon when it is not reachable, never a second instance.

use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::Duration;

use feedloader_core::LaunchSettings;

use crate::client::DaemonClient;
use crate::error::DaemonError;

const DEFAULT_ATTEMPTS: u32 = 10;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// How the daemon came to be reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    AlreadyRunning,
    /// Launched by us; reachable on the `probes`-th probe after launch.
    Launched { probes: u32 },
}

#[derive(Debug, Clone)]
pub struct LaunchGuard {
    command: Option<(String, Vec<String>)>,
    attempts: u32,
    backoff: Duration,
}

impl LaunchGuard {
    /// A guard that launches `program args...` when needed.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: Some((program.into(), args)),
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// A guard that only probes; an unreachable daemon is an error.
    pub fn probe_only() -> Self {
        Self {
            command: None,
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn from_settings(settings: Option<&LaunchSettings>) -> Self {
        let Some(launch) = settings else {
            return Self::probe_only();
        };
        let mut parts = launch.command.iter().cloned();
        let guard = match parts.next() {
            Some(program) => Self::new(program, parts.collect()),
            None => Self::probe_only(),
        };
        guard
            .with_attempts(launch.attempts)
            .with_backoff(launch.backoff())
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Make sure the daemon behind `probe` answers.
    ///
    /// Launches the configured command at most once, then probes up to the
    /// configured number of attempts with a fixed backoff in between.
    pub fn ensure_running<C: DaemonClient + ?Sized>(
        &self,
        probe: &mut C,
    ) -> Result<LaunchOutcome, DaemonError> {
        if probe.is_reachable() {
            tracing::debug!(daemon = probe.kind(), "daemon already running");
            return Ok(LaunchOutcome::AlreadyRunning);
        }

        let Some((program, args)) = &self.command else {
            return Err(DaemonError::Unreachable { attempts: 1 });
        };

        tracing::info!(daemon = probe.kind(), program = %program, "daemon not reachable, launching");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| DaemonError::LaunchFailed {
                program: program.clone(),
                reason: err.to_string(),
            })?;

        for attempt in 1..=self.attempts {
            sleep(self.backoff);
            if probe.is_reachable() {
                reap(&mut child);
                tracing::info!(daemon = probe.kind(), probes = attempt, "daemon is up");
                return Ok(LaunchOutcome::Launched { probes: attempt });
            }
            tracing::debug!(daemon = probe.kind(), attempt, "daemon not up yet");
        }

        reap(&mut child);
        Err(DaemonError::Unreachable {
            attempts: self.attempts,
        })
    }
}

/// Collect the launcher's exit status if it already finished
/// (daemons that fork return immediately).
fn reap(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(status)) if !status.success() => {
            tracing::warn!(status = %status, "daemon launcher exited with failure");
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "could not poll daemon launcher"),
    }
}

//! `feedloader fetch`: the feed-scanner entry point.

use std::io::BufRead;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use feedloader_daemon::{connect, DaemonClient, LaunchGuard, LaunchOutcome};
use feedloader_pipeline::{BatchReport, CompletedDownload, DedupStore, OrchestratorConfig, Pipeline};

use super::load_settings;

/// Arguments for `feedloader fetch`.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Torrent URLs or magnet links.
    pub links: Vec<String>,

    /// Also read links from stdin, one per line.
    #[arg(long)]
    pub stdin: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct FetchReportJson<'a> {
    completed: &'a [CompletedDownload],
    skipped: &'a [String],
    failures: Vec<FailureJson>,
    new_items: Vec<String>,
}

#[derive(Serialize)]
struct FailureJson {
    link: String,
    error: String,
}

impl FetchArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let (home, settings) = load_settings(config)?;

        let mut links = self.links;
        if self.stdin {
            for line in std::io::stdin().lock().lines() {
                links.push(line.context("failed to read links from stdin")?);
            }
        }
        links.retain(|link| !link.trim().is_empty());
        if links.is_empty() {
            bail!("no links given; pass them as arguments or with --stdin");
        }

        let store = DedupStore::open(&settings.dedup_db_at(&home))
            .context("failed to open link store")?;
        let mut client = connect(&settings, &home);

        let launcher = LaunchGuard::from_settings(settings.launch.as_ref());
        match launcher
            .ensure_running(&mut client)
            .with_context(|| format!("{} daemon is not available", client.kind()))?
        {
            LaunchOutcome::AlreadyRunning => {}
            LaunchOutcome::Launched { probes } => {
                tracing::info!(daemon = client.kind(), probes, "started daemon");
            }
        }
        if let Some(limits) = settings.rate_limits {
            client
                .set_rate_limits(limits.upload_kbs, limits.download_kbs)
                .context("failed to apply rate limits")?;
        }

        let report = Pipeline::new(
            &mut client,
            &store,
            OrchestratorConfig::from_settings(&settings),
            settings.download_dir_at(&home),
        )
        .with_launcher(launcher)
        .with_rate_limits(settings.rate_limits)
        .process_batch(&links);

        if self.json {
            print_json(&report)?;
        } else {
            print_summary(&report);
        }

        if !report.is_success() {
            bail!(
                "{} of {} links failed",
                report.failures.len(),
                links.len()
            );
        }
        Ok(())
    }
}

fn print_json(report: &BatchReport) -> Result<()> {
    let payload = FetchReportJson {
        completed: &report.completed,
        skipped: &report.skipped,
        failures: report
            .failures
            .iter()
            .map(|(link, err)| FailureJson {
                link: link.clone(),
                error: err.to_string(),
            })
            .collect(),
        new_items: report.new_items(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize fetch report")?
    );
    Ok(())
}

fn print_summary(report: &BatchReport) {
    for done in &report.completed {
        println!(
            "{} {} (#{})",
            "done".green().bold(),
            done.link,
            done.handle
        );
        for item in &done.new_items {
            println!("  {item}");
        }
    }
    for link in &report.skipped {
        println!("{} {link}", "seen".bright_black());
    }
    for (link, err) in &report.failures {
        println!("{} {link}: {err}", "failed".red().bold());
    }
}

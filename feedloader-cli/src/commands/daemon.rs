//! `feedloader daemon`: direct control of the configured download daemon.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use feedloader_core::{DaemonSettings, FieldId, Settings, TorrentRecord, TorrentState};
use feedloader_daemon::{
    connect, ClientError, DaemonClient, LaunchGuard, LaunchOutcome, TransportError,
};

use super::load_settings;

/// Fields shown by `daemon list`.
const LIST_FIELDS: [FieldId; 7] = [
    FieldId::Id,
    FieldId::Name,
    FieldId::State,
    FieldId::BytesGot,
    FieldId::BytesTotal,
    FieldId::DownloadRate,
    FieldId::UploadRate,
];

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Report whether the daemon answers.
    Status,
    /// List every torrent the daemon tracks.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
    /// Launch the daemon with the configured command unless it is running.
    Start,
    /// Ask the daemon to shut down.
    Stop,
    /// Activate every torrent.
    StartAll,
    /// Deactivate every torrent, keeping them tracked.
    StopAll,
    /// Set transfer limits in KB/s.
    Rate {
        upload_kbs: u32,
        download_kbs: u32,
    },
    /// Remove every torrent that finished downloading.
    Prune,
}

#[derive(Serialize)]
struct TorrentJson {
    id: Option<i64>,
    name: Option<String>,
    state: Option<TorrentState>,
    bytes_got: Option<i64>,
    bytes_total: Option<i64>,
    download_rate: Option<i64>,
    upload_rate: Option<i64>,
}

#[derive(Tabled)]
struct TorrentTableRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "done")]
    done: String,
    #[tabled(rename = "down")]
    down: String,
    #[tabled(rename = "up")]
    up: String,
}

pub fn run(command: DaemonCommand, config: Option<&Path>) -> Result<()> {
    let (home, settings) = load_settings(config)?;
    let mut client = connect(&settings, &home);

    match command {
        DaemonCommand::Status => {
            let payload = serde_json::json!({
                "running": client.is_reachable(),
                "daemon": client.kind(),
                "endpoint": endpoint(&settings, &home),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render daemon status JSON")?
            );
        }
        DaemonCommand::List { json } => {
            let records = client
                .list_torrents(&LIST_FIELDS)
                .context("failed to list torrents")?;
            if json {
                let rows: Vec<TorrentJson> = records.iter().map(torrent_json).collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&rows)
                        .context("failed to serialize torrent list")?
                );
            } else {
                print_table(&records);
            }
        }
        DaemonCommand::Start => {
            match LaunchGuard::from_settings(settings.launch.as_ref())
                .ensure_running(&mut client)
                .context("failed to start daemon")?
            {
                LaunchOutcome::AlreadyRunning => println!("daemon is already running"),
                LaunchOutcome::Launched { probes } => {
                    println!("daemon started (up after {probes} probes)")
                }
            }
        }
        DaemonCommand::Stop => match client.shutdown() {
            Ok(()) => println!("daemon stop requested"),
            Err(ClientError::Transport(TransportError::Unreachable { .. })) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::StartAll => {
            client.start_all().context("failed to start torrents")?;
            println!("all torrents started");
        }
        DaemonCommand::StopAll => {
            client.stop_all().context("failed to stop torrents")?;
            println!("all torrents stopped");
        }
        DaemonCommand::Rate {
            upload_kbs,
            download_kbs,
        } => {
            client
                .set_rate_limits(upload_kbs, download_kbs)
                .context("failed to set rate limits")?;
            println!("rate limits set: up {upload_kbs} KB/s, down {download_kbs} KB/s");
        }
        DaemonCommand::Prune => {
            let removed = client
                .remove_finished()
                .context("failed to remove finished torrents")?;
            if removed.is_empty() {
                println!("no finished torrents");
            }
            for id in removed {
                println!("removed #{id}");
            }
        }
    }

    Ok(())
}

fn endpoint(settings: &Settings, home: &Path) -> String {
    match &settings.daemon {
        DaemonSettings::Btpd { .. } => settings
            .btpd_socket_at(home)
            .unwrap_or_else(PathBuf::new)
            .display()
            .to_string(),
        DaemonSettings::Transmission { url } => feedloader_daemon::sanitize_url(url),
    }
}

fn torrent_json(record: &TorrentRecord) -> TorrentJson {
    TorrentJson {
        id: record.id().map(|id| id.0),
        name: record.name().map(str::to_string),
        state: record.state(),
        bytes_got: record.bytes_got(),
        bytes_total: record.bytes_total(),
        download_rate: record.download_rate(),
        upload_rate: record.upload_rate(),
    }
}

fn print_table(records: &[TorrentRecord]) {
    if records.is_empty() {
        println!("No torrents.");
        return;
    }

    let rows: Vec<TorrentTableRow> = records
        .iter()
        .map(|record| TorrentTableRow {
            id: record.id().map(|id| id.to_string()).unwrap_or_default(),
            name: record.name().unwrap_or("-").to_string(),
            state: state_label(record.state()),
            done: record
                .percent_done()
                .map(|pct| format!("{pct}%"))
                .unwrap_or_else(|| "-".to_string()),
            down: rate_label(record.download_rate()),
            up: rate_label(record.upload_rate()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn state_label(state: Option<TorrentState>) -> String {
    let Some(state) = state else {
        return "-".to_string();
    };
    let label = state.to_string();
    if state.is_complete() {
        label.green().to_string()
    } else if matches!(state, TorrentState::Stopped | TorrentState::Inactive) {
        label.bright_black().to_string()
    } else {
        label.yellow().to_string()
    }
}

fn rate_label(bytes_per_sec: Option<i64>) -> String {
    match bytes_per_sec {
        Some(rate) => format!("{} KB/s", rate / 1024),
        None => "-".to_string(),
    }
}

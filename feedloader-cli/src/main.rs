//! feedloader: hand feed links to a local torrent daemon and wait them out.
//!
//! # Usage
//!
//! ```text
//! feedloader fetch <link>... [--stdin] [--json]
//! feedloader daemon status|start|stop|prune
//! feedloader daemon list [--json]
//! feedloader daemon rate <upload-kbs> <download-kbs>
//! feedloader links check <link>
//! feedloader links count
//! ```
//!
//! Global flags: `--config <path>` (default `~/.feedloader/config.yaml`),
//! `--log-json`. Log verbosity follows `RUST_LOG`.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonCommand, fetch::FetchArgs, links::LinksCommand};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "feedloader",
    version,
    about = "Download feed links through a local torrent daemon",
    long_about = None,
)]
struct Cli {
    /// Settings file to use instead of ~/.feedloader/config.yaml.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download every new link and wait until each one is complete.
    Fetch(FetchArgs),

    /// Talk to the configured download daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Inspect the store of links already handled.
    Links {
        #[command(subcommand)]
        command: LinksCommand,
    },
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Fetch(args) => args.run(config),
        Commands::Daemon { command } => commands::daemon::run(command, config),
        Commands::Links { command } => commands::links::run(command, config),
    }
}

//! `feedloader links`: read-only view of the seen-links store.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use feedloader_pipeline::DedupStore;

use super::load_settings;

#[derive(Subcommand, Debug)]
pub enum LinksCommand {
    /// Report whether a link was handled before, without recording it.
    Check { link: String },
    /// Print how many links have been handled.
    Count,
}

pub fn run(command: LinksCommand, config: Option<&Path>) -> Result<()> {
    let (home, settings) = load_settings(config)?;
    let path = settings.dedup_db_at(&home);
    let store = DedupStore::open(&path)
        .with_context(|| format!("failed to open link store at {}", path.display()))?;

    match command {
        LinksCommand::Check { link } => match store.contains(link.trim())? {
            Some(record) => println!("seen {} at {}", record.link, record.seen_at.to_rfc3339()),
            None => println!("not seen {}", link.trim()),
        },
        LinksCommand::Count => println!("{}", store.count()?),
    }
    Ok(())
}

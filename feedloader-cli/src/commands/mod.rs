pub mod daemon;
pub mod fetch;
pub mod links;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use feedloader_core::{settings, Settings};

/// Resolve the home directory and load settings from `--config` or the
/// default location.
pub fn load_settings(config: Option<&Path>) -> Result<(PathBuf, Settings)> {
    let home = settings::home().context("could not determine home directory")?;
    let settings = match config {
        Some(path) => settings::load_from(path),
        None => settings::load_at(&home),
    }
    .context("failed to load settings")?;
    Ok((home, settings))
}

use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "config.yaml";
pub const DEDUP_DB_FILE: &str = "links.sqlite3";

pub fn feedloader_root(home: &Path) -> PathBuf {
    home.join(".feedloader")
}

pub fn settings_path(home: &Path) -> PathBuf {
    feedloader_root(home).join(SETTINGS_FILE)
}

pub fn default_dedup_db_path(home: &Path) -> PathBuf {
    feedloader_root(home).join(DEDUP_DB_FILE)
}

/// Socket the btpd daemon listens on when started without `-d`.
pub fn default_btpd_socket(home: &Path) -> PathBuf {
    home.join(".btpd").join("sock")
}

/// Replace a leading `~` component with `home`.
pub fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

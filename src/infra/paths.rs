// src/infra/paths.rs — Config and data locations
//
// HARVESTER_HOME overrides everything: config and data live under it.
// Otherwise config lives in ~/.harvester/ and data in XDG_DATA_HOME/harvester.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

fn harvester_home() -> Option<PathBuf> {
    std::env::var_os("HARVESTER_HOME").map(PathBuf::from)
}

/// Home directory, or the current directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $HARVESTER_HOME/ or ~/.harvester/
pub fn config_dir() -> PathBuf {
    if let Some(home) = harvester_home() {
        return home;
    }
    dirs_home().join(".harvester")
}

/// Data directory: $HARVESTER_HOME/data/ or ~/.local/share/harvester/
pub fn data_dir() -> PathBuf {
    if let Some(home) = harvester_home() {
        return home.join("data");
    }
    ProjectDirs::from("", "", "harvester")
        .map(|d| d.data_local_dir().to_path_buf())
        .unwrap_or_else(|| config_dir().join("data"))
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// SQLite database shared by the cache and the document store.
pub fn db_path() -> PathBuf {
    data_dir().join("harvester.db")
}

/// Create the data directory if needed.
pub fn ensure_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(data_dir())
}

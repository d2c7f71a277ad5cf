//! Default locations for configuration, cache and log files.

use std::path::PathBuf;

/// The name of the application directory under the config/cache/state roots
pub const APP_DIR_NAME: &str = "lyricsync";

/// The name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The name of the lyrics cache database file
pub const LYRICS_CACHE_DB_FILE_NAME: &str = "lyrics_cache.db";

/// The name of the log file
pub const LOG_FILE_NAME: &str = "lyricsync.log";

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration directory path (~/.config/lyricsync/)
#[must_use]
pub fn config_dir() -> PathBuf {
    home_dir().join(".config").join(APP_DIR_NAME)
}

/// Get the config file path (~/.config/lyricsync/config.toml)
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Get the default cache directory (`~/.cache/lyricsync/`)
#[must_use]
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| home_dir().join(".cache"))
        .join(APP_DIR_NAME)
}

/// Get the lyrics cache database path inside `dir`
#[must_use]
pub fn lyrics_cache_db_path(dir: &std::path::Path) -> PathBuf {
    dir.join(LYRICS_CACHE_DB_FILE_NAME)
}

/// Get the default log file path (`~/.local/state/lyricsync/lyricsync.log`)
#[must_use]
pub fn log_file_path() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| home_dir().join(".local").join("state"))
        .join(APP_DIR_NAME)
        .join(LOG_FILE_NAME)
}

/// Expand a leading `~/` to the user's home directory.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    path.strip_prefix("~/")
        .map_or_else(|| PathBuf::from(path), |rest| home_dir().join(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_layout() {
        let path = config_path();
        assert!(path.ends_with("lyricsync/config.toml"));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/x"), PathBuf::from("/tmp/x"));
        assert!(expand_home("~/lyrics").ends_with("lyrics"));
        assert!(!expand_home("~/lyrics").starts_with("~"));
    }
}

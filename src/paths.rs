use std::env;
use std::path::PathBuf;

const APP_NAME: &str = "polish-rs";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// ~/.config/polish-rs/
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".polish-rs"))
}

/// ~/.cache/polish-rs/ - ephemeral status for bars and widgets
pub fn cache_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.cache_dir().to_path_buf())
        .unwrap_or_else(|| env::temp_dir().join(APP_NAME))
}

/// ~/.local/share/polish-rs/ - persistent polish history
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| env::temp_dir().join(APP_NAME))
}

pub fn config_file() -> PathBuf {
    config_dir().join("config.jsonc")
}

pub fn status_file() -> PathBuf {
    cache_dir().join("status.json")
}

pub fn history_file() -> PathBuf {
    data_dir().join("history.json")
}

/// Expands a leading `~/` in a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Ok(home) = env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(trimmed)
}

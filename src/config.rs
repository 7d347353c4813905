use crate::completion::{
    DEFAULT_API_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
    DEFAULT_TIMEOUT_SECS,
};
use crate::paths;
use crate::styles::StyleId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const API_KEY_ENV: &str = "POLISH_API_KEY";

const WATCH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    pub api_endpoint: String,
    pub default_style: StyleId,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub selection_debounce_ms: u64,
    pub auto_apply: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            default_style: StyleId::default(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            selection_debounce_ms: 60,
            auto_apply: false,
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn selection_debounce(&self) -> Duration {
        Duration::from_millis(self.selection_debounce_ms)
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Parses JSON with comments and trailing commas.
    pub fn from_jsonc(text: &str) -> Result<Self> {
        let value = jsonc_parser::parse_to_serde_value(text, &Default::default())
            .map_err(|err| anyhow::anyhow!("Invalid config syntax: {err}"))?;
        match value {
            Some(value) => serde_json::from_value(value).context("Invalid config values"),
            None => Ok(Self::default()),
        }
    }
}

struct Inner {
    path: Option<PathBuf>,
    tx: watch::Sender<Config>,
    api_key_override: Option<String>,
}

/// Settings collaborator. Cheap to clone; every clone sees the same config.
#[derive(Clone)]
pub struct ConfigManager {
    inner: Arc<Inner>,
}

impl ConfigManager {
    /// Loads the default config file and honors `POLISH_API_KEY`.
    pub fn load() -> Result<Self> {
        Self::open(paths::config_file(), env::var(API_KEY_ENV).ok())
    }

    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path, None)
    }

    /// Loads `path`, writing defaults if it is missing. A non-blank
    /// `api_key_override` replaces the stored key on every read but is never saved.
    pub fn open(path: impl Into<PathBuf>, api_key_override: Option<String>) -> Result<Self> {
        let path = path.into();
        let config = if path.exists() {
            read_config(&path)?
        } else {
            let config = Config::default();
            write_config(&path, &config)?;
            info!("📝 Wrote default configuration to {}", path.display());
            config
        };

        let (tx, _rx) = watch::channel(config);
        Ok(Self {
            inner: Arc::new(Inner {
                path: Some(path),
                tx,
                api_key_override,
            }),
        })
    }

    /// A manager with no backing file; saves only update memory.
    pub fn in_memory(config: Config) -> Self {
        let (tx, _rx) = watch::channel(config);
        Self {
            inner: Arc::new(Inner {
                path: None,
                tx,
                api_key_override: None,
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Current settings, with the API key override applied.
    pub fn get(&self) -> Config {
        let config = self.inner.tx.borrow().clone();
        apply_api_key_override(config, self.inner.api_key_override.as_deref())
    }

    pub fn subscribe(&self) -> watch::Receiver<Config> {
        self.inner.tx.subscribe()
    }

    pub fn save(&self, config: Config) -> Result<()> {
        if let Some(path) = &self.inner.path {
            write_config(path, &config)?;
        }
        self.inner.tx.send_replace(config);
        Ok(())
    }

    pub fn update(&self, apply: impl FnOnce(&mut Config)) -> Result<Config> {
        let mut config = self.inner.tx.borrow().clone();
        apply(&mut config);
        self.save(config.clone())?;
        Ok(config)
    }

    pub fn set_api_key(&self, key: &str) -> Result<()> {
        let key = key.trim().to_string();
        self.update(|config| config.api_key = key)?;
        Ok(())
    }

    pub fn set_api_endpoint(&self, endpoint: &str) -> Result<()> {
        let endpoint = endpoint.trim().to_string();
        reqwest::Url::parse(&endpoint)
            .with_context(|| format!("'{endpoint}' is not a valid URL"))?;
        self.update(|config| config.api_endpoint = endpoint)?;
        Ok(())
    }

    pub fn set_default_style(&self, style: StyleId) -> Result<()> {
        self.update(|config| config.default_style = style)?;
        Ok(())
    }

    /// Polls the config file and publishes changes to subscribers. The thread
    /// exits once every manager clone is dropped.
    pub fn start_watching(&self) {
        let Some(path) = self.inner.path.clone() else {
            return;
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        thread::spawn(move || {
            let mut last_modified = modified_at(&path);
            loop {
                thread::sleep(WATCH_INTERVAL);
                let Some(inner) = weak.upgrade() else {
                    debug!("Config watcher stopping");
                    break;
                };

                let modified = modified_at(&path);
                if modified == last_modified {
                    continue;
                }
                last_modified = modified;

                match read_config(&path) {
                    Ok(config) => {
                        let changed = inner.tx.send_if_modified(|current| {
                            if *current == config {
                                false
                            } else {
                                *current = config;
                                true
                            }
                        });
                        if changed {
                            info!("🔄 Configuration reloaded from {}", path.display());
                        }
                    }
                    Err(err) => warn!("Ignoring invalid configuration update: {err:#}"),
                }
            }
        });
    }
}

fn apply_api_key_override(mut config: Config, key: Option<&str>) -> Config {
    if let Some(key) = key.map(str::trim).filter(|key| !key.is_empty()) {
        config.api_key = key.to_string();
    }
    config
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn read_config(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    Config::from_jsonc(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsonc_comments_and_partial_configs_fill_defaults() {
        let text = r#"{
            // personal key
            "api_key": "sk-abc",
            "default_style": "commit",
        }"#;
        let config = Config::from_jsonc(text).unwrap();
        assert_eq!(config.api_key, "sk-abc");
        assert_eq!(config.default_style, StyleId::Commit);
        assert_eq!(config.api_endpoint, DEFAULT_API_ENDPOINT);
        assert_eq!(config.selection_debounce_ms, 60);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_jsonc("").unwrap(), Config::default());
    }

    #[test]
    fn unknown_style_is_an_error() {
        assert!(Config::from_jsonc(r#"{"default_style": "casual"}"#).is_err());
    }

    #[test]
    fn in_memory_updates_reach_subscribers() {
        let manager = ConfigManager::in_memory(Config::default());
        let rx = manager.subscribe();
        manager.set_default_style(StyleId::Concise).unwrap();
        assert_eq!(rx.borrow().default_style, StyleId::Concise);
        assert_eq!(manager.get().default_style, StyleId::Concise);
    }

    #[test]
    fn api_key_override_wins_over_stored_key() {
        let stored = Config {
            api_key: "sk-file".to_string(),
            ..Config::default()
        };
        let config = apply_api_key_override(stored, Some(" sk-env "));
        assert_eq!(config.api_key, "sk-env");
        assert!(config.has_api_key());
    }

    #[test]
    fn blank_api_key_override_is_ignored() {
        let stored = Config {
            api_key: "sk-file".to_string(),
            ..Config::default()
        };
        assert_eq!(apply_api_key_override(stored.clone(), Some("   ")).api_key, "sk-file");
        assert_eq!(apply_api_key_override(stored, None).api_key, "sk-file");
    }

    #[test]
    fn api_key_override_is_never_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.jsonc");
        let manager = ConfigManager::open(&path, Some("sk-env".to_string())).unwrap();
        assert_eq!(manager.get().api_key, "sk-env");

        manager.set_default_style(StyleId::Commit).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("sk-env"));

        let reloaded = ConfigManager::load_from(&path).unwrap().get();
        assert_eq!(reloaded.default_style, StyleId::Commit);
        assert!(!reloaded.has_api_key());
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let manager = ConfigManager::in_memory(Config::default());
        assert!(manager.set_api_endpoint("nope").is_err());
        assert_eq!(manager.get().api_endpoint, DEFAULT_API_ENDPOINT);
    }
}

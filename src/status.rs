use crate::error::PolishError;
use crate::paths;
use crate::styles::StyleId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use time::macros::format_description;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelState {
    Idle,
    Awaiting,
    Ready,
    Error,
}

impl PanelState {
    fn icon(&self) -> &'static str {
        match self {
            Self::Idle => "✎",
            Self::Awaiting => "…",
            Self::Ready => "✓",
            Self::Error => "!",
        }
    }
}

/// What a bar widget or panel reads to render the current session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelStatus {
    pub state: PanelState,
    pub text: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default)]
    pub offers_configuration: bool,
    #[serde(default)]
    pub selection_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub original: String,
    pub polished: String,
    pub style: StyleId,
    pub timestamp: String,
}

/// Reporting surface: a JSON status file plus a bounded history of applied polishes.
pub struct StatusWriter {
    status_file: PathBuf,
    history_file: PathBuf,
    max_history: usize,
}

impl StatusWriter {
    pub fn new() -> Result<Self> {
        Self::with_files(paths::status_file(), paths::history_file())
    }

    /// Keeps both files under one directory.
    pub fn at(dir: &Path) -> Result<Self> {
        Self::with_files(dir.join("status.json"), dir.join("history.json"))
    }

    fn with_files(status_file: PathBuf, history_file: PathBuf) -> Result<Self> {
        for file in [&status_file, &history_file] {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        Ok(Self {
            status_file,
            history_file,
            max_history: 20,
        })
    }

    pub fn status_file(&self) -> &Path {
        &self.status_file
    }

    fn write(&self, status: &PanelStatus) -> Result<()> {
        let json = serde_json::to_string(status).context("Failed to serialize status")?;
        fs::write(&self.status_file, &json).context("Failed to write status file")?;
        tracing::debug!(state = ?status.state, message = %status.message, "Updated status");
        Ok(())
    }

    fn status(state: PanelState, message: &str) -> PanelStatus {
        PanelStatus {
            state,
            text: state.icon().to_string(),
            message: message.to_string(),
            style: None,
            error_code: None,
            offers_configuration: false,
            selection_available: false,
        }
    }

    pub fn set_idle(&self, selection_available: bool) -> Result<()> {
        let message = if selection_available {
            "Selection ready to polish"
        } else {
            "Ready"
        };
        let mut status = Self::status(PanelState::Idle, message);
        status.selection_available = selection_available;
        self.write(&status)
    }

    pub fn set_awaiting(&self, style: StyleId) -> Result<()> {
        let mut status = Self::status(PanelState::Awaiting, "Polishing...");
        status.style = Some(style);
        self.write(&status)
    }

    /// The polished text waiting for apply or dismiss.
    pub fn set_ready(&self, polished: &str, style: StyleId) -> Result<()> {
        let mut status = Self::status(PanelState::Ready, polished);
        status.style = Some(style);
        self.write(&status)
    }

    pub fn set_error(&self, error: &PolishError) -> Result<()> {
        let mut status = Self::status(PanelState::Error, &error.message());
        status.error_code = Some(error.code().to_string());
        status.offers_configuration = error.offers_configuration();
        self.write(&status)
    }

    pub fn read(&self) -> Option<PanelStatus> {
        let content = fs::read_to_string(&self.status_file).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        fs::read_to_string(&self.history_file)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Most recent first, capped at `max_history` entries.
    pub fn record_polish(&self, original: &str, polished: &str, style: StyleId) -> Result<()> {
        let mut entries = self.history();

        let timestamp = time::OffsetDateTime::now_local()
            .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
            .unwrap_or_else(|_| "unknown".to_string());

        entries.insert(
            0,
            HistoryEntry {
                original: original.to_string(),
                polished: polished.to_string(),
                style,
                timestamp,
            },
        );
        entries.truncate(self.max_history);

        let json =
            serde_json::to_string_pretty(&entries).context("Failed to serialize history")?;
        fs::write(&self.history_file, json).context("Failed to write history file")?;

        tracing::debug!(entries = entries.len(), "Saved polish to history");
        Ok(())
    }

    /// Removes the status file on shutdown.
    pub fn cleanup(&self) -> Result<()> {
        if self.status_file.exists() {
            fs::remove_file(&self.status_file).context("Failed to remove status file")?;
        }
        Ok(())
    }
}

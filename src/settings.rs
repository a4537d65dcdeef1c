use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{dispatch::DEFAULT_VISIT_PATH, log_warn};

pub const ENV_API_URL: &str = "PORTAL_API_URL";
pub const ENV_AUTH_TOKEN: &str = "PORTAL_AUTH_TOKEN";
pub const ENV_DEBUG: &str = "PORTAL_TRACKER_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerSettings {
    pub enabled: bool,
    pub api_base_url: String,
    pub visit_path: String,
    pub auth_token: Option<String>,
    pub flush_on_hide: bool,
    pub verbose_logs: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base_url: "http://localhost:8000".into(),
            visit_path: DEFAULT_VISIT_PATH.into(),
            auth_token: None,
            flush_on_hide: false,
            verbose_logs: false,
        }
    }
}

impl TrackerSettings {
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN).filter(|v| !v.is_empty()) {
            self.auth_token = Some(token);
        }
        if let Some(debug) = lookup(ENV_DEBUG) {
            self.verbose_logs = debug == "1" || debug.eq_ignore_ascii_case("true");
        }
    }
}

/// JSON-backed settings file. Environment overrides are applied on read and
/// never written back.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<TrackerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!("ignoring malformed settings in {}: {err}", path.display());
                TrackerSettings::default()
            })
        } else {
            TrackerSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Stored settings as written in the file.
    pub fn stored(&self) -> TrackerSettings {
        self.read().clone()
    }

    /// Stored settings with environment overrides on top.
    pub fn effective(&self) -> TrackerSettings {
        let mut settings = self.stored();
        settings.apply_env_overrides();
        settings
    }

    pub fn update_auth_token(&self, token: Option<String>) -> Result<()> {
        let mut guard = self.write();
        guard.auth_token = token.filter(|t| !t.is_empty());
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: TrackerSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &TrackerSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackerSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackerSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

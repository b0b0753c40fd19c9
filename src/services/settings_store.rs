use std::path::PathBuf;
use std::sync::RwLock;

use crate::config::{normalize_api_url, normalize_poll_interval, AppConfig, ConfigError};
use crate::models::settings::AgentSettings;
use crate::services::store::{self, StoreError};

/// Persisted agent settings, read fresh by every poll cycle.
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: RwLock<AgentSettings>,
}

impl SettingsStore {
    /// In-memory only.
    pub fn ephemeral(settings: AgentSettings) -> Self {
        Self {
            path: None,
            current: RwLock::new(settings),
        }
    }

    /// Load `settings.json`, seeding it from the environment on first start.
    pub fn load_or_seed(path: impl Into<PathBuf>, seed: &AppConfig) -> Result<Self, StoreError> {
        let path = path.into();
        let settings = match store::read_json::<AgentSettings>(&path)? {
            Some(settings) => settings,
            None => {
                let settings = seed_settings(seed);
                store::write_json(&path, &settings)?;
                tracing::info!(path = %path.display(), "Seeded agent settings");
                settings
            }
        };
        Ok(Self {
            path: Some(path),
            current: RwLock::new(settings),
        })
    }

    pub fn get(&self) -> AgentSettings {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Normalize and persist the provided fields. Nothing changes on error.
    pub fn update(
        &self,
        api_url: Option<&str>,
        printer_name: Option<&str>,
        poll_interval: Option<f64>,
    ) -> Result<AgentSettings, SettingsError> {
        let next = self.stage(api_url, printer_name, poll_interval)?;
        self.commit(next)
    }

    /// Apply the provided fields to a copy of the current settings without
    /// persisting anything.
    pub fn stage(
        &self,
        api_url: Option<&str>,
        printer_name: Option<&str>,
        poll_interval: Option<f64>,
    ) -> Result<AgentSettings, SettingsError> {
        let mut next = self.get();
        if let Some(raw) = api_url {
            next.api_url = normalize_api_url(raw)?;
        }
        if let Some(raw) = printer_name {
            next.printer_name = raw.trim().to_string();
        }
        if let Some(raw) = poll_interval {
            next.poll_interval = normalize_poll_interval(raw);
        }
        Ok(next)
    }

    /// Persist staged settings and make them current.
    pub fn commit(&self, next: AgentSettings) -> Result<AgentSettings, SettingsError> {
        if let Some(path) = &self.path {
            store::write_json(path, &next)?;
        }
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = next.clone();
        Ok(next)
    }
}

fn seed_settings(config: &AppConfig) -> AgentSettings {
    // A malformed seed URL is kept verbatim so the cycle reports it.
    let api_url = normalize_api_url(&config.api_url)
        .unwrap_or_else(|_| config.api_url.trim().to_string());
    AgentSettings {
        api_url,
        printer_name: config.printer_name.as_deref().unwrap_or_default().trim().to_string(),
        poll_interval: normalize_poll_interval(config.poll_interval),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid settings: {0}")]
    Validation(#[from] garde::Report),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Token(#[from] crate::services::credentials::TokenStoreError),
}

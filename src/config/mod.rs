use reqwest::Url;
use serde::Deserialize;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;
pub const MAX_POLL_INTERVAL_SECS: u64 = 300;

/// Process-level configuration read once at start-up.
///
/// `api_url`, `agent_token`, `printer_name` and `poll_interval` only seed the
/// persisted settings on first start; after that the settings store wins.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the remote job service
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Agent bearer token used to seed the credential store
    pub agent_token: Option<String>,

    /// Locally preferred printer, overrides job and server hints
    pub printer_name: Option<String>,

    /// Poll interval in seconds (clamped to 10..=300)
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,

    /// Status API bind address (e.g., "127.0.0.1:4747")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory holding settings, token and recent job history
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// AES-256-GCM key for the stored token (base64-encoded, 32 bytes)
    pub token_key: Option<String>,

    /// Print submission command
    #[serde(default = "default_lp_command")]
    pub lp_command: String,

    /// Printer status command used for enumeration
    #[serde(default = "default_lpstat_command")]
    pub lpstat_command: String,

    /// Desktop notification command (e.g., "notify-send")
    pub notify_command: Option<String>,
}

fn default_api_url() -> String {
    "https://shipwave.app".to_string()
}

fn default_poll_interval() -> f64 {
    DEFAULT_POLL_INTERVAL_SECS as f64
}

fn default_bind_addr() -> String {
    "127.0.0.1:4747".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_lp_command() -> String {
    "lp".to_string()
}

fn default_lpstat_command() -> String {
    "lpstat".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}

/// Connection details for one poll cycle. Never held across cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub api_url: String,
    pub token: String,
}

impl AgentConfig {
    /// Validate raw values into a usable config.
    pub fn resolve(api_url: &str, token: &str) -> Result<Self, ConfigError> {
        let api_url = normalize_api_url(api_url)?;
        let token = token.trim();
        if token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(Self {
            api_url,
            token: token.to_string(),
        })
    }
}

/// Trim, validate scheme, and strip trailing slashes from the API base URL.
pub fn normalize_api_url(raw: &str) -> Result<String, ConfigError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ConfigError::MissingApiUrl);
    }

    let mut parsed = Url::parse(value).map_err(|_| ConfigError::InvalidApiUrl)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme);
    }

    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Clamp a poll interval (seconds) to the supported range.
pub fn normalize_poll_interval(raw: f64) -> u64 {
    if !raw.is_finite() {
        return DEFAULT_POLL_INTERVAL_SECS;
    }
    (raw.floor() as i64).clamp(MIN_POLL_INTERVAL_SECS as i64, MAX_POLL_INTERVAL_SECS as i64) as u64
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("API URL is required")]
    MissingApiUrl,

    #[error("API URL must be a valid URL")]
    InvalidApiUrl,

    #[error("API URL must use http or https")]
    UnsupportedScheme,

    #[error("No agent token configured")]
    MissingToken,
}

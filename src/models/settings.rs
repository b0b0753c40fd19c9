use garde::Validate;
use serde::{Deserialize, Serialize};

/// Agent settings persisted in `settings.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSettings {
    pub api_url: String,
    #[serde(default)]
    pub printer_name: String,
    pub poll_interval: u64,
}

/// Partial settings change submitted through the status API.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[garde(length(max = 2048))]
    pub api_url: Option<String>,

    #[garde(length(max = 4096))]
    pub agent_token: Option<String>,

    #[garde(length(max = 256))]
    pub printer_name: Option<String>,

    #[garde(skip)]
    pub poll_interval: Option<f64>,
}

/// Settings as shown to observers. The token itself is never echoed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub api_url: String,
    pub printer_name: String,
    pub poll_interval: u64,
    pub has_token: bool,
}

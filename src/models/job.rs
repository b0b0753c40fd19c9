use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{AsRefStr, Display};

/// Remote job identifier. The service may send numeric or string ids; both
/// are carried as their string form and echoed back in the shape received.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId {
    value: String,
    numeric: bool,
}

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            value: id.into(),
            numeric: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self {
            value: id.to_string(),
            numeric: true,
        }
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(serde_json::Number),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => JobId {
                value: n.to_string(),
                numeric: true,
            },
            RawId::Text(s) => JobId::new(s),
        })
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.numeric {
            if let Ok(n) = self.value.parse::<serde_json::Number>() {
                return n.serialize(serializer);
            }
        }
        serializer.serialize_str(&self.value)
    }
}

/// Remote job status. Owned by the service; the agent only requests changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Printing,
    Completed,
    Failed,
}

/// Declared label payload format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LabelFormat {
    Zpl,
    Epl2,
    Image,
    Pdf,
    #[default]
    #[serde(other)]
    Unknown,
}

impl LabelFormat {
    /// Formats that are printer-control language and must bypass rasterization.
    pub fn is_raw(self) -> bool {
        matches!(self, LabelFormat::Zpl | LabelFormat::Epl2)
    }
}

/// A pending print job as listed by the remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    #[serde(default, deserialize_with = "lenient_text")]
    pub tracking_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub order_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub label_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_format")]
    pub label_format: LabelFormat,
    #[serde(default, deserialize_with = "lenient_text")]
    pub printer_name: Option<String>,
}

impl Job {
    /// Short human label for notifications and logs.
    pub fn display_name(&self) -> &str {
        non_empty(self.tracking_code.as_deref())
            .or_else(|| non_empty(self.order_number.as_deref()))
            .unwrap_or("Label")
    }
}

fn lenient_format<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LabelFormat, D::Error> {
    let raw = lenient_text(deserializer)?;
    Ok(raw
        .and_then(|s| serde_json::from_value(serde_json::Value::String(s)).ok())
        .unwrap_or_default())
}

/// Strings pass through, numbers keep their JSON text, anything else is absent.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawText {
        Text(String),
        Number(serde_json::Number),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<RawText>::deserialize(deserializer)? {
        Some(RawText::Text(s)) => Some(s),
        Some(RawText::Number(n)) => Some(n.to_string()),
        Some(RawText::Other(_)) | None => None,
    })
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Server-side hints returned with the job list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    #[serde(default)]
    pub default_printer_name: Option<String>,
}

/// Body of `GET /api/agent/jobs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PendingJobs {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub settings: ServerSettings,
}

/// Body of `PATCH /api/agent/jobs/{id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate<'a> {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<&'a str>,
}

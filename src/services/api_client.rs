use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response, Url};
use serde_json::Value;

use crate::config::{normalize_api_url, AgentConfig, ConfigError};
use crate::models::job::{Job, JobId, JobStatus, PendingJobs, ServerSettings, StatusUpdate};

/// Hard deadline for every call to the remote job service.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Operations the agent performs against the remote job queue.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// List pending jobs together with server-side hints.
    async fn fetch_pending_jobs(&self, config: &AgentConfig) -> Result<PendingJobs, ApiClientError>;

    /// Request a status change. Claiming is `status = Printing`.
    async fn update_job_status(
        &self,
        config: &AgentConfig,
        job_id: &JobId,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<Value, ApiClientError>;
}

/// reqwest-backed client for the agent job endpoints.
pub struct HttpJobApi {
    http: Client,
    timeout: Duration,
}

impl Default for HttpJobApi {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpJobApi {
    pub fn new() -> Self {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            timeout,
        }
    }

    async fn request_json(
        &self,
        config: &AgentConfig,
        method: Method,
        segments: &[&str],
        body: Option<&StatusUpdate<'_>>,
    ) -> Result<Value, ApiClientError> {
        let token = ensure_token(config)?;
        let url = endpoint(&config.api_url, segments)?;

        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        // Dropping the exchange future on expiry cancels the in-flight request.
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = ResponseBody::read(response).await;
            Ok::<_, reqwest::Error>((status, body))
        };
        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ApiClientError::Timeout)??;

        if !status.is_success() {
            return Err(body.into_rejection(status.as_u16()));
        }

        match body {
            ResponseBody::Json(value @ (Value::Object(_) | Value::Array(_))) => Ok(value),
            _ => Err(ApiClientError::InvalidResponse),
        }
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn fetch_pending_jobs(
        &self,
        config: &AgentConfig,
    ) -> Result<PendingJobs, ApiClientError> {
        let body = self
            .request_json(config, Method::GET, &["api", "agent", "jobs"], None)
            .await?;
        Ok(parse_pending_jobs(body))
    }

    async fn update_job_status(
        &self,
        config: &AgentConfig,
        job_id: &JobId,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<Value, ApiClientError> {
        let update = StatusUpdate {
            status,
            error_message: error_message.filter(|m| !m.is_empty()),
        };
        self.request_json(
            config,
            Method::PATCH,
            &["api", "agent", "jobs", job_id.as_str()],
            Some(&update),
        )
        .await
    }
}

fn ensure_token(config: &AgentConfig) -> Result<&str, ConfigError> {
    let token = config.token.trim();
    if token.is_empty() {
        return Err(ConfigError::MissingToken);
    }
    Ok(token)
}

fn endpoint(api_url: &str, segments: &[&str]) -> Result<Url, ConfigError> {
    let base = normalize_api_url(api_url)?;
    let mut url = Url::parse(&base).map_err(|_| ConfigError::InvalidApiUrl)?;
    url.path_segments_mut()
        .map_err(|_| ConfigError::InvalidApiUrl)?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// A non-array `jobs` field yields an empty list; entries without a usable
/// `id` are skipped.
fn parse_pending_jobs(body: Value) -> PendingJobs {
    let jobs = match body.get("jobs") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match serde_json::from_value::<Job>(item.clone()) {
                Ok(job) => Some(job),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed job entry");
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    };

    let settings = body
        .get("settings")
        .cloned()
        .and_then(|s| serde_json::from_value::<ServerSettings>(s).ok())
        .unwrap_or_default();

    PendingJobs { jobs, settings }
}

/// Permissively parsed response body. Parse failures degrade to `Null` or
/// an empty string so the HTTP status is never masked.
#[derive(Debug)]
enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    async fn read(response: Response) -> Self {
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        if is_json {
            let value = match response.bytes().await {
                Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or(Value::Null),
                Err(_) => Value::Null,
            };
            ResponseBody::Json(value)
        } else {
            ResponseBody::Text(response.text().await.unwrap_or_default())
        }
    }

    fn into_rejection(self, status: u16) -> ApiClientError {
        let field = |value: &Value, key: &str| {
            value.get(key).and_then(Value::as_str).map(str::to_string)
        };

        match self {
            ResponseBody::Json(value) => ApiClientError::Rejected {
                status,
                error_code: field(&value, "errorCode"),
                current_status: field(&value, "currentStatus"),
                detail: field(&value, "error").unwrap_or_else(|| "Request failed".to_string()),
            },
            ResponseBody::Text(text) => ApiClientError::Rejected {
                status,
                error_code: None,
                current_status: None,
                detail: if text.is_empty() {
                    "Request failed".to_string()
                } else {
                    text
                },
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("API request timed out")]
    Timeout,

    #[error("API error {status}: {detail}")]
    Rejected {
        status: u16,
        error_code: Option<String>,
        current_status: Option<String>,
        detail: String,
    },

    #[error("API request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API response was not JSON")]
    InvalidResponse,
}

impl ApiClientError {
    /// Another agent (or an earlier partial run) already moved the job on.
    pub fn is_benign_claim_race(&self) -> bool {
        matches!(
            self,
            ApiClientError::Rejected { status: 409, error_code: Some(code), .. }
                if code == "already_claimed" || code == "invalid_transition"
        )
    }
}

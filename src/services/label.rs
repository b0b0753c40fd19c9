use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use uuid::Uuid;

/// Hard deadline for a label download.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20);

const FILE_PREFIX: &str = "print-agent-label";

/// Fetches a label payload into a transient local file.
///
/// The returned path is owned by the caller, which is responsible for
/// deleting it.
#[async_trait]
pub trait LabelSource: Send + Sync {
    async fn download_label(&self, url: &str) -> Result<PathBuf, LabelError>;
}

/// Artifact extension inferred from the label URL or response content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelExtension {
    Zpl,
    Epl,
    Png,
    Pdf,
    Bin,
}

impl LabelExtension {
    pub fn as_str(self) -> &'static str {
        match self {
            LabelExtension::Zpl => "zpl",
            LabelExtension::Epl => "epl",
            LabelExtension::Png => "png",
            LabelExtension::Pdf => "pdf",
            LabelExtension::Bin => "bin",
        }
    }

    /// URL path suffix takes precedence over the content type.
    pub fn infer(url_path: &str, content_type: &str) -> Self {
        let path = url_path.to_ascii_lowercase();
        let from_path = Path::new(&path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext {
                "zpl" => Some(LabelExtension::Zpl),
                "epl" | "epl2" => Some(LabelExtension::Epl),
                "png" => Some(LabelExtension::Png),
                "pdf" => Some(LabelExtension::Pdf),
                _ => None,
            });
        if let Some(ext) = from_path {
            return ext;
        }

        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("zpl") {
            LabelExtension::Zpl
        } else if content_type.contains("epl") {
            LabelExtension::Epl
        } else if content_type.contains("png") {
            LabelExtension::Png
        } else if content_type.contains("pdf") {
            LabelExtension::Pdf
        } else {
            LabelExtension::Bin
        }
    }

    /// Whether a local artifact path carries a printer-control-language suffix.
    pub fn is_raw_path(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("zpl") || ext.eq_ignore_ascii_case("epl"))
            .unwrap_or(false)
    }
}

/// HTTP label downloader writing into a temp directory.
pub struct HttpLabelFetcher {
    http: Client,
    temp_dir: PathBuf,
    timeout: Duration,
}

impl Default for HttpLabelFetcher {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl HttpLabelFetcher {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            http: Client::new(),
            temp_dir: temp_dir.into(),
            timeout: DOWNLOAD_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn artifact_path(&self, ext: LabelExtension) -> PathBuf {
        let suffix = Uuid::new_v4().simple().to_string();
        self.temp_dir.join(format!(
            "{}-{}-{}.{}",
            FILE_PREFIX,
            chrono::Utc::now().timestamp_millis(),
            &suffix[..8],
            ext.as_str()
        ))
    }
}

#[async_trait]
impl LabelSource for HttpLabelFetcher {
    async fn download_label(&self, url: &str) -> Result<PathBuf, LabelError> {
        let parsed = Url::parse(url.trim()).map_err(|_| LabelError::InvalidUrl)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LabelError::InvalidUrl);
        }

        let exchange = async {
            let response = self.http.get(parsed.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Ok(Err(status.as_u16()));
            }
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>(Ok((content_type, bytes)))
        };

        let (content_type, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| LabelError::Timeout)??
            .map_err(|status| LabelError::Download { status })?;

        let ext = LabelExtension::infer(parsed.path(), &content_type);
        let path = self.artifact_path(ext);
        tokio::fs::write(&path, &bytes).await?;

        tracing::debug!(
            path = %path.display(),
            bytes = bytes.len(),
            extension = ext.as_str(),
            "Label downloaded"
        );

        Ok(path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("Label URL is invalid")]
    InvalidUrl,

    #[error("Label download timed out")]
    Timeout,

    #[error("Download failed: {status}")]
    Download { status: u16 },

    #[error("Label download failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to write label file: {0}")]
    Io(#[from] std::io::Error),
}

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::models::job::LabelFormat;
use crate::services::label::LabelExtension;

/// Submits a local label artifact to a named printer.
#[async_trait]
pub trait LabelPrinter: Send + Sync {
    /// Print `artifact` and return the submission output.
    ///
    /// The artifact is deleted after the attempt whatever the outcome.
    async fn print_label(
        &self,
        artifact: &Path,
        printer_name: &str,
        format: LabelFormat,
    ) -> Result<String, PrintError>;
}

/// CUPS `lp` submission.
pub struct LpPrinter {
    command: String,
}

impl Default for LpPrinter {
    fn default() -> Self {
        Self::new("lp")
    }
}

impl LpPrinter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn submit(
        &self,
        artifact: &Path,
        printer_name: &str,
        raw: bool,
    ) -> Result<String, PrintError> {
        let output = Command::new(&self.command)
            .arg("-d")
            .arg(printer_name)
            .arg("-o")
            .arg(if raw { "raw" } else { "fit-to-page" })
            .arg(artifact)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(PrintError::Spawn)?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            return Ok(stdout.trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let detail = if !stderr.trim().is_empty() {
            stderr.trim().to_string()
        } else if !stdout.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            match output.status.code() {
                Some(code) => format!("{} exited with code {}", self.command, code),
                None => format!("{} terminated by signal", self.command),
            }
        };

        Err(PrintError::Failed {
            detail,
            exit_code: output.status.code(),
        })
    }
}

/// ZPL/EPL2 are sent untouched; everything else is fitted to the page.
pub fn is_raw_submission(artifact: &Path, format: LabelFormat) -> bool {
    LabelExtension::is_raw_path(artifact) || format.is_raw()
}

#[async_trait]
impl LabelPrinter for LpPrinter {
    async fn print_label(
        &self,
        artifact: &Path,
        printer_name: &str,
        format: LabelFormat,
    ) -> Result<String, PrintError> {
        let result = if printer_name.trim().is_empty() {
            Err(PrintError::NoPrinter)
        } else {
            let raw = is_raw_submission(artifact, format);
            tracing::debug!(
                printer = printer_name,
                path = %artifact.display(),
                raw,
                "Submitting label"
            );
            self.submit(artifact, printer_name, raw).await
        };

        if let Err(e) = tokio::fs::remove_file(artifact).await {
            tracing::debug!(path = %artifact.display(), error = %e, "Could not remove label file");
        }

        result
    }
}

/// Local printer enumeration through `lpstat`.
pub struct PrinterDirectory {
    command: String,
}

impl Default for PrinterDirectory {
    fn default() -> Self {
        Self::new("lpstat")
    }
}

impl PrinterDirectory {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Names of printers accepting jobs. Empty when lpstat is unavailable.
    pub async fn list_printers(&self) -> Vec<String> {
        match self.run("-a").await {
            Some(output) => parse_accepting(&output),
            None => Vec::new(),
        }
    }

    /// System default printer, if any.
    pub async fn default_printer(&self) -> Option<String> {
        self.run("-d").await.and_then(|output| parse_default(&output))
    }

    async fn run(&self, flag: &str) -> Option<String> {
        let output = Command::new(&self.command)
            .arg(flag)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn parse_accepting(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

fn parse_default(output: &str) -> Option<String> {
    let (_, name) = output.split_once(':')?;
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum PrintError {
    #[error("No printer configured")]
    NoPrinter,

    #[error("Print failed: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Print failed: {detail}")]
    Failed {
        detail: String,
        exit_code: Option<i32>,
    },
}

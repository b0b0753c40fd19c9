use std::process::Stdio;

use tokio::process::Command;

/// Best-effort desktop notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Logs every notification and, when configured, hands it to an external
/// command such as `notify-send <title> <body>`.
#[derive(Debug, Default)]
pub struct CommandNotifier {
    command: Option<String>,
}

impl CommandNotifier {
    pub fn new(command: Option<String>) -> Self {
        Self {
            command: command.filter(|c| !c.trim().is_empty()),
        }
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(title, body, "Notification");
        let Some(command) = &self.command else {
            return Ok(());
        };

        // Not awaited; the runtime reaps the child.
        Command::new(command)
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
            .map_err(NotifyError::Spawn)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to launch notifier: {0}")]
    Spawn(#[from] std::io::Error),
}

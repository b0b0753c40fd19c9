use std::path::PathBuf;
use std::sync::Arc;

use crate::services::{poller::AgentRuntime, printer::LabelPrinter, printer::PrinterDirectory};

/// Shared state passed to all status API handlers.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
    pub printers: Arc<PrinterDirectory>,
    pub printer: Arc<dyn LabelPrinter>,
    /// Where test pages are written before printing.
    pub temp_dir: PathBuf,
}

impl AppState {
    pub fn new(
        runtime: Arc<AgentRuntime>,
        printers: PrinterDirectory,
        printer: Arc<dyn LabelPrinter>,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            runtime,
            printers: Arc::new(printers),
            printer,
            temp_dir,
        }
    }
}

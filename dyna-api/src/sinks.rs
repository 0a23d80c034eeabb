use dyna_core::{
    DynaError, Result,
    report::{ReportSink, RunSummary},
};
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes the run summary as pretty printed JSON.
pub struct JsonReportSink {
    path: PathBuf,
}

impl JsonReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `summary.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("summary.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for JsonReportSink {
    fn report(&mut self, summary: &RunSummary) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json =
            serde_json::to_string_pretty(summary).map_err(|err| DynaError::Report(err.to_string()))?;
        std::fs::write(&self.path, json)?;
        info!(path = %self.path.display(), "wrote run summary");
        Ok(())
    }
}

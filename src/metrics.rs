use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::Path;

/// Prometheus recorder for a one-shot run. The binary renders it once at the
/// end into a textfile-collector file instead of serving `/metrics`.
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global recorder. Fails if another recorder is installed.
    pub fn init() -> Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        crate::ingest::ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Current exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the exposition text to `path` (temp sibling + rename, so a
    /// scraping collector never sees a half-written file).
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, self.render())
            .with_context(|| format!("writing metrics to {}", Path::new(&tmp).display()))?;
        fs::rename(&tmp, path).with_context(|| format!("moving metrics into {}", path.display()))?;
        Ok(())
    }
}

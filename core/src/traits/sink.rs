use crate::error::Result;
use crate::registry::{InstallRecord, TelemetryEvent};
use async_trait::async_trait;

/// Destination for best-effort install reports and telemetry.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn record_install(&self, plugin_slug: &str, record: &InstallRecord) -> Result<()>;

    async fn report_telemetry(&self, event: &TelemetryEvent) -> Result<()>;
}

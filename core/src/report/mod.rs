//! Best-effort reporting of install outcomes back to the registry.
//!
//! Reports are queued on an unbounded channel and drained by a background
//! task, so a slow or unreachable registry never delays installation.

use crate::install::{InstallStatus, InstallationSummary};
use crate::registry::{InstallRecord, TelemetryEvent};
use crate::traits::ReportSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
const INSTALL_EVENT: &str = "plugin_install";

enum ReportMessage {
    Install {
        plugin_slug: String,
        record: InstallRecord,
    },
    Telemetry(TelemetryEvent),
}

pub struct InstallationReporter {
    tx: Option<mpsc::UnboundedSender<ReportMessage>>,
    worker: Option<JoinHandle<()>>,
}

impl InstallationReporter {
    /// Starts the background worker. Must be called inside a tokio runtime.
    pub fn spawn(sink: Arc<dyn ReportSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ReportMessage>();

        let worker = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    ReportMessage::Install {
                        plugin_slug,
                        record,
                    } => {
                        if let Err(e) = sink.record_install(&plugin_slug, &record).await {
                            warn!(plugin = %plugin_slug, "Failed to record install: {}", e);
                        } else {
                            debug!(plugin = %plugin_slug, "Install recorded");
                        }
                    }
                    ReportMessage::Telemetry(event) => {
                        if let Err(e) = sink.report_telemetry(&event).await {
                            warn!(plugin = %event.plugin_slug, "Failed to send telemetry: {}", e);
                        }
                    }
                }
            }
        });

        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Queues the install record and a telemetry event for `summary`.
    /// Dry runs only emit telemetry.
    pub fn report(&self, summary: &InstallationSummary) {
        if !summary.dry_run {
            self.send(ReportMessage::Install {
                plugin_slug: summary.plugin_slug.clone(),
                record: install_record(summary),
            });
        }
        self.send(ReportMessage::Telemetry(telemetry_for(summary)));
    }

    pub fn report_telemetry(&self, event: TelemetryEvent) {
        self.send(ReportMessage::Telemetry(event));
    }

    fn send(&self, message: ReportMessage) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(message).is_err() {
            debug!("Report worker has stopped, dropping report");
        }
    }

    /// Closes the queue and waits up to `grace` for pending reports.
    /// Anything still in flight after that is abandoned.
    pub async fn shutdown(mut self, grace: Duration) {
        drop(self.tx.take());
        let Some(mut worker) = self.worker.take() else {
            return;
        };

        match tokio::time::timeout(grace, &mut worker).await {
            Ok(Ok(())) => debug!("Report queue flushed"),
            Ok(Err(e)) => warn!("Report worker failed: {}", e),
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Reports still pending at shutdown, abandoning"
                );
                worker.abort();
            }
        }
    }
}

pub fn install_record(summary: &InstallationSummary) -> InstallRecord {
    InstallRecord {
        plugin_slug: summary.plugin_slug.clone(),
        installed: summary.slugs_with(InstallStatus::Installed),
        skipped: summary.slugs_with(InstallStatus::Skipped),
        failed: summary.slugs_with(InstallStatus::Failed),
        signature_verified: !summary.verification_skipped(),
        client_version: CLIENT_VERSION.to_string(),
        installed_at: chrono::Utc::now().to_rfc3339(),
    }
}

pub fn telemetry_for(summary: &InstallationSummary) -> TelemetryEvent {
    TelemetryEvent {
        event: INSTALL_EVENT.to_string(),
        plugin_slug: summary.plugin_slug.clone(),
        skill_slug: None,
        success: summary.failed == 0,
        duration_ms: summary.elapsed.as_millis() as u64,
        dry_run: summary.dry_run,
        timestamp: chrono::Utc::now().to_rfc3339(),
        metadata: serde_json::json!({
            "installed": summary.installed,
            "skipped": summary.skipped,
            "failed": summary.failed,
            "signatureVerified": !summary.verification_skipped(),
            "clientVersion": CLIENT_VERSION,
        }),
    }
}

//! Best-effort report transport
//!
//! Reports are fire and forget: the buffers are already cleared by the time a
//! send is in flight, a failed send is logged and dropped, and the response
//! body is ignored. No retry, no backlog.

use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::models::Report;

/// Destination for generated reports.
///
/// `submit` must not block the caller; implementations hand the report off and
/// return immediately.
pub trait ReportSink: Send + Sync {
    fn submit(&self, report: Report);
}

/// Sink that discards every report. Useful when a host disables reporting.
pub struct NoopSink;

impl ReportSink for NoopSink {
    fn submit(&self, _report: Report) {}
}

/// POSTs reports as JSON to the configured endpoint from a spawned task.
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReporter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Reporter pointed at the configured endpoint.
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.reporting_endpoint.clone())
    }
}

impl ReportSink for HttpReporter {
    fn submit(&self, report: Report) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("no async runtime available; telemetry report dropped");
                return;
            }
        };

        handle.spawn(async move {
            match client.post(&endpoint).json(&report).send().await {
                Ok(response) => {
                    // Status is informational only; the report is gone either way.
                    if !response.status().is_success() {
                        warn!(
                            "telemetry endpoint returned {} for session {}",
                            response.status(),
                            report.session_id
                        );
                    } else {
                        debug!("telemetry report delivered ({})", report.session_id);
                    }
                }
                Err(e) => {
                    warn!("telemetry report failed: {e}");
                }
            }
        });
    }
}

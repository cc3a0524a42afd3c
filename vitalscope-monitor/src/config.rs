//! Monitor configuration

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Configuration for the performance monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Master switch for collection.
    pub enabled: bool,

    /// Fraction of sessions that collect telemetry (0..=1). The roll happens
    /// once at monitor construction and is fixed for the session.
    pub sample_rate: f64,

    /// Page-load alert target in milliseconds.
    pub page_load_target_ms: f64,

    /// API-response alert target in milliseconds.
    pub api_response_target_ms: f64,

    /// Escalate alerts for critical medical content to high priority.
    pub medical_content_priority: bool,

    /// Endpoint receiving batched reports.
    pub reporting_endpoint: String,

    /// Metric buffer capacity; reaching it triggers a send.
    pub buffer_size: usize,

    /// Whether batched reporting runs at all.
    pub batch_reporting_enabled: bool,

    /// Batch timer period in seconds.
    pub report_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 1.0,
            page_load_target_ms: 2000.0,
            api_response_target_ms: 200.0,
            medical_content_priority: true,
            reporting_endpoint: "/api/analytics/performance".to_string(),
            buffer_size: 100,
            batch_reporting_enabled: true,
            report_interval_secs: 30,
        }
    }
}

impl MonitorConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(MonitorError::Config(format!(
                "sample_rate must be within 0..=1, got {}",
                self.sample_rate
            )));
        }
        if self.buffer_size == 0 {
            return Err(MonitorError::Config("buffer_size must be > 0".to_string()));
        }
        if self.report_interval_secs == 0 {
            return Err(MonitorError::Config(
                "report_interval_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply a partial update, leaving unspecified fields untouched.
    ///
    /// Changing `sample_rate` does not re-roll the session's sampling gate.
    pub fn apply(&mut self, patch: MonitorConfigPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(sample_rate) = patch.sample_rate {
            self.sample_rate = sample_rate;
        }
        if let Some(target) = patch.page_load_target_ms {
            self.page_load_target_ms = target;
        }
        if let Some(target) = patch.api_response_target_ms {
            self.api_response_target_ms = target;
        }
        if let Some(priority) = patch.medical_content_priority {
            self.medical_content_priority = priority;
        }
        if let Some(endpoint) = patch.reporting_endpoint {
            self.reporting_endpoint = endpoint;
        }
        if let Some(size) = patch.buffer_size {
            self.buffer_size = size;
        }
        if let Some(batch) = patch.batch_reporting_enabled {
            self.batch_reporting_enabled = batch;
        }
        if let Some(interval) = patch.report_interval_secs {
            self.report_interval_secs = interval;
        }
    }
}

/// All-optional mirror of [`MonitorConfig`] for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfigPatch {
    pub enabled: Option<bool>,
    pub sample_rate: Option<f64>,
    pub page_load_target_ms: Option<f64>,
    pub api_response_target_ms: Option<f64>,
    pub medical_content_priority: Option<bool>,
    pub reporting_endpoint: Option<String>,
    pub buffer_size: Option<usize>,
    pub batch_reporting_enabled: Option<bool>,
    pub report_interval_secs: Option<u64>,
}

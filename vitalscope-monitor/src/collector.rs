//! Performance monitor
//!
//! Owns the in-memory metric/vital/error buffers, applies the rating engine at
//! record time and hands batched reports to the configured sink. Explicitly
//! constructed with an injected sink and an explicit start/stop lifecycle so
//! tests run isolated instances.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vitalscope_capability::{ConnectionType, DeviceProfile};

use crate::config::{MonitorConfig, MonitorConfigPatch};
use crate::error::{MonitorError, Result};
use crate::models::{
    Alert, AlertSeverity, ErrorRecord, Metric, MetricType, MetricUnit, Report, VitalName,
    VitalRating, WebVital,
};
use crate::observers::{
    classify_resource, is_image_url, ObserverEntry, ObserverHandle, ObserverKind,
    ObserverRegistry, ScrollDepthTracker, VisibleTimeTracker, SLOW_RESOURCE_THRESHOLD_MS,
};
use crate::rating::{evaluate_metric, evaluate_vital, rate_vital, FULL_PAGE_LOAD};
use crate::report::ReportSink;

/// Recent alerts kept for dashboard reads.
const ALERT_HISTORY: usize = 50;

/// On-demand aggregate over one named metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub count: usize,
    pub average: f64,
    pub median: f64,
    pub p95: f64,
}

struct MonitorInner {
    config: Mutex<MonitorConfig>,
    /// Sampling roll, fixed at construction for the session lifetime.
    sampled: bool,
    session_id: String,
    device: Option<DeviceProfile>,

    metrics: Mutex<Vec<Metric>>,
    vitals: Mutex<Vec<WebVital>>,
    errors: Mutex<Vec<ErrorRecord>>,
    alerts: Mutex<Vec<Alert>>,

    scroll: Mutex<ScrollDepthTracker>,
    visible: Mutex<VisibleTimeTracker>,

    sink: Arc<dyn ReportSink>,
    observer_tx: Mutex<UnboundedSender<ObserverEntry>>,
    observer_rx: Mutex<Option<UnboundedReceiver<ObserverEntry>>>,
    registry: Mutex<ObserverRegistry>,

    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: Mutex<bool>,
}

/// Continuous client-side performance monitor.
///
/// Cheap to clone; clones share the same buffers and lifecycle.
#[derive(Clone)]
pub struct PerformanceMonitor {
    inner: Arc<MonitorInner>,
}

impl PerformanceMonitor {
    /// Create a monitor. The sampling gate is rolled once here and never
    /// re-rolled, even when the config changes later.
    pub fn new(
        config: MonitorConfig,
        device: Option<DeviceProfile>,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self> {
        config.validate()?;

        let sampled = rand::thread_rng().gen::<f64>() < config.sample_rate;
        if !sampled {
            info!("telemetry sampling gate closed for this session");
        }

        let (observer_tx, observer_rx) = mpsc::unbounded_channel();

        Ok(Self {
            inner: Arc::new(MonitorInner {
                config: Mutex::new(config),
                sampled,
                session_id: Uuid::new_v4().to_string(),
                device,
                metrics: Mutex::new(Vec::new()),
                vitals: Mutex::new(Vec::new()),
                errors: Mutex::new(Vec::new()),
                alerts: Mutex::new(Vec::new()),
                scroll: Mutex::new(ScrollDepthTracker::default()),
                visible: Mutex::new(VisibleTimeTracker::default()),
                sink,
                observer_tx: Mutex::new(observer_tx),
                observer_rx: Mutex::new(Some(observer_rx)),
                registry: Mutex::new(ObserverRegistry::new()),
                tasks: Mutex::new(Vec::new()),
                running: Mutex::new(false),
            }),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Whether this session collects anything at all.
    pub fn is_active(&self) -> bool {
        self.inner.sampled && self.inner.config.lock().unwrap().enabled
    }

    /// Handle for platform observers (and tests) to push raw entries.
    ///
    /// Handles go stale across a stop/start cycle; re-fetch after `start`.
    pub fn observer_handle(&self) -> ObserverHandle {
        ObserverHandle::new(self.inner.observer_tx.lock().unwrap().clone())
    }

    /// Record whether the runtime supports an observer kind. Unsupported
    /// kinds are skipped with a warning; the rest keep working.
    pub fn register_observer(&self, kind: ObserverKind, supported: bool) -> bool {
        self.inner.registry.lock().unwrap().register(kind, supported)
    }

    /// Whether an observer kind was registered as supported.
    pub fn observer_active(&self, kind: ObserverKind) -> bool {
        self.inner.registry.lock().unwrap().is_active(kind)
    }

    // ── Recording surface ────────────────────────────────────────────

    /// Append a metric, rate it, and trigger sends on priority alerts or a
    /// full buffer. Lenient ingest: the value is stored as given.
    pub fn track_metric(&self, metric: Metric) {
        if !self.is_active() {
            return;
        }

        let (alert, buffer_size) = {
            let config = self.inner.config.lock().unwrap();
            (evaluate_metric(&metric, &config), config.buffer_size)
        };

        let buffer_full = {
            let mut metrics = self.inner.metrics.lock().unwrap();
            metrics.push(metric);
            metrics.len() >= buffer_size
        };

        let high = matches!(
            alert.as_ref().map(|a| a.severity),
            Some(AlertSeverity::High)
        );
        if let Some(alert) = alert {
            self.raise_alert(alert);
        }

        if high {
            self.flush("priority_alert");
        } else if buffer_full {
            self.flush("buffer_full");
        }
    }

    /// Append an error record.
    pub fn track_error(&self, record: ErrorRecord) {
        if !self.is_active() {
            return;
        }
        self.inner.errors.lock().unwrap().push(record);
    }

    /// Record a Web Vital observation. CLS accumulates into a single amended
    /// instance; other vitals append. A poor rating flushes immediately.
    pub fn record_web_vital(&self, name: VitalName, value: f64, critical: bool) {
        self.record_vital_entry(name, value, critical, None);
    }

    fn record_vital_entry(
        &self,
        name: VitalName,
        value: f64,
        critical: bool,
        entry: Option<serde_json::Value>,
    ) {
        if !self.is_active() {
            return;
        }

        let snapshot = {
            let mut vitals = self.inner.vitals.lock().unwrap();

            if name == VitalName::Cls {
                if let Some(vital) = vitals.iter_mut().find(|v| v.name == VitalName::Cls) {
                    vital.delta = value;
                    vital.value += value;
                    vital.rating = rate_vital(name, vital.value);
                    vital.is_critical_content |= critical;
                    if let Some(entry) = entry {
                        vital.entries.push(entry);
                    }
                    vital.clone()
                } else {
                    let vital = new_vital(name, value, critical, entry);
                    vitals.push(vital.clone());
                    vital
                }
            } else {
                let vital = new_vital(name, value, critical, entry);
                vitals.push(vital.clone());
                vital
            }
        };

        let alert = {
            let config = self.inner.config.lock().unwrap();
            evaluate_vital(&snapshot, &config)
        };
        if let Some(alert) = alert {
            self.raise_alert(alert);
        }

        if snapshot.rating == VitalRating::Poor {
            self.flush("poor_vital");
        }
    }

    /// Record a completed page load for a named page.
    pub fn track_page_load(&self, page: &str, load_time_ms: f64, critical: bool) {
        self.track_metric(
            Metric::new(MetricType::PageLoad, FULL_PAGE_LOAD, load_time_ms, MetricUnit::Ms)
                .critical(critical)
                .in_context(page),
        );
    }

    /// Record a completed API call against a named endpoint.
    pub fn track_api_response(&self, endpoint: &str, duration_ms: f64, critical: bool) {
        self.track_metric(
            Metric::new(MetricType::ApiResponse, "api_response", duration_ms, MetricUnit::Ms)
                .critical(critical)
                .at_url(endpoint),
        );
    }

    /// Record a user interaction duration.
    pub fn track_interaction(&self, name: &str, duration_ms: f64, critical: bool) {
        self.track_metric(
            Metric::new(MetricType::UserInteraction, name, duration_ms, MetricUnit::Ms)
                .critical(critical),
        );
    }

    /// Feed the ambient scroll-depth tracker (percentage of the page seen).
    pub fn record_scroll_depth(&self, percent: f64) {
        if !self.is_active() {
            return;
        }
        self.inner.scroll.lock().unwrap().record(percent);
    }

    /// Feed the ambient visible-time tracker.
    pub fn set_page_visible(&self, visible: bool) {
        if !self.is_active() {
            return;
        }
        self.inner.visible.lock().unwrap().set_visible(visible);
    }

    /// Page is going away: emit the ambient trackers once and flush.
    pub fn page_hidden(&self) {
        if !self.is_active() {
            return;
        }

        if let Some(depth) = self.inner.scroll.lock().unwrap().take() {
            self.track_metric(Metric::new(
                MetricType::UserInteraction,
                "max_scroll_depth",
                depth / 100.0,
                MetricUnit::Ratio,
            ));
        }

        let visible_ms = self.inner.visible.lock().unwrap().finish();
        self.track_metric(Metric::new(
            MetricType::UserInteraction,
            "time_visible",
            visible_ms,
            MetricUnit::Ms,
        ));

        self.flush("page_hidden");
    }

    // ── Observer fan-in ──────────────────────────────────────────────

    fn ingest_observer_entry(&self, entry: ObserverEntry) {
        match entry {
            ObserverEntry::Navigation {
                dns_ms,
                connect_ms,
                ttfb_ms,
                dom_interactive_ms,
                load_ms,
            } => {
                for (name, value) in [
                    ("dns_time", dns_ms),
                    ("connection_time", connect_ms),
                    ("server_response_time", ttfb_ms),
                    ("dom_interactive", dom_interactive_ms),
                ] {
                    self.track_metric(Metric::new(MetricType::PageLoad, name, value, MetricUnit::Ms));
                }
                self.track_metric(Metric::new(
                    MetricType::PageLoad,
                    FULL_PAGE_LOAD,
                    load_ms,
                    MetricUnit::Ms,
                ));
                self.record_web_vital(VitalName::Ttfb, ttfb_ms, false);
            }
            ObserverEntry::Resource {
                url,
                duration_ms,
                size_bytes,
            } => {
                let metric_type = classify_resource(&url);
                let name = if metric_type == MetricType::ApiResponse {
                    "api_response"
                } else if is_image_url(&url) {
                    "image_load"
                } else {
                    "resource_load"
                };

                let mut metric =
                    Metric::new(metric_type, name, duration_ms, MetricUnit::Ms).at_url(&url);
                metric
                    .metadata
                    .insert("size_bytes".to_string(), size_bytes.to_string());
                self.track_metric(metric);

                if duration_ms > SLOW_RESOURCE_THRESHOLD_MS {
                    self.track_metric(
                        Metric::new(
                            MetricType::ResourceTiming,
                            "slow_resource",
                            duration_ms,
                            MetricUnit::Ms,
                        )
                        .at_url(&url),
                    );
                }
            }
            ObserverEntry::LongTask { duration_ms } => {
                self.track_metric(Metric::new(
                    MetricType::UserInteraction,
                    "long_task",
                    duration_ms,
                    MetricUnit::Ms,
                ));
            }
            ObserverEntry::Paint { name, start_ms } => match name.as_str() {
                "first-contentful-paint" => self.record_web_vital(VitalName::Fcp, start_ms, false),
                "largest-contentful-paint" => {
                    self.record_web_vital(VitalName::Lcp, start_ms, false)
                }
                _ => {}
            },
            ObserverEntry::LayoutShift { value } => {
                self.record_vital_entry(VitalName::Cls, value, false, Some(json!({ "value": value })));
            }
            ObserverEntry::FirstInput { delay_ms } => {
                self.record_web_vital(VitalName::Fid, delay_ms, false);
            }
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the observer drain task and the batch timer.
    pub fn start(&self) -> Result<()> {
        {
            let mut running = self.inner.running.lock().unwrap();
            if *running {
                return Err(MonitorError::AlreadyRunning);
            }
            *running = true;
        }

        if !self.is_active() {
            // Gate closed: nothing to drain, nothing to report.
            return Ok(());
        }

        let mut rx = match self.inner.observer_rx.lock().unwrap().take() {
            Some(rx) => rx,
            None => {
                // The previous run's drain task consumed the receiver and
                // stop() dropped it with the task. Start a fresh channel and
                // swap the sender so new handles reach the new drain task.
                let (tx, rx) = mpsc::unbounded_channel();
                *self.inner.observer_tx.lock().unwrap() = tx;
                rx
            }
        };
        let monitor = self.clone();
        let drain = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                monitor.ingest_observer_entry(entry);
            }
        });
        self.inner.tasks.lock().unwrap().push(drain);

        let interval_secs = self.inner.config.lock().unwrap().report_interval_secs;
        let monitor = self.clone();
        let timer = tokio::spawn(async move {
            let period = std::time::Duration::from_secs(interval_secs);
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                if monitor.has_buffered_data() {
                    monitor.flush("interval");
                }
            }
        });
        self.inner.tasks.lock().unwrap().push(timer);

        debug!("performance monitor started (session {})", self.inner.session_id);
        Ok(())
    }

    /// Flush pending data and tear down the background tasks.
    pub fn stop(&self) -> Result<()> {
        {
            let mut running = self.inner.running.lock().unwrap();
            if !*running {
                return Err(MonitorError::NotStarted);
            }
            *running = false;
        }

        if self.has_buffered_data() {
            self.flush("stop");
        }

        for task in self.inner.tasks.lock().unwrap().drain(..) {
            task.abort();
        }

        debug!("performance monitor stopped (session {})", self.inner.session_id);
        Ok(())
    }

    // ── Aggregation & reporting ──────────────────────────────────────

    /// Build a report over the current buffers without clearing them.
    pub fn generate_report(&self) -> Report {
        let metrics = self.inner.metrics.lock().unwrap().clone();
        let vitals = self.inner.vitals.lock().unwrap().clone();
        let errors = self.inner.errors.lock().unwrap().clone();

        let mut partitioned: HashMap<MetricType, Vec<Metric>> = HashMap::new();
        let mut critical: HashMap<String, (f64, usize)> = HashMap::new();

        for metric in metrics {
            if metric.is_critical_content && metric.value.is_finite() {
                let entry = critical.entry(metric.name.clone()).or_insert((0.0, 0));
                entry.0 += metric.value;
                entry.1 += 1;
            }
            partitioned.entry(metric.metric_type).or_default().push(metric);
        }

        let critical_content_summary = critical
            .into_iter()
            .map(|(name, (sum, count))| (name, sum / count as f64))
            .collect();

        Report {
            session_id: self.inner.session_id.clone(),
            timestamp: Utc::now(),
            metrics: partitioned,
            vitals,
            errors,
            critical_content_summary,
            connection: self
                .inner
                .device
                .as_ref()
                .map(|d| d.capabilities.connection_type)
                .unwrap_or(ConnectionType::Unknown),
            device: self.inner.device.clone(),
        }
    }

    /// Best-effort send of everything buffered. The buffers are dropped
    /// unconditionally, before the network outcome is known.
    pub fn flush(&self, reason: &str) {
        let batching = self.inner.config.lock().unwrap().batch_reporting_enabled;
        if !batching {
            debug!("batch reporting disabled; dropping buffered telemetry ({reason})");
            self.clear_metrics();
            return;
        }

        let report = self.generate_report();
        self.clear_metrics();

        if report.is_empty() {
            return;
        }

        debug!("submitting telemetry report ({reason})");
        self.inner.sink.submit(report);
    }

    /// Per-name aggregates over the current metric buffer. Non-finite values
    /// are filtered here, not at ingest.
    pub fn aggregated_metrics(&self) -> HashMap<String, MetricSummary> {
        let metrics = self.inner.metrics.lock().unwrap();

        let mut by_name: HashMap<String, Vec<f64>> = HashMap::new();
        for metric in metrics.iter() {
            if metric.value.is_finite() {
                by_name.entry(metric.name.clone()).or_default().push(metric.value);
            }
        }

        by_name
            .into_iter()
            .map(|(name, mut values)| {
                values.sort_by(f64::total_cmp);
                let count = values.len();
                let average = values.iter().sum::<f64>() / count as f64;
                let median = values[count / 2];
                let p95_idx = (count as f64 * 0.95) as usize;
                let p95 = values[p95_idx.min(count - 1)];
                (name, MetricSummary { count, average, median, p95 })
            })
            .collect()
    }

    /// Explicit reset of every buffer.
    pub fn clear_metrics(&self) {
        self.inner.metrics.lock().unwrap().clear();
        self.inner.vitals.lock().unwrap().clear();
        self.inner.errors.lock().unwrap().clear();
    }

    /// Alerts raised this session, most recent last.
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.inner.alerts.lock().unwrap().clone()
    }

    pub fn config(&self) -> MonitorConfig {
        self.inner.config.lock().unwrap().clone()
    }

    /// Apply a partial config update. The patched result is validated before
    /// it takes effect; the sampling roll is not repeated.
    pub fn update_config(&self, patch: MonitorConfigPatch) -> Result<()> {
        let mut config = self.inner.config.lock().unwrap();
        let mut updated = config.clone();
        updated.apply(patch);
        updated.validate()?;
        *config = updated;
        Ok(())
    }

    /// Number of metrics currently buffered.
    pub fn buffered_metric_count(&self) -> usize {
        self.inner.metrics.lock().unwrap().len()
    }

    fn has_buffered_data(&self) -> bool {
        !self.inner.metrics.lock().unwrap().is_empty()
            || !self.inner.vitals.lock().unwrap().is_empty()
            || !self.inner.errors.lock().unwrap().is_empty()
    }

    fn raise_alert(&self, alert: Alert) {
        warn!(
            "performance alert {} ({:?}): {:.1} over target {:.1}",
            alert.name, alert.severity, alert.value, alert.target
        );

        let mut alerts = self.inner.alerts.lock().unwrap();
        if alerts.len() >= ALERT_HISTORY {
            alerts.remove(0);
        }
        alerts.push(alert);
    }
}

fn new_vital(
    name: VitalName,
    value: f64,
    critical: bool,
    entry: Option<serde_json::Value>,
) -> WebVital {
    WebVital {
        name,
        value,
        rating: rate_vital(name, value),
        delta: value,
        id: Uuid::new_v4().to_string(),
        is_critical_content: critical,
        entries: entry.into_iter().collect(),
    }
}

//! VitalScope Performance Monitor
//!
//! Session-scoped collection of performance metrics, Web Vitals and runtime
//! errors, with threshold alerting and best-effort batched reporting.
//!
//! The monitor is constructed once per session with a [`MonitorConfig`] and a
//! [`ReportSink`]; platform observers feed it through an [`ObserverHandle`].

pub mod collector;
pub mod config;
pub mod error;
pub mod models;
pub mod observers;
pub mod rating;
pub mod report;

pub use collector::{MetricSummary, PerformanceMonitor};
pub use config::{MonitorConfig, MonitorConfigPatch};
pub use error::{MonitorError, Result};
pub use models::{
    Alert, AlertSeverity, ErrorKind, ErrorRecord, Metric, MetricType, MetricUnit, Report,
    VitalName, VitalRating, WebVital,
};
pub use observers::{ObserverEntry, ObserverHandle, ObserverKind, ObserverRegistry};
pub use rating::{evaluate_metric, evaluate_vital, rate_vital};
pub use report::{HttpReporter, NoopSink, ReportSink};

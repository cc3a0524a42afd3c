//! Data models for collected telemetry

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vitalscope_capability::{ConnectionType, DeviceProfile};

/// Category of a collected metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    PageLoad,
    ApiResponse,
    UserInteraction,
    ResourceTiming,
    Vital,
}

/// Unit of a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricUnit {
    Ms,
    Bytes,
    Count,
    Ratio,
}

/// A single collected performance signal.
///
/// Ingest is lenient: values are stored as given (including NaN or negative
/// durations); aggregation filters on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub id: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub name: String,
    pub value: f64,
    pub unit: MetricUnit,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub is_critical_content: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_context: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Metric {
    pub fn new(metric_type: MetricType, name: impl Into<String>, value: f64, unit: MetricUnit) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            metric_type,
            name: name.into(),
            value,
            unit,
            timestamp: Utc::now(),
            url: String::new(),
            is_critical_content: false,
            domain_context: None,
            metadata: HashMap::new(),
        }
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.is_critical_content = critical;
        self
    }

    pub fn at_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn in_context(mut self, context: impl Into<String>) -> Self {
        self.domain_context = Some(context.into());
        self
    }
}

/// Standardized browser performance vital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VitalName {
    Cls,
    Fid,
    Fcp,
    Lcp,
    Ttfb,
    Inp,
}

impl VitalName {
    pub fn as_str(&self) -> &'static str {
        match self {
            VitalName::Cls => "CLS",
            VitalName::Fid => "FID",
            VitalName::Fcp => "FCP",
            VitalName::Lcp => "LCP",
            VitalName::Ttfb => "TTFB",
            VitalName::Inp => "INP",
        }
    }
}

impl std::fmt::Display for VitalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Published rating buckets for a vital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VitalRating {
    #[serde(rename = "good")]
    Good,
    #[serde(rename = "needs-improvement")]
    NeedsImprovement,
    #[serde(rename = "poor")]
    Poor,
}

/// One observed Web Vital. Cumulative vitals (CLS) are amended in place as new
/// entries arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebVital {
    pub name: VitalName,
    pub value: f64,
    pub rating: VitalRating,
    pub delta: f64,
    pub id: String,
    pub is_critical_content: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<serde_json::Value>,
}

/// Kind of a captured error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Javascript,
    Network,
    Resource,
    DomainSpecific,
}

/// A captured runtime error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub is_critical_content: bool,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: source.into(),
            stack: None,
            timestamp: Utc::now(),
            url: String::new(),
            is_critical_content: false,
        }
    }
}

/// Alert priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    High,
}

/// A threshold breach surfaced to the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub name: String,
    pub severity: AlertSeverity,
    pub value: f64,
    pub target: f64,
    pub is_critical_content: bool,
}

/// Transmission unit sent to the reporting endpoint. Fire and forget; never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: HashMap<MetricType, Vec<Metric>>,
    pub vitals: Vec<WebVital>,
    pub errors: Vec<ErrorRecord>,
    /// Critical-content rollups: metric name to average value.
    pub critical_content_summary: HashMap<String, f64>,
    pub connection: ConnectionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceProfile>,
}

impl Report {
    /// True when there is nothing worth transmitting.
    pub fn is_empty(&self) -> bool {
        self.metrics.values().all(|v| v.is_empty())
            && self.vitals.is_empty()
            && self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_serialization_shape() {
        let metric = Metric::new(MetricType::PageLoad, "full_page_load", 1234.5, MetricUnit::Ms)
            .critical(true)
            .in_context("intake_form");

        let json = serde_json::to_string(&metric).unwrap();
        assert!(json.contains("\"type\":\"page_load\""));
        assert!(json.contains("\"isCriticalContent\":true"));
        assert!(json.contains("\"domainContext\":\"intake_form\""));
        // Empty metadata map is omitted from the wire shape.
        assert!(!json.contains("metadata"));
    }

    #[test]
    fn test_vital_rating_wire_names() {
        assert_eq!(
            serde_json::to_string(&VitalRating::NeedsImprovement).unwrap(),
            "\"needs-improvement\""
        );
        assert_eq!(serde_json::to_string(&VitalName::Lcp).unwrap(), "\"LCP\"");
    }

    #[test]
    fn test_report_round_trip_with_typed_keys() {
        let mut metrics = HashMap::new();
        metrics.insert(
            MetricType::ApiResponse,
            vec![Metric::new(MetricType::ApiResponse, "api_response", 87.0, MetricUnit::Ms)],
        );

        let report = Report {
            session_id: "s-1".to_string(),
            timestamp: Utc::now(),
            metrics,
            vitals: vec![],
            errors: vec![],
            critical_content_summary: HashMap::new(),
            connection: ConnectionType::FourG,
            device: None,
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"api_response\""));
        let back: Report = serde_json::from_str(&json).unwrap();
        assert!(!back.is_empty());
        assert_eq!(back.metrics[&MetricType::ApiResponse].len(), 1);
    }
}

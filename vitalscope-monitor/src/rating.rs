//! Rating & alert engine
//!
//! Pure classification applied at the moment a metric or vital is recorded.

use crate::config::MonitorConfig;
use crate::models::{Alert, AlertSeverity, Metric, MetricType, VitalName, VitalRating, WebVital};

/// Metric name that the page-load target applies to.
pub const FULL_PAGE_LOAD: &str = "full_page_load";

/// Rate a vital against its published thresholds.
///
/// Boundary-inclusive on the good side: a value exactly at the first boundary
/// is still good. Vitals without a wired threshold rate good (conservative
/// no-op).
pub fn rate_vital(name: VitalName, value: f64) -> VitalRating {
    let (good, poor) = match name {
        VitalName::Cls => (0.1, 0.25),
        VitalName::Fid => (100.0, 300.0),
        VitalName::Fcp => (1800.0, 3000.0),
        VitalName::Lcp => (2500.0, 4000.0),
        VitalName::Ttfb => (800.0, 1800.0),
        VitalName::Inp => return VitalRating::Good,
    };

    if value <= good {
        VitalRating::Good
    } else if value <= poor {
        VitalRating::NeedsImprovement
    } else {
        VitalRating::Poor
    }
}

/// Check a metric against the configured targets.
pub fn evaluate_metric(metric: &Metric, config: &MonitorConfig) -> Option<Alert> {
    let (name, target) = if metric.name == FULL_PAGE_LOAD {
        ("page_load_slow", config.page_load_target_ms)
    } else if metric.metric_type == MetricType::ApiResponse {
        ("api_response_slow", config.api_response_target_ms)
    } else {
        return None;
    };

    // Negated comparison so NaN values never alert.
    if !(metric.value > target) {
        return None;
    }

    Some(Alert {
        name: name.to_string(),
        severity: severity_for(metric.is_critical_content, config),
        value: metric.value,
        target,
        is_critical_content: metric.is_critical_content,
    })
}

/// Check a recorded vital; only poor ratings alert.
pub fn evaluate_vital(vital: &WebVital, config: &MonitorConfig) -> Option<Alert> {
    if vital.rating != VitalRating::Poor {
        return None;
    }

    Some(Alert {
        name: format!("{}_poor", vital.name.as_str().to_ascii_lowercase()),
        severity: severity_for(vital.is_critical_content, config),
        value: vital.value,
        target: 0.0,
        is_critical_content: vital.is_critical_content,
    })
}

fn severity_for(critical: bool, config: &MonitorConfig) -> AlertSeverity {
    if critical && config.medical_content_priority {
        AlertSeverity::High
    } else {
        AlertSeverity::Warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricUnit;

    #[test]
    fn test_lcp_boundaries() {
        assert_eq!(rate_vital(VitalName::Lcp, 2500.0), VitalRating::Good);
        assert_eq!(
            rate_vital(VitalName::Lcp, 2501.0),
            VitalRating::NeedsImprovement
        );
        assert_eq!(
            rate_vital(VitalName::Lcp, 4000.0),
            VitalRating::NeedsImprovement
        );
        assert_eq!(rate_vital(VitalName::Lcp, 4001.0), VitalRating::Poor);
    }

    #[test]
    fn test_cls_thresholds() {
        assert_eq!(rate_vital(VitalName::Cls, 0.05), VitalRating::Good);
        assert_eq!(rate_vital(VitalName::Cls, 0.1), VitalRating::Good);
        assert_eq!(
            rate_vital(VitalName::Cls, 0.2),
            VitalRating::NeedsImprovement
        );
        assert_eq!(rate_vital(VitalName::Cls, 0.3), VitalRating::Poor);
    }

    #[test]
    fn test_remaining_vital_thresholds() {
        assert_eq!(rate_vital(VitalName::Fid, 100.0), VitalRating::Good);
        assert_eq!(rate_vital(VitalName::Fid, 301.0), VitalRating::Poor);
        assert_eq!(rate_vital(VitalName::Fcp, 1800.0), VitalRating::Good);
        assert_eq!(rate_vital(VitalName::Ttfb, 1801.0), VitalRating::Poor);
    }

    #[test]
    fn test_unwired_vital_rates_good() {
        assert_eq!(rate_vital(VitalName::Inp, 100_000.0), VitalRating::Good);
    }

    #[test]
    fn test_page_load_alert_fires_over_target() {
        let config = MonitorConfig::default();
        let metric = Metric::new(MetricType::PageLoad, FULL_PAGE_LOAD, 5000.0, MetricUnit::Ms)
            .critical(true);

        let alert = evaluate_metric(&metric, &config).unwrap();
        assert_eq!(alert.name, "page_load_slow");
        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.target, 2000.0);
    }

    #[test]
    fn test_page_load_at_target_does_not_alert() {
        let config = MonitorConfig::default();
        let metric = Metric::new(MetricType::PageLoad, FULL_PAGE_LOAD, 2000.0, MetricUnit::Ms);
        assert!(evaluate_metric(&metric, &config).is_none());
    }

    #[test]
    fn test_api_alert_severity_without_priority_flag() {
        let mut config = MonitorConfig::default();
        config.medical_content_priority = false;

        let metric = Metric::new(MetricType::ApiResponse, "api_response", 450.0, MetricUnit::Ms)
            .critical(true);

        let alert = evaluate_metric(&metric, &config).unwrap();
        assert_eq!(alert.name, "api_response_slow");
        assert_eq!(alert.severity, AlertSeverity::Warning);
    }

    #[test]
    fn test_non_target_metric_never_alerts() {
        let config = MonitorConfig::default();
        let metric = Metric::new(
            MetricType::UserInteraction,
            "long_task",
            99_999.0,
            MetricUnit::Ms,
        );
        assert!(evaluate_metric(&metric, &config).is_none());
    }
}

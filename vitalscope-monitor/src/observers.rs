//! Platform observer fan-in
//!
//! Each platform observer pushes entries onto one unbounded channel that the
//! monitor drains from a single task, so buffer mutation stays single-writer.
//! Observers can be driven synthetically in tests by pushing entries onto the
//! same handle.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::models::MetricType;

/// Resource loads slower than this emit an extra `slow_resource` metric (ms).
pub const SLOW_RESOURCE_THRESHOLD_MS: f64 = 1000.0;

/// Raw entry emitted by a platform observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverEntry {
    /// Navigation timing breakdown for the initial document load.
    Navigation {
        dns_ms: f64,
        connect_ms: f64,
        ttfb_ms: f64,
        dom_interactive_ms: f64,
        load_ms: f64,
    },
    /// A completed resource fetch.
    Resource {
        url: String,
        duration_ms: f64,
        size_bytes: u64,
    },
    /// A main-thread task over the long-task threshold.
    LongTask { duration_ms: f64 },
    /// A paint timing entry.
    Paint { name: String, start_ms: f64 },
    /// An unexpected layout shift (cumulative).
    LayoutShift { value: f64 },
    /// First input delay.
    FirstInput { delay_ms: f64 },
}

/// Observer categories the host may register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverKind {
    Navigation,
    Resource,
    LongTask,
    Paint,
    LayoutShift,
    FirstInput,
}

/// Sending side of the observer channel, cloned into each observer callback.
#[derive(Clone)]
pub struct ObserverHandle {
    tx: UnboundedSender<ObserverEntry>,
}

impl ObserverHandle {
    pub(crate) fn new(tx: UnboundedSender<ObserverEntry>) -> Self {
        Self { tx }
    }

    /// Push an entry; dropped with a warning once the monitor is stopped.
    pub fn push(&self, entry: ObserverEntry) {
        if self.tx.send(entry).is_err() {
            warn!("observer channel closed; entry dropped");
        }
    }
}

/// Tracks which observers the current runtime actually supports.
///
/// Registration failures are isolated: an unsupported kind is skipped with a
/// warning and the rest keep working.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    active: Vec<ObserverKind>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one observer kind. `supported` reflects whether the runtime
    /// exposes this entry type.
    pub fn register(&mut self, kind: ObserverKind, supported: bool) -> bool {
        if !supported {
            warn!("observer {kind:?} unsupported in this runtime; skipping");
            return false;
        }
        if !self.active.contains(&kind) {
            self.active.push(kind);
        }
        true
    }

    pub fn is_active(&self, kind: ObserverKind) -> bool {
        self.active.contains(&kind)
    }
}

/// Classify a resource URL into the metric type it reports as.
pub(crate) fn classify_resource(url: &str) -> MetricType {
    if is_api_url(url) {
        MetricType::ApiResponse
    } else {
        MetricType::ResourceTiming
    }
}

pub(crate) fn is_api_url(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    url.contains("/api/") || url.contains("/v1/") || url.contains("graphql")
}

pub(crate) fn is_image_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    ["png", "jpg", "jpeg", "gif", "webp", "svg", "avif"]
        .iter()
        .any(|ext| path.ends_with(&format!(".{ext}")))
}

/// Maximum scroll percentage seen this page view; reported once at page hide.
#[derive(Debug, Default)]
pub struct ScrollDepthTracker {
    max_percent: Option<f64>,
}

impl ScrollDepthTracker {
    pub fn record(&mut self, percent: f64) {
        if !percent.is_finite() {
            return;
        }
        let clamped = percent.clamp(0.0, 100.0);
        self.max_percent = Some(self.max_percent.map_or(clamped, |m: f64| m.max(clamped)));
    }

    /// Consume the tracked maximum; `None` when nothing was recorded.
    pub fn take(&mut self) -> Option<f64> {
        self.max_percent.take()
    }
}

/// Time the page spent visible, accumulated across visibility toggles.
#[derive(Debug)]
pub struct VisibleTimeTracker {
    visible_since: Option<Instant>,
    accumulated: Duration,
}

impl Default for VisibleTimeTracker {
    fn default() -> Self {
        // Pages start visible.
        Self {
            visible_since: Some(Instant::now()),
            accumulated: Duration::ZERO,
        }
    }
}

impl VisibleTimeTracker {
    pub fn set_visible(&mut self, visible: bool) {
        match (visible, self.visible_since) {
            (true, None) => self.visible_since = Some(Instant::now()),
            (false, Some(since)) => {
                self.accumulated += since.elapsed();
                self.visible_since = None;
            }
            _ => {}
        }
    }

    /// Close any open span and return the total visible time in milliseconds.
    pub fn finish(&mut self) -> f64 {
        self.set_visible(false);
        self.accumulated.as_secs_f64() * 1000.0
    }
}

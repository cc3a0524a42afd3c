//! GPU tier heuristic
//!
//! Classifies driver-reported renderer strings by substring rules. The tables
//! are deliberately behind one function so they can be extended without
//! touching the mode decision engine.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::platform::{Platform, ProbeError};

/// Relative GPU strength derived from the renderer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuTier {
    High,
    Medium,
    Low,
    Unknown,
}

impl std::fmt::Display for GpuTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuTier::High => write!(f, "high"),
            GpuTier::Medium => write!(f, "medium"),
            GpuTier::Low => write!(f, "low"),
            GpuTier::Unknown => write!(f, "unknown"),
        }
    }
}

/// Discrete desktop GPU families.
const HIGH_PATTERNS: &[&str] = &[
    "nvidia",
    "geforce",
    "rtx",
    "gtx",
    "radeon rx",
    "radeon pro",
    "quadro",
    "titan",
];

/// Integrated and software renderers.
const LOW_PATTERNS: &[&str] = &[
    "intel",
    "hd graphics",
    "uhd graphics",
    "iris",
    "swiftshader",
    "llvmpipe",
    "softpipe",
    "videocore",
];

/// Mobile tile-based GPU families.
const MEDIUM_PATTERNS: &[&str] = &["apple", "adreno", "mali", "powervr"];

/// Classify a renderer identifier string into a tier.
///
/// Ordered: discrete desktop families win over integrated patterns, which win
/// over mobile families. An unrecognized string from a live context is treated
/// as mid-range rather than penalized.
pub fn classify_renderer(renderer: &str) -> GpuTier {
    let renderer = renderer.to_ascii_lowercase();

    if HIGH_PATTERNS.iter().any(|p| renderer.contains(p)) {
        return GpuTier::High;
    }
    if LOW_PATTERNS.iter().any(|p| renderer.contains(p)) {
        return GpuTier::Low;
    }
    if MEDIUM_PATTERNS.iter().any(|p| renderer.contains(p)) {
        return GpuTier::Medium;
    }

    GpuTier::Medium
}

/// Probe the platform's graphics context and classify it.
///
/// Returns the tier plus whether a context could be created at all. Context
/// creation failure classifies as `Low`; a probe exception as `Unknown`.
pub(crate) fn probe_gpu(platform: &dyn Platform) -> (GpuTier, bool) {
    match platform.graphics_renderer() {
        Ok(Some(renderer)) => (classify_renderer(&renderer), true),
        Ok(None) => (GpuTier::Low, false),
        Err(ProbeError::Graphics(msg)) => {
            warn!("GPU probe failed: {msg}");
            (GpuTier::Unknown, false)
        }
    }
}

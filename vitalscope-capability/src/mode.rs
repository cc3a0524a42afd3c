//! Mode decision engine
//!
//! Pure mapping from a capability snapshot to a performance mode. Rule order
//! is load-bearing: any single weak signal forces lite before full is even
//! considered, so a reduced-motion user on strong hardware still gets lite.

use serde::{Deserialize, Serialize};

use crate::gpu::GpuTier;
use crate::platform::ConnectionType;
use crate::probe::CapabilitySnapshot;

/// Experience tier derived from the capability snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    Full,
    Balanced,
    Lite,
}

impl std::fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PerformanceMode::Full => write!(f, "full"),
            PerformanceMode::Balanced => write!(f, "balanced"),
            PerformanceMode::Lite => write!(f, "lite"),
        }
    }
}

impl PerformanceMode {
    /// Parse a persisted mode string.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "full" => Some(PerformanceMode::Full),
            "balanced" => Some(PerformanceMode::Balanced),
            "lite" => Some(PerformanceMode::Lite),
            _ => None,
        }
    }
}

/// Decide the performance mode for a snapshot. First match wins.
pub fn decide(snapshot: &CapabilitySnapshot) -> PerformanceMode {
    // Rule 1: any single weak signal degrades rather than risk jank.
    if snapshot.cpu_cores <= 2
        || snapshot.device_memory_gb < 2.0
        || matches!(
            snapshot.connection_type,
            ConnectionType::TwoG | ConnectionType::Slow2G
        )
        || snapshot.gpu_tier == GpuTier::Low
        || snapshot.prefers_reduced_motion
    {
        return PerformanceMode::Lite;
    }

    // Rule 2: full requires unanimous strength.
    if snapshot.cpu_cores >= 4
        && snapshot.device_memory_gb >= 4.0
        && snapshot.gpu_tier == GpuTier::High
        && matches!(
            snapshot.connection_type,
            ConnectionType::FourG | ConnectionType::Unknown
        )
    {
        return PerformanceMode::Full;
    }

    // Everything mid-range lands here.
    PerformanceMode::Balanced
}

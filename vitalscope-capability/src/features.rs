//! Feature gating matrix
//!
//! Exhaustive {feature} x {mode} table. The match is total, so every feature
//! has a defined answer for every mode by construction.

use serde::{Deserialize, Serialize};

use crate::mode::PerformanceMode;

/// Optional UI capabilities gated by the performance mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    Animations,
    RealTimeUpdates,
    HighQualityImages,
    BackgroundProcesses,
    ComplexTransitions,
}

/// Whether a feature is enabled under a mode.
pub fn is_feature_enabled(feature: Feature, mode: PerformanceMode) -> bool {
    match (mode, feature) {
        (PerformanceMode::Lite, _) => false,
        (PerformanceMode::Full, _) => true,

        (PerformanceMode::Balanced, Feature::Animations) => true,
        (PerformanceMode::Balanced, Feature::RealTimeUpdates) => true,
        (PerformanceMode::Balanced, Feature::HighQualityImages) => false,
        (PerformanceMode::Balanced, Feature::BackgroundProcesses) => false,
        (PerformanceMode::Balanced, Feature::ComplexTransitions) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_FEATURES: [Feature; 5] = [
        Feature::Animations,
        Feature::RealTimeUpdates,
        Feature::HighQualityImages,
        Feature::BackgroundProcesses,
        Feature::ComplexTransitions,
    ];

    #[test]
    fn test_lite_disables_everything() {
        for feature in ALL_FEATURES {
            assert!(!is_feature_enabled(feature, PerformanceMode::Lite));
        }
    }

    #[test]
    fn test_full_enables_everything() {
        for feature in ALL_FEATURES {
            assert!(is_feature_enabled(feature, PerformanceMode::Full));
        }
    }

    #[test]
    fn test_balanced_keeps_lightweight_features_only() {
        assert!(is_feature_enabled(Feature::Animations, PerformanceMode::Balanced));
        assert!(is_feature_enabled(Feature::RealTimeUpdates, PerformanceMode::Balanced));
        assert!(!is_feature_enabled(Feature::HighQualityImages, PerformanceMode::Balanced));
        assert!(!is_feature_enabled(Feature::BackgroundProcesses, PerformanceMode::Balanced));
        assert!(!is_feature_enabled(Feature::ComplexTransitions, PerformanceMode::Balanced));
    }
}

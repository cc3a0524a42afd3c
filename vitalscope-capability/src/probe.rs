//! One-shot capability detection
//!
//! Reads raw platform signals once and assembles an immutable
//! [`CapabilitySnapshot`]. Missing signals fall back to conservative defaults;
//! the device id is read-before-write so it stays stable across detections.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::gpu::{probe_gpu, GpuTier};
use crate::platform::{ConnectionType, Platform};
use crate::store::{KvStore, KEY_DEVICE_ID};

/// CPU core count assumed when the platform reports nothing usable.
const DEFAULT_CPU_CORES: u32 = 2;

/// Device memory (GB) assumed when the platform reports nothing usable.
const DEFAULT_MEMORY_GB: f64 = 2.0;

/// Immutable description of the running device, computed once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySnapshot {
    pub device_id: String,
    pub cpu_cores: u32,
    pub device_memory_gb: f64,
    pub gpu_tier: GpuTier,
    pub connection_type: ConnectionType,
    pub prefers_reduced_motion: bool,
    pub supports_graphics_context: bool,
}

/// Detect the device's capabilities.
///
/// Synchronous; the only I/O is the device-id read-before-write through the
/// store and the one-time graphics context probe.
pub fn detect(platform: &dyn Platform, store: &KvStore) -> CapabilitySnapshot {
    let device_id = stable_device_id(store);

    let cpu_cores = platform
        .hardware_concurrency()
        .filter(|&c| c > 0)
        .unwrap_or(DEFAULT_CPU_CORES);

    let device_memory_gb = platform
        .device_memory_gb()
        .filter(|&m| m > 0.0)
        .unwrap_or(DEFAULT_MEMORY_GB);

    let (gpu_tier, supports_graphics_context) = probe_gpu(platform);

    let snapshot = CapabilitySnapshot {
        device_id,
        cpu_cores,
        device_memory_gb,
        gpu_tier,
        connection_type: platform.connection_type(),
        prefers_reduced_motion: platform.prefers_reduced_motion(),
        supports_graphics_context,
    };

    debug!(
        "detected capabilities: {} cores, {:.1} GB, gpu {}, network {}",
        snapshot.cpu_cores, snapshot.device_memory_gb, snapshot.gpu_tier, snapshot.connection_type
    );

    snapshot
}

/// Return the persisted device id, generating and persisting one on first use.
fn stable_device_id(store: &KvStore) -> String {
    if let Some(id) = store.get(KEY_DEVICE_ID) {
        return id;
    }

    let suffix: u32 = rand::thread_rng().gen_range(0..0x0100_0000);
    let id = format!("{}-{:06x}", Utc::now().timestamp_millis(), suffix);

    if let Err(e) = store.set(KEY_DEVICE_ID, &id) {
        warn!("failed to persist device id: {e}");
    }

    id
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::platform::ProbeError;
    use tempfile::TempDir;

    /// Synthetic device used across the capability tests.
    pub(crate) struct FakePlatform {
        pub cores: Option<u32>,
        pub memory_gb: Option<f64>,
        pub connection: ConnectionType,
        pub reduced_motion: bool,
        pub renderer: Result<Option<String>, String>,
    }

    impl Default for FakePlatform {
        fn default() -> Self {
            Self {
                cores: Some(8),
                memory_gb: Some(16.0),
                connection: ConnectionType::FourG,
                reduced_motion: false,
                renderer: Ok(Some("NVIDIA GeForce RTX 3070".to_string())),
            }
        }
    }

    impl Platform for FakePlatform {
        fn hardware_concurrency(&self) -> Option<u32> {
            self.cores
        }

        fn device_memory_gb(&self) -> Option<f64> {
            self.memory_gb
        }

        fn connection_type(&self) -> ConnectionType {
            self.connection
        }

        fn prefers_reduced_motion(&self) -> bool {
            self.reduced_motion
        }

        fn graphics_renderer(&self) -> Result<Option<String>, ProbeError> {
            self.renderer
                .clone()
                .map_err(ProbeError::Graphics)
        }
    }

    fn temp_store() -> (TempDir, KvStore) {
        let dir = TempDir::new().unwrap();
        let store = KvStore::open(dir.path().join("telemetry.json"));
        (dir, store)
    }

    #[test]
    fn test_detect_uses_defaults_for_missing_signals() {
        let (_dir, store) = temp_store();
        let platform = FakePlatform {
            cores: None,
            memory_gb: None,
            connection: ConnectionType::Unknown,
            renderer: Ok(None),
            ..FakePlatform::default()
        };

        let snapshot = detect(&platform, &store);
        assert_eq!(snapshot.cpu_cores, 2);
        assert_eq!(snapshot.device_memory_gb, 2.0);
        assert_eq!(snapshot.gpu_tier, GpuTier::Low);
        assert!(!snapshot.supports_graphics_context);
    }

    #[test]
    fn test_detect_zero_cores_treated_as_missing() {
        let (_dir, store) = temp_store();
        let platform = FakePlatform {
            cores: Some(0),
            ..FakePlatform::default()
        };

        assert_eq!(detect(&platform, &store).cpu_cores, 2);
    }

    #[test]
    fn test_probe_error_yields_unknown_tier() {
        let (_dir, store) = temp_store();
        let platform = FakePlatform {
            renderer: Err("debug extension unavailable".to_string()),
            ..FakePlatform::default()
        };

        let snapshot = detect(&platform, &store);
        assert_eq!(snapshot.gpu_tier, GpuTier::Unknown);
        assert!(!snapshot.supports_graphics_context);
    }

    #[test]
    fn test_device_id_stable_across_detections() {
        let (_dir, store) = temp_store();
        let platform = FakePlatform::default();

        let first = detect(&platform, &store);
        let second = detect(&platform, &store);
        assert_eq!(first.device_id, second.device_id);
        assert!(!first.device_id.is_empty());
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let (_dir, store) = temp_store();
        let snapshot = detect(&FakePlatform::default(), &store);

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: CapabilitySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
        assert!(json.contains("\"deviceId\""));
        assert!(json.contains("\"gpuTier\":\"high\""));
    }
}

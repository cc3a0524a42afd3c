//! Durable capability storage
//!
//! A small JSON key/value file plays the role of the client's durable store:
//! single writer, last write wins, corruption tolerated as a cache miss.
//! [`CapabilityStore`] layers load-if-present-else-detect semantics on top and
//! owns the snapshot and mode for the process lifetime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::mode::{decide, PerformanceMode};
use crate::platform::Platform;
use crate::probe::{detect, CapabilitySnapshot};

/// Key holding the opaque device identifier.
pub const KEY_DEVICE_ID: &str = "deviceId";

/// Key holding the serialized snapshot + mode.
pub const KEY_CAPABILITIES: &str = "deviceCapabilities";

/// Key holding the bare mode string, kept in sync for cheap reads.
pub const KEY_MODE: &str = "performanceMode";

/// Application directory name under the platform data dir.
const APP_NAME: &str = "vitalscope";

/// Store file name.
const STORE_FILE: &str = "telemetry.json";

/// File-backed string key/value store.
pub struct KvStore {
    path: PathBuf,
}

impl KvStore {
    /// Open a store at an explicit path. The file is created lazily on the
    /// first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open the store in the platform data directory, creating the directory
    /// if needed.
    pub fn open_default() -> Result<Self> {
        let base = dirs::data_dir().context("could not determine data directory")?;
        let dir = base.join(APP_NAME);

        if !dir.exists() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create data directory: {}", dir.display()))?;
        }

        Ok(Self::open(dir.join(STORE_FILE)))
    }

    /// Read a value. Missing file, missing key and malformed contents all
    /// return `None`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.read_map().remove(key)
    }

    /// Write a value, persisting the whole map.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    /// Remove a key if present.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_map();
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }

    fn read_map(&self) -> HashMap<String, String> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return HashMap::new(),
        };

        match serde_json::from_str(&contents) {
            Ok(map) => map,
            Err(e) => {
                warn!("malformed store file {}: {e}", self.path.display());
                HashMap::new()
            }
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(map).context("failed to serialize store")?;

        std::fs::write(&self.path, contents)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

/// Capability snapshot plus the mode derived from (or overriding) it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    #[serde(flatten)]
    pub capabilities: CapabilitySnapshot,
    pub mode: PerformanceMode,
}

/// Owns the persisted capability snapshot and performance mode.
pub struct CapabilityStore {
    kv: KvStore,
    platform: Box<dyn Platform>,
    cached: Mutex<Option<DeviceProfile>>,
}

impl CapabilityStore {
    pub fn new(kv: KvStore, platform: Box<dyn Platform>) -> Self {
        Self {
            kv,
            platform,
            cached: Mutex::new(None),
        }
    }

    /// Load-if-present, else detect, decide and persist. Idempotent: repeated
    /// calls without storage mutation return the same profile.
    pub fn initialize(&self) -> DeviceProfile {
        if let Some(profile) = self.cached.lock().unwrap().clone() {
            return profile;
        }

        let profile = match self.load() {
            Some(profile) => {
                info!("loaded cached device profile (mode {})", profile.mode);
                profile
            }
            None => {
                let capabilities = detect(self.platform.as_ref(), &self.kv);
                let mode = decide(&capabilities);
                let profile = DeviceProfile { capabilities, mode };

                info!("detected device profile (mode {})", profile.mode);
                if let Err(e) = self.save(&profile) {
                    warn!("failed to persist device profile: {e}");
                }
                profile
            }
        };

        *self.cached.lock().unwrap() = Some(profile.clone());
        profile
    }

    /// Read the persisted profile. Malformed data is a miss, never an error.
    pub fn load(&self) -> Option<DeviceProfile> {
        let raw = self.kv.get(KEY_CAPABILITIES)?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("discarding malformed device profile: {e}");
                None
            }
        }
    }

    /// Persist the profile, keeping the bare mode key in sync.
    pub fn save(&self, profile: &DeviceProfile) -> Result<()> {
        let raw = serde_json::to_string(profile).context("failed to serialize device profile")?;
        self.kv.set(KEY_CAPABILITIES, &raw)?;
        self.kv.set(KEY_MODE, &profile.mode.to_string())
    }

    /// Force a mode without re-detecting capabilities.
    pub fn override_mode(&self, mode: PerformanceMode) -> DeviceProfile {
        let mut profile = self.initialize();
        profile.mode = mode;

        info!("performance mode overridden to {mode}");
        if let Err(e) = self.save(&profile) {
            warn!("failed to persist mode override: {e}");
        }

        *self.cached.lock().unwrap() = Some(profile.clone());
        profile
    }

    /// Current capability snapshot, detecting on first use.
    pub fn capabilities(&self) -> CapabilitySnapshot {
        self.initialize().capabilities
    }

    /// Current performance mode, detecting on first use.
    pub fn mode(&self) -> PerformanceMode {
        self.initialize().mode
    }

    /// Cheap read of the persisted mode without touching the snapshot or
    /// triggering detection. `None` when nothing valid is stored yet.
    pub fn peek_mode(&self) -> Option<PerformanceMode> {
        PerformanceMode::from_str_opt(&self.kv.get(KEY_MODE)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::GpuTier;
    use crate::platform::ConnectionType;
    use crate::probe::tests::FakePlatform;
    use tempfile::TempDir;

    fn store_at(dir: &TempDir, platform: FakePlatform) -> CapabilityStore {
        CapabilityStore::new(
            KvStore::open(dir.path().join(STORE_FILE)),
            Box::new(platform),
        )
    }

    #[test]
    fn test_kv_round_trip() {
        let dir = TempDir::new().unwrap();
        let kv = KvStore::open(dir.path().join("kv.json"));

        assert_eq!(kv.get("missing"), None);
        kv.set("a", "1").unwrap();
        kv.set("b", "two").unwrap();
        assert_eq!(kv.get("a").as_deref(), Some("1"));
        assert_eq!(kv.get("b").as_deref(), Some("two"));

        kv.remove("a").unwrap();
        assert_eq!(kv.get("a"), None);
    }

    #[test]
    fn test_kv_tolerates_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let kv = KvStore::open(&path);
        assert_eq!(kv.get("anything"), None);

        // Writes recover the file.
        kv.set("k", "v").unwrap();
        assert_eq!(kv.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, FakePlatform::default());

        let first = store.initialize();
        let second = store.initialize();
        assert_eq!(first, second);
        assert_eq!(first.capabilities.device_id, second.capabilities.device_id);
        assert_eq!(first.mode, PerformanceMode::Full);
    }

    #[test]
    fn test_initialize_prefers_cached_profile_over_redetection() {
        let dir = TempDir::new().unwrap();

        let persisted = {
            let store = store_at(&dir, FakePlatform::default());
            store.initialize()
        };

        // A fresh store over the same file, backed by a much weaker device,
        // must return the persisted profile unchanged.
        let weak = FakePlatform {
            cores: Some(1),
            memory_gb: Some(1.0),
            connection: ConnectionType::Slow2G,
            renderer: Ok(None),
            ..FakePlatform::default()
        };
        let store = store_at(&dir, weak);
        assert_eq!(store.initialize(), persisted);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, FakePlatform::default());

        let profile = DeviceProfile {
            capabilities: CapabilitySnapshot {
                device_id: "dev-1".to_string(),
                cpu_cores: 6,
                device_memory_gb: 8.0,
                gpu_tier: GpuTier::Medium,
                connection_type: ConnectionType::ThreeG,
                prefers_reduced_motion: false,
                supports_graphics_context: true,
            },
            mode: PerformanceMode::Balanced,
        };

        store.save(&profile).unwrap();
        assert_eq!(store.load(), Some(profile));
    }

    #[test]
    fn test_load_returns_none_on_corrupted_profile() {
        let dir = TempDir::new().unwrap();
        let kv = KvStore::open(dir.path().join(STORE_FILE));
        kv.set(KEY_CAPABILITIES, "{\"halfway\":").unwrap();

        let store = CapabilityStore::new(
            KvStore::open(dir.path().join(STORE_FILE)),
            Box::new(FakePlatform::default()),
        );
        assert_eq!(store.load(), None);

        // And initialize falls back to fresh detection.
        let profile = store.initialize();
        assert_eq!(profile.mode, PerformanceMode::Full);
    }

    #[test]
    fn test_override_mode_persists_and_syncs_bare_key() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir, FakePlatform::default());

        store.initialize();
        let overridden = store.override_mode(PerformanceMode::Lite);
        assert_eq!(overridden.mode, PerformanceMode::Lite);
        assert_eq!(store.mode(), PerformanceMode::Lite);

        let kv = KvStore::open(dir.path().join(STORE_FILE));
        assert_eq!(kv.get(KEY_MODE).as_deref(), Some("lite"));
        assert_eq!(store.peek_mode(), Some(PerformanceMode::Lite));

        // Capabilities untouched by the override.
        assert_eq!(store.load().unwrap().capabilities.cpu_cores, 8);
    }
}

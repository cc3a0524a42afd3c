//! Vitalscope Device Capability Classifier
//!
//! One-shot classification of the running device into a performance tier
//! (full / balanced / lite), persisted so subsequent launches skip detection.
//!
//! Detection is heuristic and best effort: every probe failure degrades to a
//! conservative default rather than an error. The derived mode gates optional
//! UI features through a fixed feature matrix.

pub mod features;
pub mod gpu;
pub mod mode;
pub mod platform;
pub mod probe;
pub mod store;

// Re-export main types
pub use features::{is_feature_enabled, Feature};
pub use gpu::{classify_renderer, GpuTier};
pub use mode::{decide, PerformanceMode};
pub use platform::{ConnectionType, Platform, ProbeError, SystemPlatform};
pub use probe::{detect, CapabilitySnapshot};
pub use store::{CapabilityStore, DeviceProfile, KvStore};

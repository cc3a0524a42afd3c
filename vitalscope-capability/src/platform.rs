//! Raw platform signals behind a narrow trait
//!
//! The probe never talks to the operating system directly; it reads signals
//! through [`Platform`] so tests can drive detection with synthetic devices.

use std::process::Command;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sysinfo::System;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("graphics probe failed: {0}")]
    Graphics(String),
}

/// Effective network connection class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionType {
    #[serde(rename = "4g")]
    FourG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "slow-2g")]
    Slow2G,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ConnectionType {
    /// Parse an effective-type string; anything unrecognized is `Unknown`.
    pub fn from_effective_type(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "4g" => ConnectionType::FourG,
            "3g" => ConnectionType::ThreeG,
            "2g" => ConnectionType::TwoG,
            "slow-2g" => ConnectionType::Slow2G,
            _ => ConnectionType::Unknown,
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::FourG => write!(f, "4g"),
            ConnectionType::ThreeG => write!(f, "3g"),
            ConnectionType::TwoG => write!(f, "2g"),
            ConnectionType::Slow2G => write!(f, "slow-2g"),
            ConnectionType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Source of raw device signals.
///
/// Every accessor is best effort: `None` (or `Unknown`) means the signal is
/// unavailable and the probe substitutes its documented default.
pub trait Platform: Send + Sync {
    /// Logical CPU count, if the platform reports one.
    fn hardware_concurrency(&self) -> Option<u32>;

    /// Installed memory in GB, if the platform reports it.
    fn device_memory_gb(&self) -> Option<f64>;

    /// Effective network connection class.
    fn connection_type(&self) -> ConnectionType;

    /// Whether the user asked for reduced motion.
    fn prefers_reduced_motion(&self) -> bool;

    /// Renderer identifier from an offscreen graphics context.
    ///
    /// `Ok(None)` means context creation failed; `Err` means the probe itself
    /// raised while inspecting an existing context.
    fn graphics_renderer(&self) -> Result<Option<String>, ProbeError>;
}

/// Environment variable carrying the host-supplied effective connection type.
const CONNECTION_ENV: &str = "VITALSCOPE_EFFECTIVE_CONNECTION";

/// Environment variable carrying the host-supplied reduced-motion preference.
const REDUCED_MOTION_ENV: &str = "VITALSCOPE_REDUCED_MOTION";

/// Live platform backed by `sysinfo` plus host-supplied hints.
///
/// Network class and reduced-motion preference have no portable OS query, so
/// the embedding application forwards them via environment hints; both default
/// to the conservative values the probe expects.
pub struct SystemPlatform {
    system: Mutex<System>,
}

impl SystemPlatform {
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();

        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SystemPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for SystemPlatform {
    fn hardware_concurrency(&self) -> Option<u32> {
        let system = self.system.lock().unwrap();
        let cores = system.cpus().len() as u32;
        (cores > 0).then_some(cores)
    }

    fn device_memory_gb(&self) -> Option<f64> {
        let mut system = self.system.lock().unwrap();
        system.refresh_memory();

        let bytes = system.total_memory();
        (bytes > 0).then(|| bytes as f64 / 1_073_741_824.0)
    }

    fn connection_type(&self) -> ConnectionType {
        std::env::var(CONNECTION_ENV)
            .map(|v| ConnectionType::from_effective_type(&v))
            .unwrap_or(ConnectionType::Unknown)
    }

    fn prefers_reduced_motion(&self) -> bool {
        std::env::var(REDUCED_MOTION_ENV)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn graphics_renderer(&self) -> Result<Option<String>, ProbeError> {
        // NVIDIA first, then a generic GL query. A renderer string from either
        // counts as a live context; neither tool present means no context.
        if let Some(name) = query_nvidia_renderer() {
            return Ok(Some(name));
        }

        query_gl_renderer()
    }
}

fn query_nvidia_renderer() -> Option<String> {
    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=name", "--format=csv,noheader"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let name = String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .to_string();

    (!name.is_empty()).then_some(name)
}

fn query_gl_renderer() -> Result<Option<String>, ProbeError> {
    let output = match Command::new("glxinfo").arg("-B").output() {
        Ok(output) => output,
        // Tool missing entirely: treat as "no graphics context available".
        Err(_) => return Ok(None),
    };

    if !output.status.success() {
        return Ok(None);
    }

    let stdout = String::from_utf8(output.stdout)
        .map_err(|e| ProbeError::Graphics(format!("non-UTF8 renderer output: {e}")))?;

    for line in stdout.lines() {
        if let Some(rest) = line.trim().strip_prefix("OpenGL renderer string:") {
            let renderer = rest.trim().to_string();
            if !renderer.is_empty() {
                return Ok(Some(renderer));
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_type_parsing() {
        assert_eq!(
            ConnectionType::from_effective_type("4g"),
            ConnectionType::FourG
        );
        assert_eq!(
            ConnectionType::from_effective_type("SLOW-2G"),
            ConnectionType::Slow2G
        );
        assert_eq!(
            ConnectionType::from_effective_type("wimax"),
            ConnectionType::Unknown
        );
    }

    #[test]
    fn test_connection_type_round_trip() {
        for ty in [
            ConnectionType::FourG,
            ConnectionType::ThreeG,
            ConnectionType::TwoG,
            ConnectionType::Slow2G,
            ConnectionType::Unknown,
        ] {
            assert_eq!(ConnectionType::from_effective_type(&ty.to_string()), ty);
        }
    }

    #[test]
    fn test_system_platform_reports_hardware() {
        let platform = SystemPlatform::new();

        // Any real host has at least one CPU and some memory.
        assert!(platform.hardware_concurrency().unwrap_or(0) > 0);
        assert!(platform.device_memory_gb().unwrap_or(0.0) > 0.0);
    }
}

//!
//! Persistent machine configuration: per-axis kinematics, soft limits, queue
//! and protocol tunables, and the flow-duty curve served to the host.
//!

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

///
/// Per-axis kinematic and limit parameters, in steps/mm/seconds as described
/// by the wire protocol's persistent configuration section.
///
/// # Fields:
/// - `steps_per_mm`: Motor steps required to move this axis one millimetre
/// - `max_speed`: Maximum step rate, in steps/s
/// - `max_accel`: Maximum acceleration, in steps/s^2
/// - `limit_min_mm` / `limit_max_mm`: Soft limits, in millimetres
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, getset::Getters)]
#[get = "pub"]
pub struct AxisConfig {
    steps_per_mm: f64,
    max_speed: f64,
    max_accel: f64,
    limit_min_mm: f64,
    limit_max_mm: f64,
}

impl AxisConfig {
    pub fn new(
        steps_per_mm: f64,
        max_speed: f64,
        max_accel: f64,
        limit_min_mm: f64,
        limit_max_mm: f64,
    ) -> Self {
        AxisConfig {
            steps_per_mm,
            max_speed,
            max_accel,
            limit_min_mm,
            limit_max_mm,
        }
    }

    /// True if `mm` lies within `[limit_min_mm, limit_max_mm]` (closed bounds).
    pub fn within_limits(&self, mm: f64) -> bool {
        mm >= self.limit_min_mm && mm <= self.limit_max_mm
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        // steps_per_mm = 80, soft limits [-120, 120], matching spec.md's worked scenarios.
        AxisConfig::new(80.0, 4000.0, 20_000.0, -120.0, 120.0)
    }
}

///
/// Full machine configuration: both axes, queue/window/timeout tunables, homing
/// parameters, flow dwell timings, and the duty->line-width curve used only by
/// the host-side compiler (never consulted by the controller's motion logic).
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, getset::Getters)]
#[get = "pub"]
pub struct MachineConfig {
    x: AxisConfig,
    y: AxisConfig,

    /// Bounded command queue capacity (`Q` in spec.md).
    queue_capacity: usize,
    /// Sliding window size (`W` in spec.md), host-side.
    window_size: usize,
    /// Ack timeout in milliseconds (`T_ack`).
    ack_timeout_ms: u64,
    /// Heartbeat timeout in milliseconds (`T_heartbeat`).
    heartbeat_timeout_ms: u64,
    /// Max ack retries before the streamer fails the job (`R`).
    max_retries: u32,
    /// Busy back-off interval in milliseconds.
    busy_backoff_ms: u64,

    /// Fast homing approach speed, steps/s.
    homing_fast_speed: f64,
    /// Divisor applied to `homing_fast_speed` for the slow re-approach.
    homing_slow_divisor: f64,
    /// Back-off distance after the fast approach, millimetres.
    homing_backoff_mm: f64,
    /// Timeout for a single axis's homing approach, milliseconds.
    homing_timeout_ms: u64,

    /// Pump-on dwell before motion resumes, milliseconds.
    flow_dwell_on_ms: u64,
    /// Pump-off dwell before motion resumes, milliseconds.
    flow_dwell_off_ms: u64,

    /// Duty cycle (0..=100) -> nominal line width in mm. Compiler-only.
    flow_curve: HashMap<u8, f64>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        let mut flow_curve = HashMap::new();
        flow_curve.insert(0, 0.0);
        flow_curve.insert(50, 0.8);
        flow_curve.insert(100, 1.6);

        MachineConfig {
            x: AxisConfig::default(),
            y: AxisConfig::default(),
            queue_capacity: 64,
            window_size: 32,
            ack_timeout_ms: 250,
            heartbeat_timeout_ms: 3_000,
            max_retries: 3,
            busy_backoff_ms: 50,
            homing_fast_speed: 800.0,
            homing_slow_divisor: 4.0,
            homing_backoff_mm: 5.0,
            homing_timeout_ms: 10_000,
            flow_dwell_on_ms: 100,
            flow_dwell_off_ms: 50,
            flow_curve,
        }
    }
}

impl MachineConfig {
    /// Loads a `MachineConfig` from a JSON file on disk.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<MachineConfig, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            source: err,
        })?;
        serde_json::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: path.display().to_string(),
            source: err,
        })
    }

    pub fn axis(&self, axis: crate::hardware::Axis) -> &AxisConfig {
        match axis {
            crate::hardware::Axis::X => &self.x,
            crate::hardware::Axis::Y => &self.y,
        }
    }
}

///
/// Errors emitted while loading a `MachineConfig`.
///
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read machine configuration at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Could not parse machine configuration at {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_axis_within_limits() {
        let axis = AxisConfig::default();
        assert!(axis.within_limits(-120.0));
        assert!(axis.within_limits(120.0));
        assert!(axis.within_limits(0.0));
        assert!(!axis.within_limits(120.01));
        assert!(!axis.within_limits(-120.01));
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = MachineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: MachineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}

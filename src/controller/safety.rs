//!
//! The safety monitor (C6): soft-limit validation and heartbeat watchdog.
//!

use crate::config::MachineConfig;
use crate::protocol::ErrorCode;

///
/// Resolves a command's `(x?, y?)` against `current` to a target position and
/// validates it against both axes' soft limits (closed bounds).
///
/// # Returns:
/// - The resolved `(x, y)` target if both axes are within limits
/// - `ErrorCode::Limit` if either axis target is out of bounds
///
pub fn check_soft_limits(
    config: &MachineConfig,
    x: Option<f64>,
    y: Option<f64>,
    current: (f64, f64),
) -> Result<(f64, f64), ErrorCode> {
    let target_x = x.unwrap_or(current.0);
    let target_y = y.unwrap_or(current.1);

    if !config.x().within_limits(target_x) || !config.y().within_limits(target_y) {
        return Err(ErrorCode::Limit);
    }

    Ok((target_x, target_y))
}

///
/// True if more than `heartbeat_timeout_ms` has elapsed since `last_command`.
///
pub fn heartbeat_expired(elapsed_ms: u128, heartbeat_timeout_ms: u64) -> bool {
    elapsed_ms > heartbeat_timeout_ms as u128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bounds_inclusive() {
        let config = MachineConfig::default();
        assert!(check_soft_limits(&config, Some(120.0), Some(-120.0), (0.0, 0.0)).is_ok());
    }

    #[test]
    fn rejects_out_of_bounds_target() {
        let config = MachineConfig::default();
        assert_eq!(
            check_soft_limits(&config, Some(130.0), Some(0.0), (0.0, 0.0)),
            Err(ErrorCode::Limit)
        );
    }

    #[test]
    fn missing_axis_defaults_to_current_position() {
        let config = MachineConfig::default();
        let result = check_soft_limits(&config, Some(10.0), None, (0.0, 5.0)).unwrap();
        assert_eq!(result, (10.0, 5.0));
    }

    #[test]
    fn heartbeat_trips_only_past_timeout() {
        assert!(!heartbeat_expired(2_999, 3_000));
        assert!(heartbeat_expired(3_001, 3_000));
    }
}

//!
//! The motion planner (C2): builds a synchronized two-axis trapezoidal
//! profile for a segment and tracks its progress against a clock.
//!

use std::time::Instant;

use crate::config::MachineConfig;
use crate::hardware::math::{
    TrapezoidalProfile, mm_to_steps, plan_axis, retime_axis, split_feed_to_axis_speeds,
};

///
/// An in-flight motion segment: the interpolation state between a queued
/// command's start position and its target.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveSegment {
    start: (f64, f64),
    target: (f64, f64),
    profile_x: TrapezoidalProfile,
    profile_y: TrapezoidalProfile,
    steps_per_mm: (f64, f64),
    started_at: Instant,
}

impl ActiveSegment {
    pub fn total_time(&self) -> f64 {
        self.profile_x.total_time().max(self.profile_y.total_time())
    }

    /// True once `now` is at or past the segment's total duration.
    pub fn is_done(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at).as_secs_f64() >= self.total_time()
    }

    /// Interpolated `(x, y)` position at `now`, per-axis fraction of its own
    /// (possibly re-timed) trapezoidal profile. Both axes share `now` as the
    /// shared clock, which is what gives the "finish within one step period
    /// of each other" synchronization guarantee: they were re-timed to the
    /// same `total_time`.
    pub fn position_at(&self, now: Instant) -> (f64, f64) {
        let t = now.saturating_duration_since(self.started_at).as_secs_f64();
        let fx = self.profile_x.fraction_at(t);
        let fy = self.profile_y.fraction_at(t);
        (
            self.start.0 + fx * (self.target.0 - self.start.0),
            self.start.1 + fy * (self.target.1 - self.start.1),
        )
    }

    pub fn target(&self) -> (f64, f64) {
        self.target
    }
}

///
/// Builds a synchronized segment moving from `start` to `target`, honoring an
/// optional commanded feed rate (mm/min). Returns `None` if the segment has
/// zero length on both axes (a no-op move, per spec.md's boundary behavior
/// for a coordinate-less `G1`).
///
pub fn plan_segment(
    config: &MachineConfig,
    start: (f64, f64),
    target: (f64, f64),
    feed_mm_per_min: Option<f64>,
    now: Instant,
) -> Option<ActiveSegment> {
    let dx_mm = target.0 - start.0;
    let dy_mm = target.1 - start.1;
    if dx_mm == 0.0 && dy_mm == 0.0 {
        return None;
    }

    let x_cfg = config.x();
    let y_cfg = config.y();
    let steps_per_mm_x = *x_cfg.steps_per_mm();
    let steps_per_mm_y = *y_cfg.steps_per_mm();
    let max_speed_x = *x_cfg.max_speed();
    let max_speed_y = *y_cfg.max_speed();
    let max_accel_x = *x_cfg.max_accel();
    let max_accel_y = *y_cfg.max_accel();

    let dx_steps = mm_to_steps(dx_mm, steps_per_mm_x) as f64;
    let dy_steps = mm_to_steps(dy_mm, steps_per_mm_y) as f64;

    let (speed_cap_x, speed_cap_y) = match feed_mm_per_min {
        Some(feed) => split_feed_to_axis_speeds(
            dx_mm,
            dy_mm,
            feed / 60.0,
            steps_per_mm_x,
            steps_per_mm_y,
            max_speed_x,
            max_speed_y,
        ),
        None => (max_speed_x, max_speed_y),
    };

    let mut profile_x = plan_axis(dx_steps, speed_cap_x, max_accel_x);
    let mut profile_y = plan_axis(dy_steps, speed_cap_y, max_accel_y);

    let total = profile_x.total_time().max(profile_y.total_time());
    if dx_steps != 0.0 && profile_x.total_time() < total {
        profile_x = retime_axis(dx_steps, max_accel_x, total);
    }
    if dy_steps != 0.0 && profile_y.total_time() < total {
        profile_y = retime_axis(dy_steps, max_accel_y, total);
    }

    Some(ActiveSegment {
        start,
        target,
        profile_x,
        profile_y,
        steps_per_mm: (steps_per_mm_x, steps_per_mm_y),
        started_at: now,
    })
}

/// Converts an `ActiveSegment`'s target back to steps, for telemetry/debug use.
pub fn target_steps(segment: &ActiveSegment) -> (i64, i64) {
    (
        mm_to_steps(segment.target.0, segment.steps_per_mm.0),
        mm_to_steps(segment.target.1, segment.steps_per_mm.1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn axes_finish_within_one_step_period_of_each_other() {
        let config = MachineConfig::default();
        let now = Instant::now();
        let segment = plan_segment(&config, (0.0, 0.0), (10.0, 2.0), Some(600.0), now).unwrap();

        let finish = now + Duration::from_secs_f64(segment.total_time());
        assert!(segment.is_done(finish));
        let (x, y) = segment.position_at(finish);
        assert!((x - 10.0).abs() < 1e-6);
        assert!((y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn no_coordinates_means_no_segment() {
        let config = MachineConfig::default();
        let now = Instant::now();
        assert!(plan_segment(&config, (1.0, 1.0), (1.0, 1.0), Some(600.0), now).is_none());
    }

    #[test]
    fn midpoint_is_between_start_and_target() {
        let config = MachineConfig::default();
        let now = Instant::now();
        let segment = plan_segment(&config, (0.0, 0.0), (20.0, 0.0), Some(300.0), now).unwrap();
        let mid = now + Duration::from_secs_f64(segment.total_time() / 2.0);
        let (x, _y) = segment.position_at(mid);
        assert!(x > 0.0 && x < 20.0);
    }
}

//!
//! Per-axis step/mm conversion and trapezoidal velocity profile math.
//!

///
/// Converts a millimetre position to motor steps for a given axis pitch.
///
/// # Parameters:
/// - `mm`: The position or distance, in millimetres
/// - `steps_per_mm`: The axis's steps-per-millimetre
///
/// # Returns:
/// - The equivalent value in motor steps, rounded to the nearest whole step
///
pub fn mm_to_steps(mm: f64, steps_per_mm: f64) -> i64 {
    (mm * steps_per_mm).round() as i64
}

///
/// Converts a motor step count back to millimetres for a given axis pitch.
///
/// # Parameters:
/// - `steps`: The number of motor steps
/// - `steps_per_mm`: The axis's steps-per-millimetre
///
/// # Returns:
/// - The equivalent distance in millimetres
///
pub fn steps_to_mm(steps: i64, steps_per_mm: f64) -> f64 {
    steps as f64 / steps_per_mm
}

///
/// A trapezoidal (accelerate / cruise / decelerate) velocity profile for a
/// single axis covering a fixed step distance.
///
/// # Fields:
/// - `distance_steps`: Total steps this profile covers (always >= 0)
/// - `accel`: Steps/s^2 used for both the acceleration and deceleration phases
/// - `peak_speed`: Steps/s reached at the end of the acceleration phase
/// - `accel_time`, `cruise_time`, `decel_time`: Durations of each phase, seconds
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrapezoidalProfile {
    pub distance_steps: f64,
    pub accel: f64,
    pub peak_speed: f64,
    pub accel_time: f64,
    pub cruise_time: f64,
    pub decel_time: f64,
}

impl TrapezoidalProfile {
    /// Total duration of the profile, in seconds.
    pub fn total_time(&self) -> f64 {
        self.accel_time + self.cruise_time + self.decel_time
    }

    /// A zero-length, zero-time profile (no motion required on this axis).
    pub fn idle() -> Self {
        TrapezoidalProfile {
            distance_steps: 0.0,
            accel: 0.0,
            peak_speed: 0.0,
            accel_time: 0.0,
            cruise_time: 0.0,
            decel_time: 0.0,
        }
    }

    ///
    /// Fraction of `distance_steps` covered at elapsed time `t` (seconds),
    /// clamped to `[0, 1]`.
    ///
    pub fn fraction_at(&self, t: f64) -> f64 {
        if self.distance_steps <= 0.0 {
            return 1.0;
        }
        let total = self.total_time();
        if t <= 0.0 {
            return 0.0;
        }
        if t >= total {
            return 1.0;
        }

        let accel_dist = 0.5 * self.accel * self.accel_time * self.accel_time;
        let cruise_dist = self.peak_speed * self.cruise_time;

        let covered = if t < self.accel_time {
            0.5 * self.accel * t * t
        } else if t < self.accel_time + self.cruise_time {
            accel_dist + self.peak_speed * (t - self.accel_time)
        } else {
            let td = t - self.accel_time - self.cruise_time;
            accel_dist + cruise_dist + self.peak_speed * td - 0.5 * self.accel * td * td
        };

        (covered / self.distance_steps).clamp(0.0, 1.0)
    }
}

///
/// Plans a trapezoidal profile for a single axis covering `distance_steps`
/// steps, capped at `speed_cap` steps/s (which may be tighter than the axis's
/// own `max_speed`, e.g. when a feed rate constrains this axis) and
/// `max_accel` steps/s^2.
///
/// If the distance is too short to reach `speed_cap` before needing to
/// decelerate again, the profile degenerates to a triangle (no cruise phase).
///
pub fn plan_axis(distance_steps: f64, speed_cap: f64, max_accel: f64) -> TrapezoidalProfile {
    let distance_steps = distance_steps.abs();
    if distance_steps <= 0.0 || speed_cap <= 0.0 || max_accel <= 0.0 {
        return TrapezoidalProfile::idle();
    }

    let accel_dist_at_cap = speed_cap * speed_cap / max_accel;

    if accel_dist_at_cap <= distance_steps {
        let accel_time = speed_cap / max_accel;
        let accel_dist = 0.5 * max_accel * accel_time * accel_time;
        let cruise_dist = distance_steps - 2.0 * accel_dist;
        let cruise_time = cruise_dist / speed_cap;
        TrapezoidalProfile {
            distance_steps,
            accel: max_accel,
            peak_speed: speed_cap,
            accel_time,
            cruise_time,
            decel_time: accel_time,
        }
    } else {
        let peak_speed = (distance_steps * max_accel).sqrt();
        let accel_time = peak_speed / max_accel;
        TrapezoidalProfile {
            distance_steps,
            accel: max_accel,
            peak_speed,
            accel_time,
            cruise_time: 0.0,
            decel_time: accel_time,
        }
    }
}

///
/// Re-times a trapezoidal profile so its total duration matches
/// `target_time`, by reducing (never increasing) its peak speed. Used to
/// synchronize two axes of a segment so both finish together.
///
/// If `target_time` cannot be reached even at zero speed (i.e. the axis has
/// no distance to cover), the idle profile is returned unchanged.
///
pub fn retime_axis(distance_steps: f64, max_accel: f64, target_time: f64) -> TrapezoidalProfile {
    let distance_steps = distance_steps.abs();
    if distance_steps <= 0.0 || target_time <= 0.0 || max_accel <= 0.0 {
        return TrapezoidalProfile::idle();
    }

    // Solve v/A + D/v = T  =>  v^2 - A*T*v + A*D = 0, take the smaller root:
    // the larger root overshoots the achievable peak speed for this distance.
    let a = max_accel;
    let disc = a * a * target_time * target_time - 4.0 * a * distance_steps;
    if disc < 0.0 {
        // target_time is tighter than this axis can achieve even at full
        // speed; fall back to its fastest feasible (triangular) profile.
        let peak_speed = (distance_steps * max_accel).sqrt();
        let accel_time = peak_speed / max_accel;
        return TrapezoidalProfile {
            distance_steps,
            accel: max_accel,
            peak_speed,
            accel_time,
            cruise_time: 0.0,
            decel_time: accel_time,
        };
    }

    let peak_speed = (a * target_time - disc.sqrt()) / 2.0;
    plan_axis(distance_steps, peak_speed, max_accel)
}

///
/// Splits a commanded Cartesian feed rate (mm/s) into per-axis speed caps
/// (steps/s), preserving the direction of the requested move and clamping
/// each axis to its own `max_speed`.
///
/// # Parameters:
/// - `dx_mm`, `dy_mm`: Signed per-axis displacement of the move, millimetres
/// - `feed_mm_per_s`: Commanded Cartesian feed rate, `F/60`
/// - `steps_per_mm_x`, `steps_per_mm_y`: Axis pitches
/// - `max_speed_x`, `max_speed_y`: Axis speed caps, steps/s
///
/// # Returns:
/// - `(speed_cap_x, speed_cap_y)` in steps/s
///
pub fn split_feed_to_axis_speeds(
    dx_mm: f64,
    dy_mm: f64,
    feed_mm_per_s: f64,
    steps_per_mm_x: f64,
    steps_per_mm_y: f64,
    max_speed_x: f64,
    max_speed_y: f64,
) -> (f64, f64) {
    let magnitude = (dx_mm * dx_mm + dy_mm * dy_mm).sqrt();
    if magnitude <= 0.0 {
        return (0.0, 0.0);
    }

    let ux = (dx_mm / magnitude).abs();
    let uy = (dy_mm / magnitude).abs();

    let vx_steps = (feed_mm_per_s * ux * steps_per_mm_x).min(max_speed_x);
    let vy_steps = (feed_mm_per_s * uy * steps_per_mm_y).min(max_speed_y);

    (vx_steps, vy_steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mm_step_round_trip() {
        let steps = mm_to_steps(10.0, 80.0);
        assert_eq!(steps, 800);
        assert_eq!(steps_to_mm(steps, 80.0), 10.0);
    }

    #[test]
    fn triangular_profile_when_distance_short() {
        let profile = plan_axis(100.0, 4000.0, 20_000.0);
        assert_eq!(profile.cruise_time, 0.0);
        assert!(profile.peak_speed < 4000.0);
        assert!((profile.fraction_at(profile.total_time()) - 1.0).abs() < 1e-9);
        assert_eq!(profile.fraction_at(0.0), 0.0);
    }

    #[test]
    fn trapezoidal_profile_when_distance_long() {
        let profile = plan_axis(800_000.0, 4000.0, 20_000.0);
        assert!(profile.cruise_time > 0.0);
        assert_eq!(profile.peak_speed, 4000.0);
    }

    #[test]
    fn retime_matches_target_duration() {
        let natural = plan_axis(800.0, 4000.0, 20_000.0);
        let slower = retime_axis(800.0, 20_000.0, natural.total_time() * 2.0);
        assert!((slower.total_time() - natural.total_time() * 2.0).abs() < 1e-6);
        assert!(slower.peak_speed < natural.peak_speed);
    }

    #[test]
    fn feed_split_preserves_direction_and_clamps() {
        let (vx, vy) = split_feed_to_axis_speeds(10.0, 0.0, 10.0, 80.0, 80.0, 4000.0, 4000.0);
        assert_eq!(vy, 0.0);
        assert!(vx > 0.0);

        let (vx, vy) = split_feed_to_axis_speeds(3.0, 4.0, 100.0, 80.0, 80.0, 4000.0, 4000.0);
        // magnitude 5, so 60% goes to x and 80% to y before the axis clamp.
        assert!(vx > 0.0 && vy > 0.0);
        assert!(vx <= 4000.0 && vy <= 4000.0);
    }
}

//!
//! The homing procedure (§4.3): per axis, in the order X then Y, fast
//! approach -> zero -> back off -> slow approach -> zero.
//!

use crate::config::MachineConfig;
use crate::hardware::Axis;
use crate::hardware::io::StepIo;
use crate::protocol::ErrorCode;

const STEP_MM: f64 = 0.5;
const MAX_ITERATIONS: u32 = 4_000;

///
/// Runs the full two-axis homing procedure against `io`, driving each axis
/// toward its endstop in small simulated increments. Returns `HomingFail` if
/// either axis's endstop never asserts within `MAX_ITERATIONS` steps.
///
pub fn run_homing<IO: StepIo + ?Sized>(
    io: &mut IO,
    config: &MachineConfig,
) -> Result<(f64, f64), ErrorCode> {
    home_axis(io, Axis::X, config)?;
    home_axis(io, Axis::Y, config)?;
    Ok((0.0, 0.0))
}

fn home_axis<IO: StepIo + ?Sized>(
    io: &mut IO,
    axis: Axis,
    config: &MachineConfig,
) -> Result<(), ErrorCode> {
    // 1. Fast approach toward the min endstop.
    approach(io, axis, -STEP_MM)?;
    // 2. Endstop asserted: zero the axis.
    io.set_position(axis, 0.0);
    // 3. Back off by a fixed distance.
    io.set_position(axis, *config.homing_backoff_mm());
    // 4. Slow approach (smaller step) until the endstop re-asserts.
    approach(io, axis, -STEP_MM / *config.homing_slow_divisor())?;
    // 5. Zero again and leave the axis at 0.
    io.set_position(axis, 0.0);

    Ok(())
}

fn approach<IO: StepIo + ?Sized>(io: &mut IO, axis: Axis, step_mm: f64) -> Result<(), ErrorCode> {
    if io.endstop_asserted(axis) {
        return Ok(());
    }

    for _ in 0..MAX_ITERATIONS {
        let next = io.position_hint(axis) + step_mm;
        io.set_position(axis, next);
        if io.endstop_asserted(axis) {
            return Ok(());
        }
    }

    Err(ErrorCode::HomingFail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::io::SimulatedIo;

    #[test]
    fn homes_both_axes_to_zero() {
        let mut io = SimulatedIo::new();
        let config = MachineConfig::default();
        let (x, y) = run_homing(&mut io, &config).unwrap();
        assert_eq!((x, y), (0.0, 0.0));
        assert_eq!(io.position(), (0.0, 0.0));
    }

    #[test]
    fn unreachable_endstop_reports_homing_fail() {
        let mut io = SimulatedIo::with_unreachable_endstop(Axis::Y);
        let config = MachineConfig::default();
        assert_eq!(run_homing(&mut io, &config), Err(ErrorCode::HomingFail));
    }
}

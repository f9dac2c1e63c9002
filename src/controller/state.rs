//!
//! The controller's state machine (C4): the legal states and which commands
//! each state accepts, per spec.md §3.
//!

///
/// `Boot -> Idle -> Homing -> Ready <-> Printing <-> Paused`, with `Cleaning`
/// and `Error` reachable as described in spec.md §3. `Error` requires a
/// successful `Home` to leave.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Boot,
    Idle,
    Homing,
    Ready,
    Printing,
    Paused,
    Cleaning,
    Error,
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ControllerState::Boot => "Boot",
            ControllerState::Idle => "Idle",
            ControllerState::Homing => "Homing",
            ControllerState::Ready => "Ready",
            ControllerState::Printing => "Printing",
            ControllerState::Paused => "Paused",
            ControllerState::Cleaning => "Cleaning",
            ControllerState::Error => "Error",
        };
        write!(f, "{name}")
    }
}

impl ControllerState {
    /// Motion commands other than `Home` are accepted only here.
    pub fn motion_allowed(&self) -> bool {
        matches!(self, ControllerState::Ready | ControllerState::Printing)
    }

    /// `FlowOn` is accepted only here; rejected in Paused/Error/Homing/Idle.
    pub fn flow_on_allowed(&self) -> bool {
        matches!(self, ControllerState::Ready | ControllerState::Printing)
    }

    /// `G28` is privileged and accepted in these states even though they
    /// otherwise reject motion. `Error` is included alongside the
    /// documented `Idle`/`Ready`/`Paused` set: re-entering `Ready` from
    /// `Error` requires a successful `Home`, so rejecting `G28` there would
    /// make recovery impossible.
    pub fn home_allowed(&self) -> bool {
        matches!(
            self,
            ControllerState::Idle
                | ControllerState::Ready
                | ControllerState::Paused
                | ControllerState::Error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_only_in_ready_or_printing() {
        assert!(ControllerState::Ready.motion_allowed());
        assert!(ControllerState::Printing.motion_allowed());
        assert!(!ControllerState::Idle.motion_allowed());
        assert!(!ControllerState::Paused.motion_allowed());
        assert!(!ControllerState::Error.motion_allowed());
        assert!(!ControllerState::Homing.motion_allowed());
    }

    #[test]
    fn home_allowed_in_idle_ready_paused_and_error() {
        assert!(ControllerState::Idle.home_allowed());
        assert!(ControllerState::Ready.home_allowed());
        assert!(ControllerState::Paused.home_allowed());
        assert!(ControllerState::Error.home_allowed());
        assert!(!ControllerState::Printing.home_allowed());
        assert!(!ControllerState::Homing.home_allowed());
    }
}

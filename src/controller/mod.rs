//!
//! The controller: ties the command queue (C3), state machine (C4), protocol
//! engine (C5), and safety monitor (C6) together into the single-threaded
//! main-loop role described in spec.md §5. `Controller` owns the state struct
//! explicitly, as recommended by spec.md §9's design notes, rather than
//! hiding it behind process-global statics, so it can be unit tested against
//! simulated IO.
//!

pub mod homing;
pub mod safety;
pub mod state;

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::MachineConfig;
use crate::hardware::io::{PumpIo, StepIo};
use crate::planner::{self, ActiveSegment};
use crate::protocol::sequence::{SeqOutcome, SequenceTracker};
use crate::protocol::{Command, ErrorCode, Reply, TelemetryFrame, parse_line};
use crate::queue::{CommandQueue, QueuedCommand};
use state::ControllerState;

const TELEMETRY_PERIOD_MS: u64 = 1_000;

///
/// The controller's full owned state, generic over its IO backend so tests
/// can swap in `SimulatedIo` while a real build would wire up GPIO.
///
pub struct Controller<IO: StepIo + PumpIo> {
    pub state: ControllerState,
    pub position: (f64, f64),
    pub pump_duty: u8,
    pub pump_on: bool,
    config: MachineConfig,
    queue: CommandQueue,
    sequence: SequenceTracker,
    io: IO,
    active_segment: Option<ActiveSegment>,
    last_command_at: Instant,
    last_telemetry_at: Instant,
    last_reply_for_seq: HashMap<u64, Vec<Reply>>,
}

impl<IO: StepIo + PumpIo> Controller<IO> {
    pub fn new(config: MachineConfig, io: IO, now: Instant) -> Self {
        let capacity = *config.queue_capacity();
        Controller {
            state: ControllerState::Boot,
            position: (0.0, 0.0),
            pump_duty: 0,
            pump_on: false,
            config,
            queue: CommandQueue::new(capacity),
            sequence: SequenceTracker::new(),
            io,
            active_segment: None,
            last_command_at: now,
            last_telemetry_at: now,
            last_reply_for_seq: HashMap::new(),
        }
    }

    /// Completes `Boot -> Idle`. Called once after construction.
    pub fn complete_boot(&mut self) {
        self.state = ControllerState::Idle;
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    fn force_pump_off(&mut self) {
        self.pump_on = false;
        self.pump_duty = 0;
        self.io.set_duty(0);
    }

    fn telemetry_frame(&self) -> TelemetryFrame {
        TelemetryFrame {
            pos: self.position,
            flow: self.pump_duty,
            q: self.queue.len(),
            state: self.state.to_string(),
            last_acked_seq: self.sequence.last_acked_seq(),
        }
    }

    fn status_reply(&self, seq: u64) -> Vec<Reply> {
        vec![
            Reply::Ok { seq },
            Reply::Status {
                state: self.state.to_string(),
                q: self.queue.len(),
                flow: self.pump_duty,
                sauce_on: self.pump_on,
                last_acked_seq: self.sequence.last_acked_seq(),
            },
        ]
    }

    ///
    /// Handles one raw incoming SSG line, applying sequence validation,
    /// acceptance gates, and dispatch. Returns the reply/replies to send
    /// immediately; motion and flow commands may additionally cause `tick`
    /// to emit further replies later (ack-at-enqueue vs ack-at-execution,
    /// per spec.md §4.1).
    ///
    pub fn handle_line(&mut self, raw: &str, now: Instant) -> Vec<Reply> {
        let line = match parse_line(raw) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, line = raw, "malformed SSG line");
                return vec![Reply::Err {
                    seq: None,
                    code: ErrorCode::Parse,
                }];
            }
        };

        self.last_command_at = now;

        if line.is_out_of_band() {
            return self.execute_out_of_band(line.command);
        }

        match self.sequence.check(line.seq) {
            SeqOutcome::Duplicate => {
                debug!(seq = line.seq, "duplicate command suppressed");
                self.last_reply_for_seq
                    .get(&line.seq)
                    .cloned()
                    .unwrap_or_else(|| vec![Reply::Ok { seq: line.seq }])
            }
            SeqOutcome::Gap => {
                warn!(
                    seq = line.seq,
                    expected = self.sequence.expected_next_seq(),
                    "sequence gap"
                );
                vec![Reply::Err {
                    seq: Some(line.seq),
                    code: ErrorCode::Gap,
                }]
            }
            SeqOutcome::Accepted => {
                let replies = self.accept(line.seq, line.command, now);
                self.last_reply_for_seq.insert(line.seq, replies.clone());
                replies
            }
        }
    }

    fn execute_out_of_band(&mut self, command: Command) -> Vec<Reply> {
        match command {
            Command::ReportPos => vec![Reply::Pos {
                x: self.position.0,
                y: self.position.1,
            }],
            Command::ReportStatus => self.status_reply(0),
            Command::FlowOff => {
                self.force_pump_off();
                vec![Reply::Ok { seq: 0 }]
            }
            _ => vec![Reply::Ok { seq: 0 }],
        }
    }

    /// Dispatches a freshly-accepted sequenced command (the four acceptance
    /// gates of spec.md §4.2, checked in order: sequence already passed by
    /// the caller, then legality, soft limits, queue space).
    fn accept(&mut self, seq: u64, command: Command, now: Instant) -> Vec<Reply> {
        match command {
            Command::Home => self.accept_home(seq, now),
            Command::ReportPos => {
                self.sequence.mark_acked(seq);
                let mut replies = vec![Reply::Ok { seq }];
                replies.push(Reply::Pos {
                    x: self.position.0,
                    y: self.position.1,
                });
                replies
            }
            Command::ReportStatus => {
                self.sequence.mark_acked(seq);
                self.status_reply(seq)
            }
            Command::FlowOn { duty } => {
                self.accept_queued_immediate(seq, Command::FlowOn { duty }, |state| {
                    state.flow_on_allowed()
                })
            }
            Command::FlowOff => self.accept_queued_immediate(seq, Command::FlowOff, |_| true),
            Command::Rapid { x, y, feed } => {
                self.accept_motion(seq, Command::Rapid { x, y, feed }, x, y)
            }
            Command::Draw { x, y, feed } => {
                self.accept_motion(seq, Command::Draw { x, y, feed }, x, y)
            }
        }
    }

    fn accept_home(&mut self, seq: u64, _now: Instant) -> Vec<Reply> {
        if !self.state.home_allowed() {
            return vec![Reply::Err {
                seq: Some(seq),
                code: ErrorCode::BusyState,
            }];
        }

        self.force_pump_off();
        self.state = ControllerState::Homing;
        self.active_segment = None;
        info!("homing started");

        match homing::run_homing(&mut self.io, &self.config) {
            Ok(position) => {
                self.position = position;
                self.sequence.reset();
                self.sequence.mark_acked(0);
                self.state = ControllerState::Ready;
                info!("homing complete");
                vec![Reply::Ok { seq }]
            }
            Err(code) => {
                self.state = ControllerState::Error;
                warn!(?code, "homing failed");
                vec![Reply::Err {
                    seq: Some(seq),
                    code,
                }]
            }
        }
    }

    fn accept_motion(
        &mut self,
        seq: u64,
        command: Command,
        x: Option<f64>,
        y: Option<f64>,
    ) -> Vec<Reply> {
        if !self.state.motion_allowed() {
            let code = if self.state == ControllerState::Idle {
                ErrorCode::NotHomed
            } else {
                ErrorCode::BusyState
            };
            return vec![Reply::Err {
                seq: Some(seq),
                code,
            }];
        }

        match safety::check_soft_limits(&self.config, x, y, self.position) {
            Ok(_target) => {}
            Err(code) => {
                self.state = ControllerState::Error;
                self.active_segment = None;
                self.force_pump_off();
                warn!(?code, seq, "soft-limit violation");
                return vec![Reply::Err {
                    seq: Some(seq),
                    code,
                }];
            }
        }

        if self.queue.is_full() {
            return vec![Reply::Busy {
                q: self.queue.len(),
                state: self.state.to_string(),
            }];
        }

        self.queue
            .push(QueuedCommand { seq, command })
            .expect("just checked queue has space");
        if self.state == ControllerState::Ready {
            self.state = ControllerState::Printing;
        }
        self.sequence.mark_acked(seq);
        vec![Reply::Ok { seq }]
    }

    fn accept_queued_immediate(
        &mut self,
        seq: u64,
        command: Command,
        legal: impl Fn(&ControllerState) -> bool,
    ) -> Vec<Reply> {
        if !legal(&self.state) {
            return vec![Reply::Err {
                seq: Some(seq),
                code: ErrorCode::BusyState,
            }];
        }

        if self.queue.is_full() {
            return vec![Reply::Busy {
                q: self.queue.len(),
                state: self.state.to_string(),
            }];
        }

        self.queue
            .push(QueuedCommand { seq, command })
            .expect("just checked queue has space");
        // Acked at execution-start (tick), not here — see SPEC_FULL.md §3's
        // resolution of the ack-timing ambiguity for M3/M5.
        Vec::new()
    }

    ///
    /// Advances the planner and runs periodic housekeeping (heartbeat
    /// watchdog, telemetry). Should be called frequently (the reference
    /// binary calls it on a short fixed interval) and does not block.
    ///
    pub fn tick(&mut self, now: Instant) -> Vec<Reply> {
        let mut out = VecDeque::new();

        self.advance_planner(now, &mut out);
        self.dequeue_next(now, &mut out);
        self.check_heartbeat(now, &mut out);
        self.maybe_emit_telemetry(now, &mut out);

        out.into_iter().collect()
    }

    fn advance_planner(&mut self, now: Instant, out: &mut VecDeque<Reply>) {
        let _ = out;
        if let Some(segment) = &self.active_segment {
            if segment.is_done(now) {
                self.position = segment.target();
                self.active_segment = None;
            } else {
                self.position = segment.position_at(now);
            }
        }
    }

    fn dequeue_next(&mut self, now: Instant, out: &mut VecDeque<Reply>) {
        if self.active_segment.is_some() {
            return;
        }
        if !matches!(
            self.state,
            ControllerState::Ready | ControllerState::Printing
        ) {
            return;
        }

        while let Some(queued) = self.queue.pop() {
            match queued.command {
                Command::Rapid { x, y, feed } => {
                    self.force_pump_off();
                    if self.begin_segment(x, y, feed, now) {
                        return;
                    }
                }
                Command::Draw { x, y, feed } => {
                    if self.begin_segment(x, y, feed, now) {
                        return;
                    }
                }
                Command::FlowOn { duty } => {
                    self.pump_on = true;
                    self.pump_duty = duty;
                    self.io.set_duty(duty);
                    self.sequence.mark_acked(queued.seq);
                    let reply = vec![Reply::Ok { seq: queued.seq }];
                    self.last_reply_for_seq.insert(queued.seq, reply.clone());
                    out.extend(reply);
                }
                Command::FlowOff => {
                    self.force_pump_off();
                    self.sequence.mark_acked(queued.seq);
                    let reply = vec![Reply::Ok { seq: queued.seq }];
                    self.last_reply_for_seq.insert(queued.seq, reply.clone());
                    out.extend(reply);
                }
                Command::Home | Command::ReportPos | Command::ReportStatus => {
                    // Handled synchronously in `accept`; never queued.
                    unreachable!("privileged/report commands are not queued")
                }
            }
        }
    }

    /// Starts a new active segment if the move has nonzero length; returns
    /// true if the planner should stop dequeuing this tick (a segment is
    /// now running).
    fn begin_segment(
        &mut self,
        x: Option<f64>,
        y: Option<f64>,
        feed: Option<f64>,
        now: Instant,
    ) -> bool {
        let target = (x.unwrap_or(self.position.0), y.unwrap_or(self.position.1));
        match planner::plan_segment(&self.config, self.position, target, feed, now) {
            Some(segment) => {
                self.active_segment = Some(segment);
                true
            }
            None => false, // no-op move: fall through to the next queued command
        }
    }

    fn check_heartbeat(&mut self, now: Instant, out: &mut VecDeque<Reply>) {
        if self.state != ControllerState::Printing {
            return;
        }
        let elapsed = now
            .saturating_duration_since(self.last_command_at)
            .as_millis();
        if safety::heartbeat_expired(elapsed, *self.config.heartbeat_timeout_ms()) {
            self.state = ControllerState::Paused;
            self.force_pump_off();
            warn!("heartbeat timeout, pausing");
            out.push_back(Reply::Err {
                seq: None,
                code: ErrorCode::Heartbeat,
            });
        }
    }

    fn maybe_emit_telemetry(&mut self, now: Instant, out: &mut VecDeque<Reply>) {
        if now
            .saturating_duration_since(self.last_telemetry_at)
            .as_millis()
            >= TELEMETRY_PERIOD_MS as u128
        {
            self.last_telemetry_at = now;
            out.push_back(Reply::Telemetry(self.telemetry_frame()));
        }
    }
}

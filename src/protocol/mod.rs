//!
//! SSG wire grammar: line parsing, command/reply representations, and the
//! sequence-tracking policy described in spec.md §4.1 and §6.
//!

pub mod error;
pub mod sequence;

use serde::Serialize;

use error::ProtocolError;

///
/// A parsed command, independent of its sequence number.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Rapid {
        x: Option<f64>,
        y: Option<f64>,
        feed: Option<f64>,
    },
    Draw {
        x: Option<f64>,
        y: Option<f64>,
        feed: Option<f64>,
    },
    FlowOn {
        duty: u8,
    },
    FlowOff,
    Home,
    ReportPos,
    ReportStatus,
}

impl Command {
    /// True for the motion ops (`G0`/`G1`); `Home` is privileged, not a "motion command"
    /// in the sense of spec.md's acceptance-gate language.
    pub fn is_motion(&self) -> bool {
        matches!(self, Command::Rapid { .. } | Command::Draw { .. })
    }

    /// True for the immediate ops acked at execution-start rather than at enqueue.
    pub fn is_immediate(&self) -> bool {
        matches!(
            self,
            Command::FlowOn { .. }
                | Command::FlowOff
                | Command::Home
                | Command::ReportPos
                | Command::ReportStatus
        )
    }
}

///
/// A command paired with its sequence number. `seq == 0` marks an
/// out-of-band command that skips sequence validation entirely.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub seq: u64,
    pub command: Command,
}

impl Line {
    pub fn is_out_of_band(&self) -> bool {
        self.seq == 0
    }
}

///
/// Parses one SSG line (without its trailing newline) into a `Line`.
///
/// # Parameters:
/// - `raw`: The line text, e.g. `"N2 G1 X10 Y0 F600"`
///
/// # Returns:
/// - The parsed `Line`
/// - A `ProtocolError` describing why the line was rejected
///
pub fn parse_line(raw: &str) -> Result<Line, ProtocolError> {
    let mut tokens = raw.split_whitespace();
    let first = tokens.next().ok_or(ProtocolError::Empty)?;

    let (seq, op_token) = if let Some(rest) = first.strip_prefix('N') {
        let seq: u64 = rest
            .parse()
            .map_err(|_| ProtocolError::BadSeq(first.to_owned()))?;
        let op = tokens.next().ok_or(ProtocolError::MissingSeq)?;
        (seq, op)
    } else {
        (0, first)
    };

    let mut x = None;
    let mut y = None;
    let mut f = None;
    let mut s = None;

    for tok in tokens {
        let (letter, value) = tok.split_at(1);
        let parsed: f64 = value
            .parse()
            .map_err(|_| ProtocolError::BadParam(tok.to_owned()))?;
        match letter {
            "X" => x = Some(parsed),
            "Y" => y = Some(parsed),
            "F" => f = Some(parsed),
            "S" => s = Some(parsed),
            _ => return Err(ProtocolError::UnknownParam(tok.to_owned())),
        }
    }

    let command = match op_token {
        "G0" => Command::Rapid { x, y, feed: f },
        "G1" => Command::Draw { x, y, feed: f },
        "G28" => Command::Home,
        "M3" => Command::FlowOn {
            duty: s.unwrap_or(0.0).clamp(0.0, 100.0) as u8,
        },
        "M5" => Command::FlowOff,
        "M114" => Command::ReportPos,
        "M408" => Command::ReportStatus,
        other => return Err(ProtocolError::UnknownOp(other.to_owned())),
    };

    Ok(Line { seq, command })
}

///
/// The closed set of wire error codes (controller -> host).
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    Parse,
    Seq,
    Gap,
    NotHomed,
    Limit,
    Endstop,
    HomingFail,
    BusyState,
    Heartbeat,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            ErrorCode::Parse => "PARSE",
            ErrorCode::Seq => "SEQ",
            ErrorCode::Gap => "GAP",
            ErrorCode::NotHomed => "NOT_HOMED",
            ErrorCode::Limit => "LIMIT",
            ErrorCode::Endstop => "ENDSTOP",
            ErrorCode::HomingFail => "HOMING_FAIL",
            ErrorCode::BusyState => "BUSY_STATE",
            ErrorCode::Heartbeat => "HEARTBEAT",
        };
        write!(f, "{token}")
    }
}

///
/// The unsolicited telemetry payload, emitted at ~1 Hz.
///
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryFrame {
    pub pos: (f64, f64),
    pub flow: u8,
    pub q: usize,
    pub state: String,
    /// Supplemented field (see SPEC_FULL.md §3): lets the host resume a
    /// dropped stream without scanning telemetry history.
    pub last_acked_seq: u64,
}

///
/// One reply the controller can emit, per spec.md §6's reply grammar.
///
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok {
        seq: u64,
    },
    Err {
        seq: Option<u64>,
        code: ErrorCode,
    },
    Busy {
        q: usize,
        state: String,
    },
    Telemetry(TelemetryFrame),
    Pos {
        x: f64,
        y: f64,
    },
    Status {
        state: String,
        q: usize,
        flow: u8,
        sauce_on: bool,
        last_acked_seq: u64,
    },
}

impl Reply {
    /// Renders this reply as a wire line, without a trailing newline.
    pub fn to_wire(&self) -> String {
        match self {
            Reply::Ok { seq } => format!("ok N{seq}"),
            Reply::Err {
                seq: Some(seq),
                code,
            } => format!("err N{seq} code={code}"),
            Reply::Err { seq: None, code } => format!("err code={code}"),
            Reply::Busy { q, state } => format!("busy q={q} state={state}"),
            Reply::Telemetry(frame) => format!(
                "telemetry {}",
                serde_json::to_string(frame).unwrap_or_default()
            ),
            Reply::Pos { x, y } => format!("pos X:{x} Y:{y}"),
            Reply::Status {
                state,
                q,
                flow,
                sauce_on,
                last_acked_seq,
            } => {
                format!(
                    "status state={state} q={q} flow={flow} sauce={} last_ack={last_acked_seq}",
                    if *sauce_on { "ON" } else { "OFF" }
                )
            }
        }
    }
}

use thiserror::Error;

///
/// Errors emitted while parsing a raw SSG line into a `Line`.
///
/// - `Empty`: The line had no tokens at all.
/// - `BadSeq`: The `N<seq>` token was present but not a valid integer.
/// - `MissingSeq`: A sequenced op was sent with no `N<seq>` token.
/// - `UnknownOp`: The op token did not match any of `G0 G1 G28 M3 M5 M114 M408`.
/// - `BadParam`: A parameter token's value did not parse as a number.
/// - `UnknownParam`: A parameter letter outside `X Y F S`.
///
#[derive(Error, Debug, PartialEq)]
pub enum ProtocolError {
    #[error("Empty line")]
    Empty,

    #[error("Malformed sequence token: {0}")]
    BadSeq(String),

    #[error("Sequenced command missing its N<seq> token")]
    MissingSeq,

    #[error("Unknown op: {0}")]
    UnknownOp(String),

    #[error("Malformed parameter value in token: {0}")]
    BadParam(String),

    #[error("Unknown parameter letter in token: {0}")]
    UnknownParam(String),
}

use thiserror::Error;

///
/// Errors surfaced by the host-side streamer (C8).
///
#[derive(Error, Debug)]
pub enum StreamerError {
    #[error("connection closed by controller")]
    ConnectionClosed,

    #[error("command seq {seq} exhausted its retry budget ({retries} attempts)")]
    RetriesExhausted { seq: u64, retries: u32 },

    #[error("controller reported a fatal error on seq {seq:?}: {code}")]
    ControllerError { seq: Option<u64>, code: String },

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

use thiserror::Error;

///
/// Errors emitted from the command queue module.
///
/// - `Full`: The queue was already at its configured capacity.
///
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("Command queue is full (capacity {capacity})")]
    Full { capacity: usize },
}

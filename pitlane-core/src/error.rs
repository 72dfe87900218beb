use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid capacity {0} (must be greater than zero)")]
    InvalidCapacity(usize),

    #[error("Unknown packet category: {0}")]
    UnknownCategory(String),

    #[error("Queue for {0} is disconnected")]
    Disconnected(&'static str),
}

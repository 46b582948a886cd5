use thiserror::Error;

use super::types::HardwareStatus;

#[derive(Debug, Error)]
pub enum AcuError {
    #[error("frame length error: expected {expected} bytes, got {actual}")]
    FrameLength { expected: usize, actual: usize },
    #[error("invalid {axis} angle {value}")]
    InvalidAngle { axis: &'static str, value: f64 },
    #[error("unrecognised frame: class {class}, function {function}")]
    UnknownFrame { class: u8, function: u8 },
    #[error("connection error: {0}")]
    Connection(String),
    #[error("ACU reported an error condition")]
    HardwareFault,
    #[error("ACU not ready (status {0})")]
    NotReady(HardwareStatus),
}

impl From<std::io::Error> for AcuError {
    fn from(err: std::io::Error) -> Self {
        AcuError::Connection(err.to_string())
    }
}

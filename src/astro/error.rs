use thiserror::Error;

#[derive(Debug, Error)]
pub enum AstroError {
    #[error("invalid angle '{0}'")]
    InvalidAngle(String),
    #[error("{0} out of range")]
    OutOfRange(String),
    #[error("pointing model: {0}")]
    PointingModel(String),
    #[error("pointing model file: {0}")]
    Io(#[from] std::io::Error),
}

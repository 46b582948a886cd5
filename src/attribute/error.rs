use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AttributeError {
    #[error("attribute '{0}' is already declared")]
    DuplicateKey(String),
    #[error("unknown attribute '{0}'")]
    UnknownKey(String),
}

use thiserror::Error;

use super::types::TelescopeStatus;
use crate::acu::AcuError;
use crate::astro::AstroError;
use crate::attribute::AttributeError;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum TelescopeError {
    #[error("telescope is in state {0}")]
    FatalState(TelescopeStatus),
    #[error("motion commands are blocked while {0}")]
    NotReady(TelescopeStatus),
    #[error("invalid {axis} angle {value}")]
    InvalidAngle { axis: &'static str, value: f64 },
    #[error("command not found: '{0}'")]
    UnknownCommand(String),
    #[error("{command} expects {expected} argument(s), got {actual}")]
    WrongArgumentCount {
        command: &'static str,
        expected: String,
        actual: usize,
    },
    #[error("invalid argument '{0}'")]
    InvalidArgument(String),
    #[error("hardware: {0}")]
    Hardware(#[from] AcuError),
    #[error("attribute: {0}")]
    Attribute(#[from] AttributeError),
    #[error(transparent)]
    Astro(#[from] AstroError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

mod attributes;
mod command;
mod controller;
mod error;
mod types;

pub use command::Command;
pub use controller::{Outcome, Telescope};
pub use error::TelescopeError;
pub use types::{TelescopeReport, TelescopeStatus};

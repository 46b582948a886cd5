mod error;
mod store;
mod types;

pub use error::AttributeError;
pub use store::{AttributeStore, DEFAULT_HISTORY_SIZE};
pub use types::{AccessLevel, AttributeMeta, AttributeSnapshot, TelemetryEvent};

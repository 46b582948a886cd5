pub mod codec;
mod error;
mod hardware;
mod link;
mod simulated;
mod simulator;
mod types;

pub use error::AcuError;
pub use hardware::{Hardware, StatusRequest};
pub use link::DEFAULT_TIMEOUT;
pub use simulated::SimulatedAcu;
pub use simulator::serve;
pub use types::{ElevationRange, HardwareStatus, NormalStatus};

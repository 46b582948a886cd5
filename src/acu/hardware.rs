use super::error::AcuError;
use super::link::AcuLink;
use super::simulated::{SimulatedAcu, SimulatedLink};
use super::types::{ElevationRange, HardwareStatus, NormalStatus};
use crate::config::HardwareConfig;

/// Requests accepted by `set_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRequest {
    Query,
    Standby,
    Stop,
}

/// Hardware backend selected from configuration.
pub enum Hardware {
    Acu(AcuLink),
    Simulated(SimulatedLink),
}

impl Hardware {
    /// Opens the configured backend. An ACU that cannot be reached yet is
    /// not an error: the link starts disconnected and reconnects on its
    /// first exchange.
    pub async fn connect(config: &HardwareConfig, range: ElevationRange) -> Self {
        match config {
            HardwareConfig::Acu {
                host,
                port,
                timeout,
            } => {
                let address = format!("{}:{}", host, port);
                match AcuLink::connect(address.clone(), *timeout, range).await {
                    Ok(link) => Hardware::Acu(link),
                    Err(e) => {
                        log::warn!("ACU at {} not reachable yet: {}", address, e);
                        Hardware::Acu(AcuLink::new(address, *timeout, range))
                    }
                }
            }
            HardwareConfig::Simulated { slew_rate_deg_s } => Hardware::Simulated(
                SimulatedLink::new(SimulatedAcu::new(*slew_rate_deg_s), range),
            ),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Hardware::Acu(_) => "acu",
            Hardware::Simulated(_) => "simulated",
        }
    }

    pub fn status(&self) -> HardwareStatus {
        match self {
            Hardware::Acu(link) => link.status(),
            Hardware::Simulated(link) => link.status(),
        }
    }

    pub fn last_status(&self) -> Option<&NormalStatus> {
        match self {
            Hardware::Acu(link) => link.last_status(),
            Hardware::Simulated(link) => link.last_status(),
        }
    }

    pub async fn point_to(
        &mut self,
        prev_az: f64,
        az: f64,
        el: f64,
    ) -> Result<NormalStatus, AcuError> {
        match self {
            Hardware::Acu(link) => link.point_to(prev_az, az, el).await,
            Hardware::Simulated(link) => link.point_to(prev_az, az, el),
        }
    }

    pub async fn get_status(&mut self) -> Result<HardwareStatus, AcuError> {
        self.set_status(StatusRequest::Query).await
    }

    pub async fn set_status(&mut self, request: StatusRequest) -> Result<HardwareStatus, AcuError> {
        match (self, request) {
            (Hardware::Acu(link), StatusRequest::Query) => link.get_status().await,
            (Hardware::Acu(link), StatusRequest::Standby) => link.standby().await,
            (Hardware::Acu(link), StatusRequest::Stop) => link.stop().await,
            (Hardware::Simulated(link), StatusRequest::Query) => link.get_status(),
            (Hardware::Simulated(link), StatusRequest::Standby) => link.standby(),
            (Hardware::Simulated(link), StatusRequest::Stop) => link.stop(),
        }
    }
}

use serde::Serialize;
use std::fmt;
use strum_macros::Display;

use crate::acu::{HardwareStatus, NormalStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, utoipa::ToSchema)]
pub enum TelescopeStatus {
    #[strum(serialize = "OFF")]
    #[serde(rename = "OFF")]
    Off,
    #[strum(serialize = "IDLE")]
    #[serde(rename = "IDLE")]
    Idle,
    #[strum(serialize = "TRACKAZEL")]
    #[serde(rename = "TRACKAZEL")]
    TrackAzEl,
    #[strum(serialize = "TRACKRADEC")]
    #[serde(rename = "TRACKRADEC")]
    TrackRaDec,
    #[strum(serialize = "LIMIT")]
    #[serde(rename = "LIMIT")]
    Limit,
    #[strum(serialize = "STANDBY")]
    #[serde(rename = "STANDBY")]
    Standby,
    #[strum(serialize = "ACU_ERR")]
    #[serde(rename = "ACU_ERR")]
    AcuErr,
    #[strum(serialize = "DISCONNECT")]
    #[serde(rename = "DISCONNECT")]
    Disconnect,
    #[strum(serialize = "EXIT")]
    #[serde(rename = "EXIT")]
    Exit,
}

impl TelescopeStatus {
    /// States in which target-changing commands are refused.
    pub fn blocks_motion(self) -> bool {
        matches!(
            self,
            TelescopeStatus::AcuErr | TelescopeStatus::Disconnect | TelescopeStatus::Exit
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackMode {
    Idle,
    AzEl,
    RaDec,
}

impl TrackMode {
    pub fn status(self) -> TelescopeStatus {
        match self {
            TrackMode::Idle => TelescopeStatus::Idle,
            TrackMode::AzEl => TelescopeStatus::TrackAzEl,
            TrackMode::RaDec => TelescopeStatus::TrackRaDec,
        }
    }

    /// Telescope status implied by a hardware status in this mode.
    pub fn status_with(self, hardware: HardwareStatus) -> TelescopeStatus {
        match hardware {
            HardwareStatus::Health | HardwareStatus::PowerOff => self.status(),
            HardwareStatus::Standby => TelescopeStatus::Standby,
            HardwareStatus::AcuError => TelescopeStatus::AcuErr,
            HardwareStatus::Disconnected => TelescopeStatus::Disconnect,
        }
    }
}

/// Shared antenna state. All angles in degrees.
#[derive(Debug, Clone)]
pub struct TelescopeState {
    pub status: TelescopeStatus,
    pub mode: TrackMode,
    pub commanded_az: f64,
    pub commanded_el: f64,
    pub target_ra: f64,
    pub target_dec: f64,
    pub az_offset: f64,
    pub el_offset: f64,
    pub current_az: f64,
    pub current_el: f64,
    /// Position commanded on the last tick, offsets and corrections included.
    pub desired: Option<(f64, f64)>,
    /// Azimuth of the last accepted track-on frame, for the winding flag.
    pub previous_az: f64,
    pub source_name: String,
}

impl Default for TelescopeState {
    fn default() -> Self {
        Self {
            status: TelescopeStatus::Off,
            mode: TrackMode::Idle,
            commanded_az: 0.0,
            commanded_el: 0.0,
            target_ra: 0.0,
            target_dec: 0.0,
            az_offset: 0.0,
            el_offset: 0.0,
            current_az: 0.0,
            current_el: 0.0,
            desired: None,
            previous_az: 0.0,
            source_name: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AxisReport {
    pub obj: Option<f64>,
    pub off: f64,
    pub current: f64,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HardwareReport {
    pub kind: String,
    pub status: HardwareStatus,
    pub last_status: Option<NormalStatus>,
}

/// Snapshot returned by `Tell`.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct TelescopeReport {
    pub status: TelescopeStatus,
    pub source: String,
    pub az: AxisReport,
    pub el: AxisReport,
    pub ra_obj: f64,
    pub dec_obj: f64,
    pub pointing_model: String,
    pub pointing_ready: bool,
    pub control_loop_running: bool,
    pub hardware: HardwareReport,
}

impl fmt::Display for TelescopeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let obj = |v: Option<f64>| v.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".into());
        writeln!(f, "------ STATUS: {} -------", self.status)?;
        writeln!(f, "Source: {}", self.source)?;
        writeln!(
            f,
            "AZ_obj: {} AZ_off: {:.4} AZ_current: {:.4}",
            obj(self.az.obj),
            self.az.off,
            self.az.current
        )?;
        writeln!(
            f,
            "EL_obj: {} EL_off: {:.4} EL_current: {:.4}",
            obj(self.el.obj),
            self.el.off,
            self.el.current
        )?;
        writeln!(f, "------------ RA and DEC ------------")?;
        writeln!(f, "RA_obj: {:.6}", self.ra_obj)?;
        writeln!(f, "DEC_obj: {:.6}", self.dec_obj)?;
        writeln!(f, "----------- Pointing model ---------")?;
        writeln!(f, "{}", self.pointing_model)?;
        writeln!(f, "----------- Pointing state ---------")?;
        writeln!(
            f,
            "Pointing {}",
            if self.pointing_ready { "ready" } else { "NOT ready" }
        )?;
        writeln!(
            f,
            "Control loop {}",
            if self.control_loop_running { "started" } else { "stopped" }
        )?;
        writeln!(f, "----------- Hardware status --------")?;
        writeln!(f, "Backend: {}", self.hardware.kind)?;
        if let Some(hw) = &self.hardware.last_status {
            writeln!(f, "AZ= {:.4}", hw.azimuth_deg)?;
            writeln!(f, "EL= {:.4}", hw.elevation_deg)?;
            writeln!(f, "INOUT= {}", hw.outside_circle as u8)?;
            writeln!(f, "AZ Speed= {:.4}", hw.azimuth_speed_deg_s)?;
            writeln!(f, "EL Speed= {:.4}", hw.elevation_speed_deg_s)?;
        }
        write!(f, "Status: {}", self.hardware.status)
    }
}

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Mechanical elevation range accepted by the ACU, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ElevationRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ElevationRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 90.0,
        }
    }
}

impl ElevationRange {
    pub fn contains(&self, el: f64) -> bool {
        el >= self.min && el <= self.max
    }
}

/// State of the ACU as last reported over the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HardwareStatus {
    #[strum(serialize = "HEALTH")]
    Health,
    #[strum(serialize = "STANDBY")]
    Standby,
    #[strum(serialize = "POWEROFF")]
    PowerOff,
    #[strum(serialize = "ACU_ERR")]
    AcuError,
    #[strum(serialize = "DISCONNECT")]
    Disconnected,
}

impl HardwareStatus {
    /// Motion commands are only accepted in these states.
    pub fn accepts_motion(self) -> bool {
        matches!(self, HardwareStatus::Health | HardwareStatus::PowerOff)
    }
}

/// Cable-wrap direction flag carried by every track-on frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    NoChange,
    NegToPos,
    PosToNeg,
}

impl Winding {
    pub const BOUNDARY_DEG: f64 = 180.0;

    pub fn between(prev_az: f64, next_az: f64) -> Self {
        let prev_pos = prev_az >= Self::BOUNDARY_DEG;
        let next_pos = next_az >= Self::BOUNDARY_DEG;
        match (prev_pos, next_pos) {
            (false, true) => Winding::NegToPos,
            (true, false) => Winding::PosToNeg,
            _ => Winding::NoChange,
        }
    }

    pub fn flag(self) -> u8 {
        match self {
            Winding::NoChange => 0,
            Winding::NegToPos => 1,
            Winding::PosToNeg => 2,
        }
    }

    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Winding::NoChange),
            1 => Some(Winding::NegToPos),
            2 => Some(Winding::PosToNeg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AzimuthMotion {
    Stopped,
    Right,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ElevationMotion {
    Stopped,
    Up,
    Down,
}

/// Decoded 30-byte normal status reply.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct NormalStatus {
    pub remote_control: u8,
    pub powered_off: bool,
    pub outside_circle: bool,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub azimuth_motion: AzimuthMotion,
    pub elevation_motion: ElevationMotion,
    pub azimuth_speed_deg_s: f64,
    pub elevation_speed_deg_s: f64,
    pub azimuth_switch: u8,
    pub elevation_switch: u8,
    #[schema(value_type = Vec<u8>)]
    pub trailer: [u8; 2],
}

impl NormalStatus {
    pub fn hardware_status(&self) -> HardwareStatus {
        if self.powered_off {
            HardwareStatus::PowerOff
        } else {
            HardwareStatus::Health
        }
    }
}

/// Decoded 10-byte error status reply. The fault cause is not known
/// beyond the raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorStatus {
    pub raw: Vec<u8>,
}

/// A reply frame classified by length.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Normal(NormalStatus),
    Error(ErrorStatus),
    Ack,
}

impl Reply {
    pub fn hardware_status(&self) -> HardwareStatus {
        match self {
            Reply::Normal(status) => status.hardware_status(),
            Reply::Error(_) => HardwareStatus::AcuError,
            Reply::Ack => HardwareStatus::Standby,
        }
    }
}

/// Outbound command as seen by the ACU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcuCommand {
    TrackOn {
        winding: Winding,
        azimuth_deg: f64,
        elevation_deg: f64,
    },
    Stop {
        stage: u8,
    },
    Query,
    Standby,
}

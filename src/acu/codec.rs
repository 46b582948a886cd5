//! Frame layouts for the ACU link.
//!
//! Every frame starts with the `FS` identifier, a little-endian `u16`
//! frame length, the equipment id, the frame class and the frame function,
//! and ends with a two-byte trailer. The trailer is a fixed placeholder:
//! the ACU does not check it and nothing here computes or verifies it.

use std::fmt;

use super::error::AcuError;
use super::types::{
    AcuCommand, AzimuthMotion, ElevationMotion, ElevationRange, ErrorStatus, NormalStatus, Winding,
};

pub const IDENTIFIER: [u8; 2] = *b"FS";
pub const TRAILER: [u8; 2] = [0, 0];

/// Equipment id of the control computer (outbound frames).
pub const EQUIPMENT_CONTROL: u8 = 1;
/// Equipment id of the ACU (reply frames).
pub const EQUIPMENT_ACU: u8 = 2;

pub const TRACK_ON_LEN: usize = 18;
pub const STOP_LEN: usize = 13;
pub const SHORT_LEN: usize = 9;
pub const NORMAL_STATUS_LEN: usize = 30;
pub const ERROR_STATUS_LEN: usize = 10;
pub const MAX_REPLY_LEN: usize = NORMAL_STATUS_LEN;

const CLASS_CONTROL: u8 = 0;
const CLASS_QUERY: u8 = 16;
const CLASS_STATUS: u8 = 17;
const CLASS_ERROR: u8 = 2;

const FUNC_STANDBY: u8 = 1;
const FUNC_STOP: u8 = 3;
const FUNC_TRACK_ON: u8 = 5;
const FUNC_QUERY: u8 = 1;
const FUNC_STATUS: u8 = 1;
const FUNC_ERROR: u8 = 4;

const ANGLE_SCALE: f64 = 10_000.0;

/// A complete frame, ready to be written to the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

struct FrameBuilder {
    buf: Vec<u8>,
}

impl FrameBuilder {
    fn new(len: usize, equipment: u8, class: u8, function: u8) -> Self {
        let mut buf = Vec::with_capacity(len);
        buf.extend_from_slice(&IDENTIFIER);
        buf.extend_from_slice(&(len as u16).to_le_bytes());
        buf.extend_from_slice(&[equipment, class, function]);
        Self { buf }
    }

    fn u8(mut self, v: u8) -> Self {
        self.buf.push(v);
        self
    }

    fn u16(mut self, v: u16) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn u32(mut self, v: u32) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn finish(mut self) -> Frame {
        self.buf.extend_from_slice(&TRAILER);
        Frame(self.buf)
    }
}

pub fn encode_angle(deg: f64) -> u32 {
    (deg * ANGLE_SCALE).round() as u32
}

/// Like [`encode_angle`], but fails for angles the `u32` field cannot
/// carry instead of saturating.
fn checked_angle(axis: &'static str, deg: f64) -> Result<u32, AcuError> {
    let raw = (deg * ANGLE_SCALE).round();
    if !raw.is_finite() || raw < 0.0 || raw > u32::MAX as f64 {
        return Err(AcuError::InvalidAngle { axis, value: deg });
    }
    Ok(raw as u32)
}

pub fn decode_angle(raw: u32) -> f64 {
    raw as f64 / ANGLE_SCALE
}

fn encode_speed(deg_s: f64) -> u16 {
    (deg_s.abs() * ANGLE_SCALE).round().min(u16::MAX as f64) as u16
}

fn decode_speed(raw: u16) -> f64 {
    raw as f64 / ANGLE_SCALE
}

pub fn encode_track_on(
    prev_az: f64,
    az: f64,
    el: f64,
    range: &ElevationRange,
) -> Result<Frame, AcuError> {
    if !(0.0..360.0).contains(&az) {
        return Err(AcuError::InvalidAngle {
            axis: "azimuth",
            value: az,
        });
    }
    if !range.contains(el) {
        return Err(AcuError::InvalidAngle {
            axis: "elevation",
            value: el,
        });
    }

    let raw_az = checked_angle("azimuth", az)?;
    let raw_el = checked_angle("elevation", el)?;
    let winding = Winding::between(prev_az, az);
    Ok(
        FrameBuilder::new(TRACK_ON_LEN, EQUIPMENT_CONTROL, CLASS_CONTROL, FUNC_TRACK_ON)
            .u8(winding.flag())
            .u32(raw_az)
            .u32(raw_el)
            .finish(),
    )
}

/// The two stop frames, to be sent in order.
pub fn encode_stop() -> (Frame, Frame) {
    let stage = |marker: u8| {
        FrameBuilder::new(STOP_LEN, EQUIPMENT_CONTROL, CLASS_CONTROL, FUNC_STOP)
            .u8(marker)
            .u8(0)
            .u8(0)
            .u8(0)
            .finish()
    };
    (stage(1), stage(2))
}

pub fn encode_query() -> Frame {
    FrameBuilder::new(SHORT_LEN, EQUIPMENT_CONTROL, CLASS_QUERY, FUNC_QUERY).finish()
}

pub fn encode_standby() -> Frame {
    FrameBuilder::new(SHORT_LEN, EQUIPMENT_CONTROL, CLASS_CONTROL, FUNC_STANDBY).finish()
}

fn expect_len(bytes: &[u8], expected: usize) -> Result<(), AcuError> {
    if bytes.len() != expected {
        return Err(AcuError::FrameLength {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

pub fn decode_normal_status(bytes: &[u8]) -> Result<NormalStatus, AcuError> {
    expect_len(bytes, NORMAL_STATUS_LEN)?;

    let azimuth_motion = match bytes[20] {
        1 => AzimuthMotion::Right,
        2 => AzimuthMotion::Left,
        _ => AzimuthMotion::Stopped,
    };
    let elevation_motion = match bytes[21] {
        1 => ElevationMotion::Up,
        2 => ElevationMotion::Down,
        _ => ElevationMotion::Stopped,
    };

    Ok(NormalStatus {
        remote_control: bytes[9],
        powered_off: bytes[10] == 1,
        outside_circle: bytes[11] == 1,
        azimuth_deg: decode_angle(read_u32(bytes, 12)),
        elevation_deg: decode_angle(read_u32(bytes, 16)),
        azimuth_motion,
        elevation_motion,
        azimuth_speed_deg_s: decode_speed(read_u16(bytes, 22)),
        elevation_speed_deg_s: decode_speed(read_u16(bytes, 24)),
        azimuth_switch: bytes[26],
        elevation_switch: bytes[27],
        trailer: [bytes[28], bytes[29]],
    })
}

pub fn decode_error_status(bytes: &[u8]) -> Result<ErrorStatus, AcuError> {
    expect_len(bytes, ERROR_STATUS_LEN)?;
    Ok(ErrorStatus {
        raw: bytes.to_vec(),
    })
}

/// Decodes a frame received by the ACU. Used by the simulator.
pub fn decode_command(bytes: &[u8]) -> Result<AcuCommand, AcuError> {
    if bytes.len() < SHORT_LEN {
        return Err(AcuError::FrameLength {
            expected: SHORT_LEN,
            actual: bytes.len(),
        });
    }
    let (class, function) = (bytes[5], bytes[6]);
    match (class, function) {
        (CLASS_CONTROL, FUNC_TRACK_ON) => {
            expect_len(bytes, TRACK_ON_LEN)?;
            let winding = Winding::from_flag(bytes[7]).unwrap_or(Winding::NoChange);
            Ok(AcuCommand::TrackOn {
                winding,
                azimuth_deg: decode_angle(read_u32(bytes, 8)),
                elevation_deg: decode_angle(read_u32(bytes, 12)),
            })
        }
        (CLASS_CONTROL, FUNC_STOP) => {
            expect_len(bytes, STOP_LEN)?;
            Ok(AcuCommand::Stop { stage: bytes[7] })
        }
        (CLASS_QUERY, FUNC_QUERY) => {
            expect_len(bytes, SHORT_LEN)?;
            Ok(AcuCommand::Query)
        }
        (CLASS_CONTROL, FUNC_STANDBY) => {
            expect_len(bytes, SHORT_LEN)?;
            Ok(AcuCommand::Standby)
        }
        _ => Err(AcuError::UnknownFrame { class, function }),
    }
}

/// Builds the 30-byte status reply. Used by the simulator.
pub fn encode_normal_status(status: &NormalStatus) -> Frame {
    let azimuth_motion = match status.azimuth_motion {
        AzimuthMotion::Stopped => 0,
        AzimuthMotion::Right => 1,
        AzimuthMotion::Left => 2,
    };
    let elevation_motion = match status.elevation_motion {
        ElevationMotion::Stopped => 0,
        ElevationMotion::Up => 1,
        ElevationMotion::Down => 2,
    };
    FrameBuilder::new(NORMAL_STATUS_LEN, EQUIPMENT_ACU, CLASS_STATUS, FUNC_STATUS)
        .u8(0)
        .u8(0)
        .u8(status.remote_control)
        .u8(status.powered_off as u8)
        .u8(status.outside_circle as u8)
        .u32(encode_angle(status.azimuth_deg))
        .u32(encode_angle(status.elevation_deg))
        .u8(azimuth_motion)
        .u8(elevation_motion)
        .u16(encode_speed(status.azimuth_speed_deg_s))
        .u16(encode_speed(status.elevation_speed_deg_s))
        .u8(status.azimuth_switch)
        .u8(status.elevation_switch)
        .finish()
}

pub fn encode_error_status() -> Frame {
    FrameBuilder::new(ERROR_STATUS_LEN, EQUIPMENT_ACU, CLASS_ERROR, FUNC_ERROR)
        .u8(3)
        .finish()
}

/// Short acknowledgement the ACU sends while in standby.
pub fn encode_ack() -> Frame {
    FrameBuilder::new(SHORT_LEN, EQUIPMENT_ACU, CLASS_CONTROL, FUNC_STANDBY).finish()
}

use std::time::Instant;

use super::codec::{
    decode_command, encode_ack, encode_error_status, encode_normal_status, encode_query,
    encode_standby, encode_stop, encode_track_on, Frame,
};
use super::error::AcuError;
use super::link::motion_reply;
use super::types::{
    AcuCommand, AzimuthMotion, ElevationMotion, ElevationRange, HardwareStatus, NormalStatus,
    Reply,
};

/// Mount model behind the simulated ACU. Moves both axes toward the last
/// track-on target at a fixed rate, or jumps there when no rate is set.
#[derive(Debug, Clone)]
pub struct SimulatedAcu {
    azimuth_deg: f64,
    elevation_deg: f64,
    target: Option<(f64, f64)>,
    slew_rate_deg_s: Option<f64>,
    standby: bool,
    azimuth_speed: f64,
    elevation_speed: f64,
    azimuth_motion: AzimuthMotion,
    elevation_motion: ElevationMotion,
    last_update: Instant,
}

impl SimulatedAcu {
    pub fn new(slew_rate_deg_s: Option<f64>) -> Self {
        Self {
            azimuth_deg: 0.0,
            elevation_deg: 90.0,
            target: None,
            slew_rate_deg_s,
            standby: false,
            azimuth_speed: 0.0,
            elevation_speed: 0.0,
            azimuth_motion: AzimuthMotion::Stopped,
            elevation_motion: ElevationMotion::Stopped,
            last_update: Instant::now(),
        }
    }

    /// Applies one command. Stage one of the stop pair produces no reply.
    pub fn apply(&mut self, command: AcuCommand) -> Option<Reply> {
        self.advance(Instant::now());
        match command {
            AcuCommand::TrackOn {
                azimuth_deg,
                elevation_deg,
                ..
            } => {
                self.standby = false;
                self.target = Some((azimuth_deg, elevation_deg));
                self.advance(Instant::now());
                Some(Reply::Normal(self.status()))
            }
            AcuCommand::Stop { stage } => {
                self.halt();
                (stage >= 2).then(|| Reply::Normal(self.status()))
            }
            AcuCommand::Query if self.standby => Some(Reply::Ack),
            AcuCommand::Query => Some(Reply::Normal(self.status())),
            AcuCommand::Standby => {
                self.halt();
                self.standby = true;
                Some(Reply::Ack)
            }
        }
    }

    fn halt(&mut self) {
        self.target = None;
        self.azimuth_speed = 0.0;
        self.elevation_speed = 0.0;
        self.azimuth_motion = AzimuthMotion::Stopped;
        self.elevation_motion = ElevationMotion::Stopped;
    }

    fn advance(&mut self, now: Instant) {
        let dt = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        let Some((az, el)) = self.target else {
            return;
        };

        let step = self.slew_rate_deg_s.map(|rate| rate * dt);
        let (new_az, az_speed) = approach(self.azimuth_deg, az, step, dt);
        let (new_el, el_speed) = approach(self.elevation_deg, el, step, dt);

        self.azimuth_motion = match new_az.partial_cmp(&self.azimuth_deg) {
            Some(std::cmp::Ordering::Greater) => AzimuthMotion::Right,
            Some(std::cmp::Ordering::Less) => AzimuthMotion::Left,
            _ => AzimuthMotion::Stopped,
        };
        self.elevation_motion = match new_el.partial_cmp(&self.elevation_deg) {
            Some(std::cmp::Ordering::Greater) => ElevationMotion::Up,
            Some(std::cmp::Ordering::Less) => ElevationMotion::Down,
            _ => ElevationMotion::Stopped,
        };
        self.azimuth_deg = new_az;
        self.elevation_deg = new_el;
        self.azimuth_speed = az_speed;
        self.elevation_speed = el_speed;
    }

    pub fn status(&self) -> NormalStatus {
        NormalStatus {
            remote_control: 3,
            powered_off: false,
            outside_circle: self.azimuth_deg >= 180.0,
            azimuth_deg: self.azimuth_deg,
            elevation_deg: self.elevation_deg,
            azimuth_motion: self.azimuth_motion,
            elevation_motion: self.elevation_motion,
            azimuth_speed_deg_s: self.azimuth_speed,
            elevation_speed_deg_s: self.elevation_speed,
            azimuth_switch: if self.azimuth_deg >= 180.0 { 0x11 } else { 0x12 },
            elevation_switch: 0x12,
            trailer: [0, 0],
        }
    }
}

fn approach(current: f64, target: f64, step: Option<f64>, dt: f64) -> (f64, f64) {
    let delta = target - current;
    match step {
        Some(step) if delta.abs() > step => {
            let speed = if dt > 0.0 { step / dt } else { 0.0 };
            (current + step.copysign(delta), speed)
        }
        _ => (target, 0.0),
    }
}

pub fn encode_reply(reply: &Reply) -> Frame {
    match reply {
        Reply::Normal(status) => encode_normal_status(status),
        Reply::Error(_) => encode_error_status(),
        Reply::Ack => encode_ack(),
    }
}

/// In-process stand-in for [`AcuLink`](super::AcuLink). Frames go through
/// the same codec as on the wire.
pub struct SimulatedLink {
    acu: SimulatedAcu,
    range: ElevationRange,
    status: HardwareStatus,
    last_status: Option<NormalStatus>,
}

impl SimulatedLink {
    pub fn new(acu: SimulatedAcu, range: ElevationRange) -> Self {
        Self {
            acu,
            range,
            status: HardwareStatus::Disconnected,
            last_status: None,
        }
    }

    pub fn status(&self) -> HardwareStatus {
        self.status
    }

    pub fn last_status(&self) -> Option<&NormalStatus> {
        self.last_status.as_ref()
    }

    fn exchange(&mut self, frames: &[&Frame]) -> Result<Reply, AcuError> {
        let mut reply = None;
        for frame in frames {
            log::debug!("SIM <- {}", frame);
            reply = self.acu.apply(decode_command(frame.as_bytes())?);
        }
        let reply =
            reply.ok_or_else(|| AcuError::Connection("simulated ACU sent no reply".into()))?;
        self.status = reply.hardware_status();
        if let Reply::Normal(status) = &reply {
            self.last_status = Some(status.clone());
        }
        Ok(reply)
    }

    pub fn get_status(&mut self) -> Result<HardwareStatus, AcuError> {
        self.exchange(&[&encode_query()])
            .map(|reply| reply.hardware_status())
    }

    pub fn standby(&mut self) -> Result<HardwareStatus, AcuError> {
        self.exchange(&[&encode_standby()])
            .map(|reply| reply.hardware_status())
    }

    pub fn stop(&mut self) -> Result<HardwareStatus, AcuError> {
        let (first, second) = encode_stop();
        self.exchange(&[&first, &second])
            .map(|reply| reply.hardware_status())
    }

    pub fn point_to(&mut self, prev_az: f64, az: f64, el: f64) -> Result<NormalStatus, AcuError> {
        if !self.status.accepts_motion() {
            return Err(AcuError::NotReady(self.status));
        }
        let frame = encode_track_on(prev_az, az, el, &self.range)?;
        motion_reply(self.exchange(&[&frame])?)
    }
}

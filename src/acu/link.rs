use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::codec::{
    decode_error_status, decode_normal_status, encode_query, encode_standby, encode_stop,
    encode_track_on, Frame, ERROR_STATUS_LEN, MAX_REPLY_LEN, NORMAL_STATUS_LEN, SHORT_LEN,
};
use super::error::AcuError;
use super::types::{ElevationRange, HardwareStatus, NormalStatus, Reply};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maps a reply length to its meaning. Anything that is not a normal
/// status, an error status or a short acknowledgement is treated as a
/// broken connection.
pub fn classify_reply(bytes: &[u8]) -> Result<Reply, AcuError> {
    match bytes.len() {
        NORMAL_STATUS_LEN => decode_normal_status(bytes).map(Reply::Normal),
        ERROR_STATUS_LEN => decode_error_status(bytes).map(Reply::Error),
        SHORT_LEN => Ok(Reply::Ack),
        n => Err(AcuError::Connection(format!("unexpected reply length {}", n))),
    }
}

/// Motion replies must carry a normal status.
pub(super) fn motion_reply(reply: Reply) -> Result<NormalStatus, AcuError> {
    match reply {
        Reply::Normal(status) => Ok(status),
        Reply::Error(_) => Err(AcuError::HardwareFault),
        Reply::Ack => Err(AcuError::NotReady(HardwareStatus::Standby)),
    }
}

/// Persistent TCP connection to the ACU. One request frame (or the stop
/// pair) is answered by exactly one reply frame.
pub struct AcuLink {
    address: String,
    timeout: Duration,
    range: ElevationRange,
    stream: Option<TcpStream>,
    status: HardwareStatus,
    last_status: Option<NormalStatus>,
}

impl AcuLink {
    /// Creates a link without connecting. The first exchange connects.
    pub fn new(address: impl Into<String>, timeout: Duration, range: ElevationRange) -> Self {
        Self {
            address: address.into(),
            timeout,
            range,
            stream: None,
            status: HardwareStatus::Disconnected,
            last_status: None,
        }
    }

    pub async fn connect(
        address: impl Into<String>,
        timeout: Duration,
        range: ElevationRange,
    ) -> Result<Self, AcuError> {
        let mut link = Self::new(address, timeout, range);
        link.open().await?;
        Ok(link)
    }

    async fn open(&mut self) -> Result<(), AcuError> {
        let stream = timeout(self.timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                AcuError::Connection(format!("connect to {} timed out", self.address))
            })??;
        stream.set_nodelay(true)?;
        log::info!("Connected to ACU at {}", self.address);
        self.stream = Some(stream);
        Ok(())
    }

    pub fn status(&self) -> HardwareStatus {
        self.status
    }

    pub fn last_status(&self) -> Option<&NormalStatus> {
        self.last_status.as_ref()
    }

    /// Writes the frames in order and reads a single reply. Reconnects
    /// first if the previous exchange dropped the connection.
    pub async fn send_and_receive(&mut self, frames: &[&Frame]) -> Result<Vec<u8>, AcuError> {
        if self.stream.is_none() {
            self.open().await?;
        }
        let limit = self.timeout;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| AcuError::Connection("not connected".into()))?;

        for frame in frames {
            log::debug!("ACU <- {}", frame);
            timeout(limit, stream.write_all(frame.as_bytes()))
                .await
                .map_err(|_| AcuError::Connection("write timed out".into()))??;
        }

        let reply = read_reply(stream, limit).await?;
        log::debug!("ACU -> {} ({} bytes)", hex::encode(&reply), reply.len());
        Ok(reply)
    }

    async fn exchange(&mut self, frames: &[&Frame]) -> Result<Reply, AcuError> {
        let outcome = match self.send_and_receive(frames).await {
            Ok(bytes) => classify_reply(&bytes),
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(reply) => {
                let status = reply.hardware_status();
                if status != self.status {
                    log::info!("ACU status {} -> {}", self.status, status);
                }
                self.status = status;
                match reply {
                    Reply::Normal(normal) => self.last_status = Some(normal.clone()),
                    Reply::Error(err) => {
                        log::warn!("ACU error status: {}", hex::encode(&err.raw))
                    }
                    Reply::Ack => {}
                }
            }
            Err(e) => {
                log::warn!("ACU link to {} failed: {}", self.address, e);
                self.stream = None;
                self.status = HardwareStatus::Disconnected;
            }
        }

        outcome
    }

    /// Sends a query frame and refreshes the hardware status.
    pub async fn get_status(&mut self) -> Result<HardwareStatus, AcuError> {
        self.exchange(&[&encode_query()])
            .await
            .map(|reply| reply.hardware_status())
    }

    pub async fn standby(&mut self) -> Result<HardwareStatus, AcuError> {
        self.exchange(&[&encode_standby()])
            .await
            .map(|reply| reply.hardware_status())
    }

    pub async fn stop(&mut self) -> Result<HardwareStatus, AcuError> {
        let (first, second) = encode_stop();
        self.exchange(&[&first, &second])
            .await
            .map(|reply| reply.hardware_status())
    }

    pub async fn point_to(
        &mut self,
        prev_az: f64,
        az: f64,
        el: f64,
    ) -> Result<NormalStatus, AcuError> {
        if !self.status.accepts_motion() {
            return Err(AcuError::NotReady(self.status));
        }
        let frame = encode_track_on(prev_az, az, el, &self.range)?;
        motion_reply(self.exchange(&[&frame]).await?)
    }
}

/// Reads until the length announced in the frame header has arrived, the
/// reply buffer is full, or the peer closes the connection.
async fn read_reply(stream: &mut TcpStream, limit: Duration) -> Result<Vec<u8>, AcuError> {
    let mut buf = [0u8; MAX_REPLY_LEN];
    let mut filled = 0;

    while filled < MAX_REPLY_LEN {
        let n = timeout(limit, stream.read(&mut buf[filled..]))
            .await
            .map_err(|_| AcuError::Connection("read timed out".into()))??;
        if n == 0 {
            break;
        }
        filled += n;
        if filled >= 4 {
            let declared = u16::from_le_bytes([buf[2], buf[3]]) as usize;
            if declared <= filled || declared > MAX_REPLY_LEN {
                break;
            }
        }
    }

    if filled == 0 {
        return Err(AcuError::Connection("connection closed by ACU".into()));
    }
    Ok(buf[..filled].to_vec())
}

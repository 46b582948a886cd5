use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use super::codec::{decode_command, encode_error_status, IDENTIFIER, SHORT_LEN};
use super::error::AcuError;
use super::simulated::{encode_reply, SimulatedAcu};

const MAX_COMMAND_LEN: usize = 64;

/// Serves the ACU wire protocol on `listener`, one task per connection,
/// all sharing the same simulated mount.
pub async fn serve(listener: TcpListener, acu: SimulatedAcu) -> std::io::Result<()> {
    let acu = Arc::new(Mutex::new(acu));
    log::info!("Simulated ACU listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        log::info!("Control computer connected from {}", peer);
        let acu = acu.clone();
        tokio::spawn(async move {
            match handle_connection(stream, acu).await {
                Ok(()) => log::info!("Control computer {} disconnected", peer),
                Err(e) => log::warn!("Connection from {} closed: {}", peer, e),
            }
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    acu: Arc<Mutex<SimulatedAcu>>,
) -> Result<(), AcuError> {
    loop {
        let mut header = [0u8; 4];
        match stream.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        if header[..2] != IDENTIFIER {
            return Err(AcuError::Connection(format!(
                "bad frame identifier {}",
                hex::encode(&header[..2])
            )));
        }
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;
        if !(SHORT_LEN..=MAX_COMMAND_LEN).contains(&len) {
            return Err(AcuError::FrameLength {
                expected: SHORT_LEN,
                actual: len,
            });
        }

        let mut frame = vec![0u8; len];
        frame[..4].copy_from_slice(&header);
        stream.read_exact(&mut frame[4..]).await?;
        log::debug!("SIM <- {}", hex::encode(&frame));

        let reply = match decode_command(&frame) {
            Ok(command) => acu.lock().await.apply(command).map(|r| encode_reply(&r)),
            Err(e) => {
                log::warn!("Rejecting frame: {}", e);
                Some(encode_error_status())
            }
        };
        if let Some(reply) = reply {
            log::debug!("SIM -> {}", reply);
            stream.write_all(reply.as_bytes()).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acu::link::AcuLink;
    use crate::acu::types::{ElevationRange, HardwareStatus};
    use std::time::Duration;

    async fn start() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(serve(listener, SimulatedAcu::new(None)));
        addr
    }

    #[tokio::test]
    async fn link_drives_simulator_over_tcp() {
        let addr = start().await;
        let mut link = AcuLink::connect(addr, Duration::from_secs(1), ElevationRange::default())
            .await
            .unwrap();
        assert_eq!(link.get_status().await.unwrap(), HardwareStatus::Health);

        let status = link.point_to(0.0, 200.0, 30.0).await.unwrap();
        assert_eq!(status.azimuth_deg, 200.0);
        assert_eq!(status.elevation_deg, 30.0);
        assert!(status.outside_circle);

        assert_eq!(link.stop().await.unwrap(), HardwareStatus::Health);
        assert_eq!(link.standby().await.unwrap(), HardwareStatus::Standby);
        assert_eq!(link.get_status().await.unwrap(), HardwareStatus::Standby);
    }
}

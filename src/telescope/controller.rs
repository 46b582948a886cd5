use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::attributes;
use super::command::{Command, USAGE};
use super::error::TelescopeError;
use super::types::{
    AxisReport, HardwareReport, TelescopeReport, TelescopeState, TelescopeStatus, TrackMode,
};
use crate::acu::{AcuError, ElevationRange, Hardware, StatusRequest};
use crate::astro::{CoordinateConverter, PointingModel, SiderealConverter, Site};
use crate::attribute::{AttributeError, AttributeSnapshot, AttributeStore, TelemetryEvent};
use crate::config::{Config, ControlConfig};

#[derive(Debug, Clone, Copy)]
pub struct ControlSettings {
    pub tick: Duration,
    pub elevation_floor_deg: f64,
    pub elevation_range: ElevationRange,
    pub history_size: usize,
    pub ready_tolerance_arcsec: f64,
}

impl From<&ControlConfig> for ControlSettings {
    fn from(config: &ControlConfig) -> Self {
        Self {
            tick: config.tick,
            elevation_floor_deg: config.elevation_floor_deg,
            elevation_range: config.elevation_range_deg,
            history_size: config.history_size,
            ready_tolerance_arcsec: config.ready_tolerance_arcsec,
        }
    }
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self::from(&ControlConfig::default())
    }
}

/// Result of a successfully executed command.
#[derive(Debug)]
pub enum Outcome {
    Report(Box<TelescopeReport>),
    Usage,
    Accepted(TelescopeStatus),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Report(report) => write!(f, "{}", report),
            Outcome::Usage => f.write_str(USAGE),
            Outcome::Accepted(status) => write!(f, "OK ({})", status),
        }
    }
}

struct Shared {
    state: TelescopeState,
    hardware: Hardware,
    attributes: AttributeStore,
}

impl Shared {
    fn set_status(&mut self, status: TelescopeStatus) -> Result<(), AttributeError> {
        if self.state.status == status {
            return Ok(());
        }
        log::info!("State {} -> {}", self.state.status, status);
        self.state.status = status;
        self.attributes.set(attributes::STATE, status.to_string())
    }

    /// Copies the last reported position and hardware status into the
    /// controller state.
    /// LIMIT is only overridden by a hardware fault.
    fn sync_hardware(&mut self) -> Result<(), AttributeError> {
        let hardware = self.hardware.status();
        let status = if self.state.status == TelescopeStatus::Limit && hardware.accepts_motion() {
            TelescopeStatus::Limit
        } else {
            self.state.mode.status_with(hardware)
        };
        self.set_status(status)?;
        let Some((az, el)) = self
            .hardware
            .last_status()
            .map(|s| (s.azimuth_deg, s.elevation_deg))
        else {
            return Ok(());
        };
        self.state.current_az = az;
        self.state.current_el = el;
        self.attributes.set(attributes::AZ_CURRENT, az)?;
        self.attributes.set(attributes::EL_CURRENT, el)
    }

    fn ensure_motion_allowed(&self) -> Result<(), TelescopeError> {
        let status = self.state.status;
        if status.blocks_motion() {
            return Err(TelescopeError::NotReady(status));
        }
        Ok(())
    }
}

#[derive(Clone)]
struct Pipeline {
    site: Site,
    converter: Arc<dyn CoordinateConverter>,
    pointing: Arc<dyn PointingModel>,
    settings: ControlSettings,
}

impl Pipeline {
    /// Ideal target for the current mode, before corrections.
    fn base_target(&self, state: &TelescopeState, now: DateTime<Utc>) -> Option<(f64, f64)> {
        match state.mode {
            TrackMode::Idle => None,
            TrackMode::AzEl => Some((state.commanded_az, state.commanded_el)),
            TrackMode::RaDec => Some(self.converter.convert(
                state.target_ra,
                state.target_dec,
                &self.site,
                now,
            )),
        }
    }
}

struct WorkerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

pub struct Telescope {
    shared: Arc<Mutex<Shared>>,
    pipeline: Pipeline,
    worker: Option<WorkerHandle>,
}

impl Telescope {
    pub fn new(
        hardware: Hardware,
        site: Site,
        converter: Arc<dyn CoordinateConverter>,
        pointing: Arc<dyn PointingModel>,
        settings: ControlSettings,
    ) -> Result<Self, TelescopeError> {
        let mut store = AttributeStore::new(settings.history_size);
        attributes::declare(&mut store, settings.tick)?;
        Ok(Self {
            shared: Arc::new(Mutex::new(Shared {
                state: TelescopeState::default(),
                hardware,
                attributes: store,
            })),
            pipeline: Pipeline {
                site,
                converter,
                pointing,
                settings,
            },
            worker: None,
        })
    }

    pub async fn from_config(config: &Config) -> Result<Self, TelescopeError> {
        let settings = ControlSettings::from(&config.control);
        let hardware = Hardware::connect(&config.hardware, settings.elevation_range).await;
        log::info!("Using {} hardware backend", hardware.kind());
        Self::new(
            hardware,
            config.site()?,
            Arc::new(SiderealConverter),
            config.pointing_model()?,
            settings,
        )
    }

    /// Queries the ACU once and leaves OFF.
    pub async fn initialize(&mut self) -> Result<TelescopeStatus, TelescopeError> {
        let mut shared = self.shared.lock().await;
        match shared.hardware.get_status().await {
            Ok(status) => log::info!("ACU reports {}", status),
            Err(e) => log::warn!("ACU not reachable: {}", e),
        }
        if let Some(az) = shared.hardware.last_status().map(|s| s.azimuth_deg) {
            shared.state.previous_az = az;
        }
        shared.sync_hardware()?;
        Ok(shared.state.status)
    }

    pub async fn dispatch(&mut self, line: &str) -> Result<Outcome, TelescopeError> {
        let command = Command::parse(line)?;
        self.execute(command).await
    }

    pub async fn execute(&mut self, command: Command) -> Result<Outcome, TelescopeError> {
        log::debug!("Executing {:?}", command);
        match command {
            Command::Help => Ok(Outcome::Usage),
            Command::Tell => self.report().await.map(|r| Outcome::Report(Box::new(r))),
            Command::AzEl { az, el } => self.track_azel(az, el).await,
            Command::RaDec {
                ra_deg,
                dec_deg,
                source,
            } => self.track_radec(ra_deg, dec_deg, source).await,
            Command::Offset { az_off, el_off } => self.set_offsets(az_off, el_off).await,
            Command::Start => self.start().await,
            Command::Halt => self.halt().await,
            Command::Exit => {
                self.shared
                    .lock()
                    .await
                    .set_status(TelescopeStatus::Exit)?;
                log::info!("Exiting");
                std::process::exit(0)
            }
        }
    }

    async fn track_azel(&mut self, az: f64, el: f64) -> Result<Outcome, TelescopeError> {
        if !(0.0..360.0).contains(&az) {
            return Err(TelescopeError::InvalidAngle {
                axis: "azimuth",
                value: az,
            });
        }
        if !self.pipeline.settings.elevation_range.contains(el) {
            return Err(TelescopeError::InvalidAngle {
                axis: "elevation",
                value: el,
            });
        }

        let mut shared = self.shared.lock().await;
        shared.ensure_motion_allowed()?;
        let state = &mut shared.state;
        state.mode = TrackMode::AzEl;
        state.commanded_az = az;
        state.commanded_el = el;
        state.target_ra = 0.0;
        state.target_dec = 0.0;
        state.source_name.clear();

        let store = &mut shared.attributes;
        store.set(attributes::AZ_CMD, az)?;
        store.set(attributes::EL_CMD, el)?;
        store.set(attributes::RA_OBJ, 0.0)?;
        store.set(attributes::DEC_OBJ, 0.0)?;
        store.set(attributes::SOURCE_NAME, "")?;
        shared.set_status(TelescopeStatus::TrackAzEl)?;
        log::info!("Tracking AZ {:.4} EL {:.4}", az, el);
        Ok(Outcome::Accepted(shared.state.status))
    }

    async fn track_radec(
        &mut self,
        ra: f64,
        dec: f64,
        source: Option<String>,
    ) -> Result<Outcome, TelescopeError> {
        let mut shared = self.shared.lock().await;
        shared.ensure_motion_allowed()?;
        let source = source.unwrap_or_default();
        let state = &mut shared.state;
        state.mode = TrackMode::RaDec;
        state.target_ra = ra;
        state.target_dec = dec;
        state.source_name = source.clone();

        let store = &mut shared.attributes;
        store.set(attributes::RA_OBJ, ra)?;
        store.set(attributes::DEC_OBJ, dec)?;
        store.set(attributes::SOURCE_NAME, source.as_str())?;
        shared.set_status(TelescopeStatus::TrackRaDec)?;
        log::info!("Tracking RA {:.6} DEC {:.6} {}", ra, dec, source);
        Ok(Outcome::Accepted(shared.state.status))
    }

    async fn set_offsets(&mut self, az_off: f64, el_off: f64) -> Result<Outcome, TelescopeError> {
        let mut shared = self.shared.lock().await;
        shared.ensure_motion_allowed()?;
        shared.state.az_offset = az_off;
        shared.state.el_offset = el_off;
        shared.attributes.set(attributes::AZ_OFF, az_off)?;
        shared.attributes.set(attributes::EL_OFF, el_off)?;
        if shared.state.status == TelescopeStatus::Limit {
            let status = shared.state.mode.status();
            shared.set_status(status)?;
        }
        log::info!("Offsets AZ {:.4} EL {:.4}", az_off, el_off);
        Ok(Outcome::Accepted(shared.state.status))
    }

    async fn start(&mut self) -> Result<Outcome, TelescopeError> {
        if self.is_running() {
            log::info!("Control loop already running");
        } else {
            let shared = self.shared.clone();
            let pipeline = self.pipeline.clone();
            let (stop_tx, stop_rx) = oneshot::channel();
            let join = tokio::spawn(run_control_loop(shared, pipeline, stop_rx));
            self.worker = Some(WorkerHandle { stop_tx, join });
        }
        Ok(Outcome::Accepted(self.status().await))
    }

    /// Stops the control loop and the antenna. Safe to repeat.
    async fn halt(&mut self) -> Result<Outcome, TelescopeError> {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if let Err(e) = worker.join.await {
                log::error!("Control loop ended abnormally: {}", e);
            }
        }

        let mut shared = self.shared.lock().await;
        if let Err(e) = shared.hardware.set_status(StatusRequest::Stop).await {
            log::warn!("Stop command failed: {}", e);
        }
        shared.state.mode = TrackMode::Idle;
        shared.state.desired = None;
        if shared.state.status == TelescopeStatus::Limit {
            shared.set_status(TelescopeStatus::Idle)?;
        }
        shared.sync_hardware()?;
        Ok(Outcome::Accepted(shared.state.status))
    }

    /// Halts and leaves the ACU in standby.
    pub async fn shutdown(&mut self) -> Result<TelescopeStatus, TelescopeError> {
        self.halt().await?;
        let mut shared = self.shared.lock().await;
        if let Err(e) = shared.hardware.set_status(StatusRequest::Standby).await {
            log::warn!("Standby command failed: {}", e);
        }
        shared.sync_hardware()?;
        Ok(shared.state.status)
    }

    pub async fn report(&self) -> Result<TelescopeReport, TelescopeError> {
        let running = self.is_running();
        let shared = self.shared.lock().await;
        let state = &shared.state;
        if matches!(
            state.status,
            TelescopeStatus::Exit | TelescopeStatus::Disconnect
        ) {
            return Err(TelescopeError::FatalState(state.status));
        }

        let tolerance = self.pipeline.settings.ready_tolerance_arcsec;
        Ok(TelescopeReport {
            status: state.status,
            source: state.source_name.clone(),
            az: AxisReport {
                obj: state.desired.map(|(az, _)| az),
                off: state.az_offset,
                current: state.current_az,
            },
            el: AxisReport {
                obj: state.desired.map(|(_, el)| el),
                off: state.el_offset,
                current: state.current_el,
            },
            ra_obj: state.target_ra,
            dec_obj: state.target_dec,
            pointing_model: self.pipeline.pointing.describe(),
            pointing_ready: ready(state, tolerance),
            control_loop_running: running,
            hardware: HardwareReport {
                kind: shared.hardware.kind().to_string(),
                status: shared.hardware.status(),
                last_status: shared.hardware.last_status().cloned(),
            },
        })
    }

    /// Runs one control iteration outside the loop.
    #[cfg(test)]
    pub async fn step(&self) -> Result<(), TelescopeError> {
        control_tick(&self.shared, &self.pipeline, Utc::now()).await
    }

    pub async fn status(&self) -> TelescopeStatus {
        self.shared.lock().await.state.status
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.join.is_finished())
    }

    pub async fn is_ready(&self, tolerance_arcsec: f64) -> bool {
        ready(&self.shared.lock().await.state, tolerance_arcsec)
    }

    pub async fn attributes(&self) -> Vec<AttributeSnapshot> {
        self.shared.lock().await.attributes.snapshot()
    }

    pub async fn attribute(&self, key: &str) -> Result<AttributeSnapshot, TelescopeError> {
        let shared = self.shared.lock().await;
        Ok(shared.attributes.get(key)?.snapshot(true))
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.shared.lock().await.attributes.subscribe()
    }
}

fn ready(state: &TelescopeState, tolerance_arcsec: f64) -> bool {
    state.desired.is_some_and(|desired| {
        pointing_converged(
            (state.current_az, state.current_el),
            desired,
            tolerance_arcsec,
        )
    })
}

/// True when `current` is within `tolerance_arcsec` of `desired` on both
/// axes. The azimuth error is measured on the sky (scaled by `cos el`)
/// and across the 0/360 wrap.
pub fn pointing_converged(current: (f64, f64), desired: (f64, f64), tolerance_arcsec: f64) -> bool {
    let tolerance = tolerance_arcsec / 3600.0;
    let mut d_az = (current.0 - desired.0).rem_euclid(360.0);
    if d_az > 180.0 {
        d_az = 360.0 - d_az;
    }
    let d_az_sky = d_az * current.1.to_radians().cos().abs();
    let d_el = (current.1 - desired.1).abs();
    d_az_sky <= tolerance && d_el <= tolerance
}

fn normalize_azimuth(az: f64) -> f64 {
    let az = az.rem_euclid(360.0);
    if az >= 360.0 {
        0.0
    } else {
        az
    }
}

async fn run_control_loop(
    shared: Arc<Mutex<Shared>>,
    pipeline: Pipeline,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = interval(pipeline.settings.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    log::info!(
        "Control loop started, tick {}",
        humantime::format_duration(pipeline.settings.tick)
    );

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                if let Err(e) = control_tick(&shared, &pipeline, Utc::now()).await {
                    log::error!("Control tick failed: {}", e);
                }
            }
        }
    }
    log::info!("Control loop stopped");
}

async fn control_tick(
    shared: &Mutex<Shared>,
    pipeline: &Pipeline,
    now: DateTime<Utc>,
) -> Result<(), TelescopeError> {
    let mut guard = shared.lock().await;
    let shared = &mut *guard;
    if shared.state.status == TelescopeStatus::Exit {
        return Ok(());
    }

    // In LIMIT, or while the link is not ready, the ACU is only polled.
    if shared.state.status == TelescopeStatus::Limit || !shared.hardware.status().accepts_motion()
    {
        if let Err(e) = shared.hardware.get_status().await {
            log::debug!("Status query failed: {}", e);
        }
        shared.sync_hardware()?;
        return Ok(());
    }

    let Some((base_az, base_el)) = pipeline.base_target(&shared.state, now) else {
        if let Err(e) = shared.hardware.get_status().await {
            log::warn!("Status query failed: {}", e);
        }
        shared.sync_hardware()?;
        return Ok(());
    };

    let (d_az, d_el) = pipeline.pointing.correct(base_az, base_el);
    let az = normalize_azimuth(base_az + d_az + shared.state.az_offset);
    let el = base_el + d_el + shared.state.el_offset;
    shared.state.desired = Some((az, el));
    shared.attributes.set(attributes::AZ, base_az)?;
    shared.attributes.set(attributes::EL, base_el)?;
    shared.attributes.set(attributes::AZ_OBJ, az)?;
    shared.attributes.set(attributes::EL_OBJ, el)?;

    let floor = pipeline.settings.elevation_floor_deg;
    if el < floor {
        log::warn!("Elevation {:.4} below floor {:.1}", el, floor);
        shared.set_status(TelescopeStatus::Limit)?;
        return Ok(());
    }

    match shared
        .hardware
        .point_to(shared.state.previous_az, az, el)
        .await
    {
        Ok(_) => shared.state.previous_az = az,
        Err(AcuError::InvalidAngle { axis, value }) => {
            log::warn!("Target {} {:.4} outside mechanical range", axis, value);
            shared.set_status(TelescopeStatus::Limit)?;
            return Ok(());
        }
        Err(e) => log::warn!("Pointing failed: {}", e),
    }
    shared.sync_hardware()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acu::codec::{
        decode_command, encode_error_status, encode_normal_status, encode_query,
    };
    use crate::acu::SimulatedAcu;
    use crate::astro::{NullPointingModel, ParametricPointingModel};
    use crate::config::HardwareConfig;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    const TOLERANCE: f64 = 10.0;

    fn site() -> Site {
        Site {
            longitude_deg: 102.796,
            latitude_deg: 25.028,
            height_m: 1950.0,
        }
    }

    fn build(hardware: Hardware, pointing: Arc<dyn PointingModel>) -> Telescope {
        Telescope::new(
            hardware,
            site(),
            Arc::new(SiderealConverter),
            pointing,
            ControlSettings::default(),
        )
        .unwrap()
    }

    async fn simulated_hardware() -> Hardware {
        let config = HardwareConfig::Simulated {
            slew_rate_deg_s: None,
        };
        Hardware::connect(&config, ElevationRange::default()).await
    }

    async fn acu_at(address: SocketAddr, timeout: Duration) -> Hardware {
        let config = HardwareConfig::Acu {
            host: address.ip().to_string(),
            port: address.port(),
            timeout,
        };
        Hardware::connect(&config, ElevationRange::default()).await
    }

    async fn simulated() -> Telescope {
        build(simulated_hardware().await, Arc::new(NullPointingModel))
    }

    async fn unreachable() -> Telescope {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);
        let hardware = acu_at(address, Duration::from_millis(200)).await;
        build(hardware, Arc::new(NullPointingModel))
    }

    /// What the scripted ACU does with the n-th request that expects a reply.
    #[derive(Debug, Clone, Copy)]
    enum Script {
        Mount,
        Fault,
        Hangup,
    }

    /// Local ACU in front of a simulated mount. Every request frame is
    /// forwarded on the returned channel. Hanging up drops the connection
    /// and waits for the next one.
    async fn scripted_acu<F>(script: F) -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>)
    where
        F: Fn(usize) -> Script + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut acu = SimulatedAcu::new(None);
            let mut replies = 0;
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut pending = Vec::new();
                let mut buf = [0u8; 64];
                'connection: loop {
                    let n = match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    pending.extend_from_slice(&buf[..n]);
                    while pending.len() >= 4 {
                        let len = u16::from_le_bytes([pending[2], pending[3]]) as usize;
                        if pending.len() < len {
                            break;
                        }
                        let frame: Vec<u8> = pending.drain(..len).collect();
                        let answered = acu.apply(decode_command(&frame).unwrap()).is_some();
                        let _ = frames_tx.send(frame);
                        if !answered {
                            continue;
                        }
                        let step = script(replies);
                        replies += 1;
                        let reply = match step {
                            Script::Mount => encode_normal_status(&acu.status()),
                            Script::Fault => encode_error_status(),
                            Script::Hangup => break 'connection,
                        };
                        if socket.write_all(reply.as_bytes()).await.is_err() {
                            break 'connection;
                        }
                    }
                }
            }
        });
        (address, frames_rx)
    }

    fn drain(frames: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> Vec<Vec<u8>> {
        let mut all = Vec::new();
        while let Ok(frame) = frames.try_recv() {
            all.push(frame);
        }
        all
    }

    #[tokio::test]
    async fn initialize_leaves_off() {
        let mut telescope = simulated().await;
        assert_eq!(telescope.status().await, TelescopeStatus::Off);
        assert_eq!(telescope.initialize().await.unwrap(), TelescopeStatus::Idle);
    }

    #[tokio::test]
    async fn azel_tracks_and_converges() {
        let mut telescope = simulated().await;
        telescope.initialize().await.unwrap();
        telescope.dispatch("AZEL 100 45").await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::TrackAzEl);
        assert!(!telescope.is_ready(TOLERANCE).await);
        let az_cmd = telescope.attribute("az_cmd").await.unwrap().value;
        let el_cmd = telescope.attribute("el_cmd").await.unwrap().value;
        assert_eq!((az_cmd.as_f64(), el_cmd.as_f64()), (Some(100.0), Some(45.0)));

        telescope.step().await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::TrackAzEl);
        assert!(telescope.is_ready(2.0).await);
        let report = telescope.report().await.unwrap();
        assert_eq!(report.az.current, 100.0);
        assert_eq!(report.el.current, 45.0);
        assert!(report.pointing_ready);
        assert_eq!(
            telescope.attribute("az_current").await.unwrap().value.as_f64(),
            Some(100.0)
        );
    }

    #[tokio::test]
    async fn low_elevation_enters_limit() {
        let mut telescope = simulated().await;
        telescope.initialize().await.unwrap();
        // Inside the mechanical range, below the floor.
        telescope.dispatch("AZEL 100 2").await.unwrap();
        telescope.step().await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::Limit);
        telescope.step().await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::Limit);

        let outcome = telescope.dispatch("Off 0 0").await.unwrap();
        assert!(matches!(outcome, Outcome::Accepted(TelescopeStatus::TrackAzEl)));
        telescope.dispatch("AZEL 100 45").await.unwrap();
        telescope.step().await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::TrackAzEl);
    }

    #[tokio::test]
    async fn limit_keeps_polling_the_acu() {
        let (address, mut frames) = scripted_acu(|n| match n {
            0 => Script::Mount,
            _ => Script::Hangup,
        })
        .await;
        let hardware = acu_at(address, Duration::from_millis(300)).await;
        let mut telescope = build(hardware, Arc::new(NullPointingModel));
        assert_eq!(telescope.initialize().await.unwrap(), TelescopeStatus::Idle);

        telescope.dispatch("AZEL 100 2").await.unwrap();
        telescope.step().await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::Limit);
        telescope.step().await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::Disconnect);

        let sent = drain(&mut frames);
        assert_eq!(sent.len(), 2);
        let query = encode_query();
        assert!(sent.iter().all(|frame| frame.as_slice() == query.as_bytes()));
    }

    #[tokio::test]
    async fn acu_fault_clears_once_acu_answers() {
        let (address, _frames) = scripted_acu(|n| match n {
            0 => Script::Fault,
            _ => Script::Mount,
        })
        .await;
        let hardware = acu_at(address, Duration::from_millis(300)).await;
        let mut telescope = build(hardware, Arc::new(NullPointingModel));
        assert_eq!(telescope.initialize().await.unwrap(), TelescopeStatus::AcuErr);

        telescope.step().await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::Idle);
        telescope.dispatch("AZEL 100 45").await.unwrap();
        telescope.step().await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::TrackAzEl);
        assert!(telescope.is_ready(1.0).await);
    }

    #[tokio::test]
    async fn dropped_link_reconnects_on_next_tick() {
        let (address, _frames) = scripted_acu(|n| match n {
            0 => Script::Hangup,
            _ => Script::Mount,
        })
        .await;
        let hardware = acu_at(address, Duration::from_millis(300)).await;
        let mut telescope = build(hardware, Arc::new(NullPointingModel));
        assert_eq!(
            telescope.initialize().await.unwrap(),
            TelescopeStatus::Disconnect
        );

        telescope.step().await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::Idle);
        let report = telescope.report().await.unwrap();
        assert_eq!(report.el.current, 90.0);
    }

    #[tokio::test]
    async fn halt_sends_both_stop_stages_in_order() {
        let (address, mut frames) = scripted_acu(|_| Script::Mount).await;
        let hardware = acu_at(address, Duration::from_millis(300)).await;
        let mut telescope = build(hardware, Arc::new(NullPointingModel));
        telescope.initialize().await.unwrap();
        telescope.dispatch("AZEL 100 45").await.unwrap();
        telescope.step().await.unwrap();
        drain(&mut frames);

        let outcome = telescope.dispatch("Halt").await.unwrap();
        assert!(matches!(outcome, Outcome::Accepted(TelescopeStatus::Idle)));
        let sent = drain(&mut frames);
        assert_eq!(sent.len(), 2);
        for (frame, stage) in sent.iter().zip([1u8, 2]) {
            assert_eq!(frame.len(), 13);
            assert_eq!(frame[5..8], [0, 3, stage]);
        }
    }

    #[tokio::test]
    async fn winding_follows_previous_azimuth() {
        let (address, mut frames) = scripted_acu(|_| Script::Mount).await;
        let hardware = acu_at(address, Duration::from_millis(300)).await;
        let mut telescope = build(hardware, Arc::new(NullPointingModel));
        telescope.initialize().await.unwrap();
        for line in ["AZEL 170 45", "AZEL 190 45", "AZEL 170 45"] {
            telescope.dispatch(line).await.unwrap();
            telescope.step().await.unwrap();
        }

        let flags: Vec<u8> = drain(&mut frames)
            .into_iter()
            .filter(|frame| frame.len() == 18)
            .map(|frame| frame[7])
            .collect();
        assert_eq!(flags, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn shutdown_leaves_acu_in_standby() {
        let mut telescope = simulated().await;
        telescope.initialize().await.unwrap();
        telescope.dispatch("AZEL 100 45").await.unwrap();
        telescope.dispatch("Start").await.unwrap();
        assert_eq!(
            telescope.shutdown().await.unwrap(),
            TelescopeStatus::Standby
        );
        assert!(!telescope.is_running());
    }

    #[tokio::test]
    async fn azel_rejects_out_of_range_angles() {
        let mut telescope = simulated().await;
        for line in ["AZEL 360 45", "AZEL -1 45", "AZEL 100 95"] {
            assert!(matches!(
                telescope.dispatch(line).await,
                Err(TelescopeError::InvalidAngle { .. })
            ));
        }
        assert_eq!(telescope.status().await, TelescopeStatus::Off);
    }

    #[tokio::test]
    async fn offsets_wrap_azimuth() {
        let mut telescope = simulated().await;
        telescope.initialize().await.unwrap();
        telescope.dispatch("AZEL 359.5 45").await.unwrap();
        telescope.dispatch("Off 1 0.5").await.unwrap();
        telescope.step().await.unwrap();
        let report = telescope.report().await.unwrap();
        assert!((report.az.obj.unwrap() - 0.5).abs() < 1e-9);
        assert!((report.el.obj.unwrap() - 45.5).abs() < 1e-9);
        assert!((report.az.current - 0.5).abs() < 1e-4);
    }

    #[tokio::test]
    async fn pointing_model_shifts_target() {
        let model = ParametricPointingModel::new(&[0.1, 0.0, 0.0, 0.0, 0.0, -0.2]).unwrap();
        let mut telescope = build(simulated_hardware().await, Arc::new(model));
        telescope.initialize().await.unwrap();
        telescope.dispatch("AZEL 100 45").await.unwrap();
        telescope.step().await.unwrap();
        let az_obj = telescope.attribute("az_obj").await.unwrap().value.as_f64().unwrap();
        let el_obj = telescope.attribute("el_obj").await.unwrap().value.as_f64().unwrap();
        let az = telescope.attribute("az").await.unwrap().value.as_f64().unwrap();
        assert!((az_obj - 100.1).abs() < 1e-9);
        assert!((el_obj - 44.8).abs() < 1e-9);
        assert_eq!(az, 100.0);
    }

    #[tokio::test]
    async fn radec_tracks_circumpolar_source() {
        let mut telescope = simulated().await;
        telescope.initialize().await.unwrap();
        telescope.dispatch("RADEC 02:31:49 89:15:51 Polaris").await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::TrackRaDec);
        telescope.step().await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::TrackRaDec);
        let report = telescope.report().await.unwrap();
        assert_eq!(report.source, "Polaris");
        let el = report.el.obj.unwrap();
        assert!((el - 25.028).abs() < 1.0, "elevation {}", el);
        assert!(telescope.is_ready(1.0).await);
    }

    #[tokio::test]
    async fn halt_is_idempotent() {
        let mut telescope = simulated().await;
        telescope.initialize().await.unwrap();
        telescope.dispatch("AZEL 100 45").await.unwrap();
        telescope.dispatch("Start").await.unwrap();
        assert!(telescope.is_running());
        telescope.dispatch("Start").await.unwrap();
        assert!(telescope.is_running());

        let first = telescope.dispatch("Halt").await.unwrap();
        assert!(matches!(first, Outcome::Accepted(TelescopeStatus::Idle)));
        assert!(!telescope.is_running());
        let second = telescope.dispatch("Halt").await.unwrap();
        assert!(matches!(second, Outcome::Accepted(TelescopeStatus::Idle)));
    }

    #[tokio::test]
    async fn halt_leaves_limit() {
        let mut telescope = simulated().await;
        telescope.initialize().await.unwrap();
        telescope.dispatch("AZEL 100 2").await.unwrap();
        telescope.step().await.unwrap();
        assert_eq!(telescope.status().await, TelescopeStatus::Limit);
        let outcome = telescope.dispatch("Halt").await.unwrap();
        assert!(matches!(outcome, Outcome::Accepted(TelescopeStatus::Idle)));
    }

    #[tokio::test]
    async fn control_loop_moves_antenna() {
        let settings = ControlSettings {
            tick: Duration::from_millis(10),
            ..ControlSettings::default()
        };
        let mut telescope = Telescope::new(
            simulated_hardware().await,
            site(),
            Arc::new(SiderealConverter),
            Arc::new(NullPointingModel),
            settings,
        )
        .unwrap();
        telescope.initialize().await.unwrap();
        telescope.dispatch("AZEL 200 30").await.unwrap();
        telescope.dispatch("Start").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(telescope.is_ready(TOLERANCE).await);
        telescope.dispatch("Halt").await.unwrap();
    }

    #[tokio::test]
    async fn disconnected_state_is_fatal_for_tell() {
        let mut telescope = unreachable().await;
        assert_eq!(
            telescope.initialize().await.unwrap(),
            TelescopeStatus::Disconnect
        );
        assert!(matches!(
            telescope.dispatch("Tell").await,
            Err(TelescopeError::FatalState(TelescopeStatus::Disconnect))
        ));
        assert!(matches!(
            telescope.dispatch("AZEL 100 45").await,
            Err(TelescopeError::NotReady(TelescopeStatus::Disconnect))
        ));
        assert!(matches!(telescope.dispatch("help").await, Ok(Outcome::Usage)));
    }

    #[tokio::test]
    async fn error_reply_sets_acu_err() {
        let (address, _frames) = scripted_acu(|_| Script::Fault).await;
        let hardware = acu_at(address, Duration::from_millis(500)).await;
        let mut telescope = build(hardware, Arc::new(NullPointingModel));
        assert_eq!(telescope.initialize().await.unwrap(), TelescopeStatus::AcuErr);
        assert!(matches!(
            telescope.dispatch("AZEL 100 45").await,
            Err(TelescopeError::NotReady(TelescopeStatus::AcuErr))
        ));
        let report = telescope.report().await.unwrap();
        assert_eq!(report.status, TelescopeStatus::AcuErr);
    }

    #[tokio::test]
    async fn commands_publish_telemetry() {
        let mut telescope = simulated().await;
        let mut rx = telescope.subscribe().await;
        telescope.dispatch("AZEL 10 20").await.unwrap();
        let first = rx.try_recv().unwrap();
        assert_eq!(first.key, "az_cmd");
        assert_eq!(first.value.as_f64(), Some(10.0));
    }

    #[tokio::test]
    async fn unknown_command_is_not_fatal() {
        let mut telescope = simulated().await;
        assert!(matches!(
            telescope.dispatch("Slew 1 2").await,
            Err(TelescopeError::UnknownCommand(_))
        ));
        telescope.initialize().await.unwrap();
        assert!(telescope.dispatch("Tell").await.is_ok());
    }

    #[test]
    fn convergence_examples() {
        assert!(pointing_converged((100.0, 45.0), (100.0003, 45.0001), 2.0));
        assert!(!pointing_converged((100.0, 45.0), (100.01, 45.0), 2.0));
        assert!(!pointing_converged((100.0, 45.0), (100.0, 45.01), 2.0));
        assert!(pointing_converged((359.9999, 45.0), (0.0, 45.0), 1.0));
    }

    #[test]
    fn azimuth_normalization() {
        assert_eq!(normalize_azimuth(360.5), 0.5);
        assert_eq!(normalize_azimuth(-0.5), 359.5);
        assert!(normalize_azimuth(-1e-18) < 360.0);
    }
}

//! Audio Engine - Main Entry Point
//!
//! The engine controller owns the host backend, both devices, and the
//! session lifecycle, and runs on its own management thread:
//!
//! ```text
//! Shell / API thread             Controller thread          Host audio threads
//! ──────────────────             ─────────────────          ──────────────────
//! AudioEngine                    Controller
//!   │                              │
//!   ├── command + reply ───────►   │ initialize/start/...      capture callback
//!   │                              │ device monitor tick        │    │
//!   ◄── events ──────────────────  │                            ▼    │
//!   set_volume ──atomics────────────────────────────────►  EngineShared
//!                                                               │    ▲
//!                                                   playback callback │
//! ```
//!
//! Management operations are serialized on the controller thread and
//! answered synchronously through per-call reply channels. The audio
//! callbacks never see any of this; they touch only the ring buffer and
//! the shared atomics.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use sidetone_host::{
    AudioHost, CpalHost, DeviceInfo, Direction, HostError, NegotiatedFormat, StreamHandle,
    StreamRequest,
};
use sidetone_rt::{Decimator, FrameRing};

use crate::config::EngineConfig;
use crate::device::resolve_endpoint;
use crate::error::{EngineError, EngineResult};
use crate::message::{Command, Event, Reply};
use crate::monitor::{DeviceChange, DeviceMonitor};
use crate::status::{EngineStatus, ErrorKind};
use crate::stream::{CaptureWorker, EngineShared, PlaybackWorker};

/// Engine lifecycle states. All transitions happen on the controller
/// thread.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Uninitialized = 0,
    Initialized = 1,
    Running = 2,
    Stopped = 3,
    Faulted = 4,
}

impl EngineState {
    fn from_code(code: u8) -> EngineState {
        match code {
            1 => EngineState::Initialized,
            2 => EngineState::Running,
            3 => EngineState::Stopped,
            4 => EngineState::Faulted,
            _ => EngineState::Uninitialized,
        }
    }
}

/// Reply deadline for most management operations.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Cooperative stop deadline; expiry faults the engine.
const STOP_DEADLINE: Duration = Duration::from_secs(2);

/// Controller loop tick while idle.
const TICK: Duration = Duration::from_millis(100);

/// How often the device monitor re-enumerates.
const MONITOR_INTERVAL: Duration = Duration::from_millis(500);

/// Settling delay before restarting on a re-added endpoint, giving the OS
/// time to finish bringing the device up.
const RECONNECT_SETTLE: Duration = Duration::from_millis(500);

/// Upper bound on the ring allocation (frames, after power-of-two
/// rounding).
const MAX_RING_FRAMES: usize = 1 << 21;

/// The main engine handle.
///
/// Lives on the shell thread; all heavy lifting happens on the controller
/// thread it spawns. Cheap queries (`is_running`, `volume`, `state`) read
/// shared atomics directly and never block.
pub struct AudioEngine {
    command_tx: Sender<Command>,
    event_rx: Receiver<Event>,
    controller: Option<JoinHandle<()>>,
    shared: Arc<EngineShared>,
    state_code: Arc<AtomicU8>,
    fault_flag: Arc<AtomicBool>,
    /// Serializes state-changing operations from multiple shell threads.
    op_gate: Mutex<()>,
}

impl AudioEngine {
    /// Create an engine over the platform's default host backend.
    pub fn new() -> EngineResult<Self> {
        Self::with_host(CpalHost::new())
    }

    /// Create an engine over any host backend (the null backend in tests).
    pub fn with_host<H: AudioHost>(host: H) -> EngineResult<Self> {
        let (command_tx, command_rx) = bounded::<Command>(32);
        let (event_tx, event_rx) = unbounded::<Event>();

        let shared = Arc::new(EngineShared::new());
        let state_code = Arc::new(AtomicU8::new(EngineState::Uninitialized as u8));
        let fault_flag = Arc::new(AtomicBool::new(false));

        // The controller is assembled on its own thread: stream handles
        // are not Send, so the struct that will hold them must never
        // cross threads. Only Send parts are captured here.
        let thread_command_tx = command_tx.clone();
        let thread_shared = Arc::clone(&shared);
        let thread_state_code = Arc::clone(&state_code);
        let thread_fault_flag = Arc::clone(&fault_flag);

        let handle = thread::Builder::new()
            .name("sidetone-engine".into())
            .spawn(move || {
                let controller = Controller {
                    host,
                    command_rx,
                    command_tx: thread_command_tx,
                    event_tx,
                    shared: thread_shared,
                    state_code: thread_state_code,
                    fault_flag: thread_fault_flag,
                    state: EngineState::Uninitialized,
                    session: None,
                    monitor: DeviceMonitor::new(MONITOR_INTERVAL),
                    reconnect_at: None,
                    intent_running: false,
                    rt_warned: false,
                };
                controller.run();
            })
            .map_err(|e| EngineError::HostInitFailed(e.to_string()))?;

        Ok(Self {
            command_tx,
            event_rx,
            controller: Some(handle),
            shared,
            state_code,
            fault_flag,
            op_gate: Mutex::new(()),
        })
    }

    /// Resolve devices, allocate the ring buffer, and open both streams
    /// without starting them. Legal only in `Uninitialized`.
    pub fn initialize(&self, config: EngineConfig) -> EngineResult<()> {
        self.request_gated(|reply| Command::Initialize(config, reply), COMMAND_TIMEOUT)
    }

    /// Pre-fill the ring to 50% and start capture, then playback. Legal in
    /// `Initialized` and `Stopped`.
    pub fn start(&self) -> EngineResult<()> {
        self.request_gated(Command::Start, COMMAND_TIMEOUT)
    }

    /// Stop playback, then capture. Devices stay open. Legal in `Running`.
    pub fn stop(&self) -> EngineResult<()> {
        self.request_gated(Command::Stop, STOP_DEADLINE)
    }

    /// Tear everything down. Legal in any state except `Uninitialized`.
    pub fn uninitialize(&self) -> EngineResult<()> {
        self.request_gated(Command::Uninitialize, COMMAND_TIMEOUT)
    }

    /// Set the gain, clamped to [0, 1]. Takes effect on the next capture
    /// callback. Legal in any state and never blocks.
    pub fn set_volume(&self, volume: f32) -> EngineResult<()> {
        if !volume.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "volume must be finite, got {volume}"
            )));
        }
        self.shared.set_volume(volume);
        Ok(())
    }

    /// Current gain in [0, 1].
    pub fn volume(&self) -> f32 {
        self.shared.volume()
    }

    /// Whether both streams are live.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        EngineState::from_code(self.state_code.load(Ordering::SeqCst))
    }

    /// Compose a status snapshot. Callable from any thread.
    pub fn status(&self) -> EngineResult<EngineStatus> {
        self.request(Command::Status, COMMAND_TIMEOUT)
    }

    /// Enumerate endpoints for one direction.
    pub fn list_devices(&self, direction: Direction) -> EngineResult<Vec<DeviceInfo>> {
        self.request(|reply| Command::ListDevices(direction, reply), COMMAND_TIMEOUT)
    }

    /// Get next event (non-blocking).
    pub fn poll_event(&self) -> Option<Event> {
        self.event_rx.try_recv().ok()
    }

    /// Get next event (blocking).
    pub fn wait_event(&self) -> Option<Event> {
        self.event_rx.recv().ok()
    }

    fn request_gated<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
        timeout: Duration,
    ) -> EngineResult<T> {
        let _gate = match self.op_gate.lock() {
            Ok(gate) => gate,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.request(make, timeout)
    }

    fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
        timeout: Duration,
    ) -> EngineResult<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.command_tx
            .send(make(reply_tx))
            .map_err(|_| EngineError::ControllerGone)?;
        match reply_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                // The controller is wedged in a host call. Latch the fault
                // so it lands in Faulted when (if) the call returns.
                self.fault_flag.store(true, Ordering::SeqCst);
                Err(EngineError::Unresponsive)
            }
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::ControllerGone),
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
        if let Some(handle) = self.controller.take() {
            let _ = handle.join();
        }
    }
}

/// One initialized session: the ring, both opened streams, and the
/// resolved endpoint ids used for disconnect matching.
struct Session<H: AudioHost> {
    config: EngineConfig,
    ring: Arc<FrameRing>,
    capture: H::Capture,
    render: H::Render,
    capture_id: String,
    render_id: String,
}

struct Controller<H: AudioHost> {
    host: H,
    command_rx: Receiver<Command>,
    /// Cloned into stream error callbacks so faults land back here.
    command_tx: Sender<Command>,
    event_tx: Sender<Event>,
    shared: Arc<EngineShared>,
    state_code: Arc<AtomicU8>,
    fault_flag: Arc<AtomicBool>,
    state: EngineState,
    session: Option<Session<H>>,
    monitor: DeviceMonitor,
    reconnect_at: Option<Instant>,
    /// True while the user wants streaming; survives disconnect-induced
    /// stops so a re-added endpoint can restart automatically.
    intent_running: bool,
    rt_warned: bool,
}

impl<H: AudioHost> Controller<H> {
    fn run(mut self) {
        info!("engine controller started on host `{}`", self.host.name());

        loop {
            match self.command_rx.recv_timeout(TICK) {
                Ok(Command::Shutdown) => break,
                Ok(command) => self.handle_command(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.tick();
        }

        if self.state == EngineState::Running {
            self.stop_streams();
        }
        self.session = None;
        info!("engine controller shutting down");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Initialize(config, reply) => {
                let _ = reply.send(self.do_initialize(config));
            }
            Command::Start(reply) => {
                let _ = reply.send(self.do_start("start"));
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.do_stop());
            }
            Command::Uninitialize(reply) => {
                let _ = reply.send(self.do_uninitialize());
            }
            Command::Status(reply) => {
                let _ = reply.send(Ok(self.compose_status()));
            }
            Command::ListDevices(direction, reply) => {
                let result = self
                    .host
                    .list_devices(direction)
                    .map_err(|e| EngineError::HostInitFailed(e.to_string()));
                let _ = reply.send(result);
            }
            Command::StreamFault(direction, err) => self.handle_stream_fault(direction, err),
            Command::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    fn tick(&mut self) {
        // A caller gave up on a wedged operation; land in Faulted.
        if self.fault_flag.swap(false, Ordering::SeqCst)
            && self.state != EngineState::Uninitialized
            && self.state != EngineState::Faulted
        {
            self.enter_faulted(
                ErrorKind::DeviceLost,
                "management operation exceeded its deadline".to_string(),
            );
        }

        // Surface failed pro-audio promotion once per session.
        if !self.rt_warned
            && (self.shared.rt_capture_failed.load(Ordering::Relaxed)
                || self.shared.rt_render_failed.load(Ordering::Relaxed))
        {
            self.rt_warned = true;
            self.emit(Event::Warning {
                message: "pro-audio thread priority unavailable; streaming continues at normal \
                          priority"
                    .to_string(),
            });
        }

        let now = Instant::now();
        let changes = self.monitor.poll(&self.host, now);
        for change in changes {
            self.handle_device_change(change);
        }

        if let Some(at) = self.reconnect_at {
            if now >= at {
                self.reconnect_at = None;
                if self.state == EngineState::Stopped && self.intent_running {
                    info!("configured endpoint returned, restarting");
                    if let Err(e) = self.do_start("reconnect") {
                        warn!("automatic restart failed: {e}");
                        self.emit(Event::error(e.kind(), &e));
                    }
                }
            }
        }
    }

    fn do_initialize(&mut self, config: EngineConfig) -> EngineResult<()> {
        if self.state != EngineState::Uninitialized {
            return Err(EngineError::InvalidState {
                operation: "initialize",
                state: self.state,
            });
        }
        config.validate().map_err(EngineError::InvalidArgument)?;

        let ring_frames = config.ring_buffer_frames.next_power_of_two();
        if ring_frames > MAX_RING_FRAMES {
            return Err(EngineError::OutOfMemory(format!(
                "ring buffer of {ring_frames} frames exceeds the {MAX_RING_FRAMES}-frame limit"
            )));
        }
        let channels = config.channels as usize;

        // Resolve both endpoints up front so disconnect matching has
        // concrete ids even when the config said "default".
        let inputs = self
            .host
            .list_devices(Direction::Capture)
            .map_err(|e| EngineError::HostInitFailed(e.to_string()))?;
        let input = resolve_endpoint(&inputs, config.input_device.as_deref())
            .ok_or_else(|| {
                EngineError::DeviceOpenFailed(match &config.input_device {
                    Some(id) => format!("capture device `{id}` not found"),
                    None => "no capture devices available".to_string(),
                })
            })?
            .clone();

        let outputs = self
            .host
            .list_devices(Direction::Playback)
            .map_err(|e| EngineError::HostInitFailed(e.to_string()))?;
        let output = resolve_endpoint(&outputs, config.output_device.as_deref())
            .ok_or_else(|| {
                EngineError::DeviceOpenFailed(match &config.output_device {
                    Some(id) => format!("playback device `{id}` not found"),
                    None => "no playback devices available".to_string(),
                })
            })?
            .clone();

        let capture_request = stream_request(&config, Some(input.id.clone()));
        let render_request = stream_request(&config, Some(output.id.clone()));

        // Probe first: the capture worker needs to know the granted rate
        // before its callback exists.
        let capture_format = self
            .host
            .probe(Direction::Capture, &capture_request)
            .map_err(|e| EngineError::DeviceOpenFailed(e.to_string()))?;
        let render_format = self
            .host
            .probe(Direction::Playback, &render_request)
            .map_err(|e| EngineError::DeviceOpenFailed(e.to_string()))?;

        check_channels(&capture_format, &config)?;
        check_channels(&render_format, &config)?;

        let decimator = decimator_for(&capture_format, &config)?;

        if render_format.sample_rate != config.sample_rate {
            return Err(EngineError::InvalidArgument(format!(
                "playback device runs at {} Hz but the engine is configured for {} Hz and does \
                 not resample",
                render_format.sample_rate, config.sample_rate
            )));
        }

        let (producer, consumer) = FrameRing::with_capacity(ring_frames, channels);
        let ring = Arc::clone(consumer.ring());

        self.shared.set_volume(config.volume);

        let mut capture_worker = CaptureWorker::new(
            producer,
            Arc::clone(&self.shared),
            decimator,
            channels,
            capture_request.pro_audio,
        );
        let capture = self
            .host
            .open_capture(
                &capture_request,
                Box::new(move |block, frames| capture_worker.process_block(block, frames)),
                self.fault_callback(Direction::Capture),
            )
            .map_err(|e| EngineError::DeviceOpenFailed(e.to_string()))?;

        let mut playback_worker = PlaybackWorker::new(
            consumer,
            Arc::clone(&self.shared),
            channels,
            render_request.pro_audio,
        );
        let render = match self.host.open_render(
            &render_request,
            Box::new(move |mut block, frames| playback_worker.render_block(&mut block, frames)),
            self.fault_callback(Direction::Playback),
        ) {
            Ok(render) => render,
            Err(e) => {
                // Full rollback: the capture stream and ring drop here.
                return Err(EngineError::DeviceOpenFailed(e.to_string()));
            }
        };

        info!(
            input = %input.id,
            output = %output.id,
            rate = config.sample_rate,
            period = config.period_frames,
            ring = ring_frames,
            "engine initialized"
        );

        self.session = Some(Session {
            config,
            ring,
            capture,
            render,
            capture_id: input.id,
            render_id: output.id,
        });
        self.set_state(EngineState::Initialized);
        Ok(())
    }

    fn do_start(&mut self, operation: &'static str) -> EngineResult<()> {
        if self.state != EngineState::Initialized && self.state != EngineState::Stopped {
            return Err(EngineError::InvalidState {
                operation,
                state: self.state,
            });
        }
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => {
                return Err(EngineError::InvalidState {
                    operation,
                    state: self.state,
                })
            }
        };

        // Symmetric under/overflow margins for the first periods; any
        // residue from a previous run is discarded.
        session.ring.reset();
        session.ring.prefill_silence(session.ring.capacity() / 2);
        self.shared.reset_session_stats();
        self.shared.rt_capture_failed.store(false, Ordering::Relaxed);
        self.shared.rt_render_failed.store(false, Ordering::Relaxed);
        self.rt_warned = false;

        // Producer must be live before the consumer draws.
        self.shared.running.store(true, Ordering::SeqCst);
        if let Err(e) = session.capture.start() {
            self.shared.running.store(false, Ordering::SeqCst);
            return Err(EngineError::DeviceStartFailed(e.to_string()));
        }
        if let Err(e) = session.render.start() {
            self.shared.running.store(false, Ordering::SeqCst);
            if let Err(stop_err) = session.capture.stop() {
                warn!("rollback of capture stream failed: {stop_err}");
            }
            return Err(EngineError::DeviceStartFailed(e.to_string()));
        }

        self.intent_running = true;
        self.set_state(EngineState::Running);
        self.emit(Event::StateChanged { running: true });
        info!("streaming started");
        Ok(())
    }

    fn do_stop(&mut self) -> EngineResult<()> {
        if self.state != EngineState::Running {
            return Err(EngineError::InvalidState {
                operation: "stop",
                state: self.state,
            });
        }
        self.stop_streams();
        self.intent_running = false;
        self.set_state(EngineState::Stopped);
        self.emit(Event::StateChanged { running: false });
        info!("streaming stopped");
        Ok(())
    }

    fn do_uninitialize(&mut self) -> EngineResult<()> {
        if self.state == EngineState::Uninitialized {
            return Err(EngineError::InvalidState {
                operation: "uninitialize",
                state: self.state,
            });
        }
        if self.state == EngineState::Running {
            self.stop_streams();
            self.emit(Event::StateChanged { running: false });
        }
        // Dropping the session closes both streams and frees the ring.
        self.session = None;
        self.intent_running = false;
        self.reconnect_at = None;
        self.set_state(EngineState::Uninitialized);
        info!("engine uninitialized");
        Ok(())
    }

    /// Playback first, then capture, so the consumer never waits on a
    /// silenced producer.
    fn stop_streams(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.render.stop() {
                warn!("failed to stop playback stream: {e}");
            }
            if let Err(e) = session.capture.stop() {
                warn!("failed to stop capture stream: {e}");
            }
        }
    }

    fn compose_status(&self) -> EngineStatus {
        let session = match &self.session {
            Some(session) => session,
            None => return EngineStatus::idle(self.shared.volume(), self.shared.last_error()),
        };

        let fill_frames = session.ring.available_read();
        let rate = session.config.sample_rate as f32;
        let capture_format = session.capture.format();
        let render_format = session.render.format();

        EngineStatus {
            running: self.shared.running.load(Ordering::SeqCst),
            fill_level: fill_frames as f32 / session.ring.capacity() as f32,
            latency_ms: (fill_frames as f32 + render_format.period_frames as f32) / rate * 1000.0,
            capture_latency_ms: capture_format.period_frames as f32
                / capture_format.sample_rate as f32
                * 1000.0,
            playback_latency_ms: render_format.period_frames as f32
                / render_format.sample_rate as f32
                * 1000.0,
            underruns: self.shared.underruns.load(Ordering::Relaxed),
            overruns: self.shared.overruns.load(Ordering::Relaxed),
            drift_corrections: self.shared.drift_corrections.load(Ordering::Relaxed),
            volume: self.shared.volume(),
            last_error: self.shared.last_error(),
        }
    }

    fn handle_device_change(&mut self, change: DeviceChange) {
        match change {
            DeviceChange::Removed(direction, id) => {
                if self.state == EngineState::Running && self.session_uses(&id) {
                    warn!(?direction, %id, "configured endpoint removed while running");
                    self.disconnect(id);
                }
            }
            DeviceChange::Added(direction, info) => {
                debug!(?direction, id = %info.id, "device added");
                if self.state == EngineState::Stopped
                    && self.intent_running
                    && self.session_uses(&info.id)
                {
                    self.reconnect_at = Some(Instant::now() + RECONNECT_SETTLE);
                }
            }
        }
    }

    /// Disconnect path: Running -> Stopped, keeping the running intent so
    /// a re-added endpoint triggers an automatic restart.
    fn disconnect(&mut self, id: String) {
        self.stop_streams();
        self.shared.set_last_error(ErrorKind::DeviceLost);
        self.set_state(EngineState::Stopped);
        self.emit(Event::DeviceDisconnected { id });
        self.emit(Event::StateChanged { running: false });
    }

    fn handle_stream_fault(&mut self, direction: Direction, err: HostError) {
        match err {
            HostError::DeviceLost(_) => {
                if self.state == EngineState::Running {
                    let id = match (&self.session, direction) {
                        (Some(session), Direction::Capture) => session.capture_id.clone(),
                        (Some(session), Direction::Playback) => session.render_id.clone(),
                        (None, _) => String::new(),
                    };
                    warn!(?direction, %id, "stream reported device lost");
                    self.disconnect(id);
                }
            }
            other => {
                error!(?direction, "stream fault: {other}");
                if self.state == EngineState::Running {
                    self.enter_faulted(ErrorKind::Internal, other.to_string());
                } else {
                    self.shared.set_last_error(ErrorKind::Internal);
                    self.emit(Event::error(ErrorKind::Internal, other));
                }
            }
        }
    }

    fn enter_faulted(&mut self, kind: ErrorKind, message: String) {
        let was_running = self.state == EngineState::Running;
        self.stop_streams();
        self.shared.set_last_error(kind);
        self.set_state(EngineState::Faulted);
        error!("engine faulted: {message}");
        self.emit(Event::Error { kind, message });
        if was_running {
            self.emit(Event::StateChanged { running: false });
        }
    }

    fn session_uses(&self, id: &str) -> bool {
        self.session
            .as_ref()
            .map(|s| s.capture_id == id || s.render_id == id)
            .unwrap_or(false)
    }

    fn fault_callback(&self, direction: Direction) -> sidetone_host::StreamErrorCallback {
        let tx = self.command_tx.clone();
        Box::new(move |err| {
            // Never block a host thread; a dropped duplicate fault is fine.
            let _ = tx.try_send(Command::StreamFault(direction, err));
        })
    }

    fn set_state(&mut self, state: EngineState) {
        self.state = state;
        self.state_code.store(state as u8, Ordering::SeqCst);
    }

    fn emit(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }
}

fn stream_request(config: &EngineConfig, device_id: Option<String>) -> StreamRequest {
    StreamRequest {
        device_id,
        sample_rate: config.sample_rate,
        channels: config.channels,
        period_frames: config.period_frames,
        share_mode: config.share_mode,
        profile: config.profile,
        bypass_os_resampler: config.bypass_os_resampler,
        // Both legs always request pro-audio scheduling; the workers read
        // this flag when deciding to promote their callback thread.
        pro_audio: true,
    }
}

fn check_channels(format: &NegotiatedFormat, config: &EngineConfig) -> EngineResult<()> {
    if format.channels != config.channels {
        return Err(EngineError::DeviceOpenFailed(format!(
            "device granted {} channels, engine configured for {}",
            format.channels, config.channels
        )));
    }
    Ok(())
}

/// Capture may run above the internal rate by an integer factor (the
/// worker decimates); anything else is refused rather than letting drift
/// beyond the compensator's range creep in.
fn decimator_for(
    format: &NegotiatedFormat,
    config: &EngineConfig,
) -> EngineResult<Option<Decimator>> {
    if format.sample_rate == config.sample_rate {
        return Ok(None);
    }
    Decimator::new(
        format.sample_rate,
        config.sample_rate,
        config.channels as usize,
    )
    .map(Some)
    .ok_or_else(|| {
        EngineError::InvalidArgument(format!(
            "capture device rate {} Hz has no integer decimation ratio to {} Hz",
            format.sample_rate, config.sample_rate
        ))
    })
}

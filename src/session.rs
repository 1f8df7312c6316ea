//! Capture session controller
//!
//! Owns a [`CaptureDevice`] on a dedicated serial worker thread. Every
//! hardware operation (format activation, start/stop, torch, focus, exposure,
//! zoom, photo capture) is queued to that thread, so committing a format can
//! never race another configuration change on the same device.
//!
//! Requests return a [`Pending`] completion that can be awaited from any async
//! runtime or waited on synchronously.

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::config::{CrabCaptureConfig, PhotoConfig, SessionConfig};
use crate::delegate::{CameraDelegate, CameraEvent, DelegateBridge, SubscriptionId};
use crate::device::{CaptureDevice, ConfigurationLock};
use crate::device_model::{zoom_override_for, DeviceModel, ZoomOverride};
use crate::errors::CameraError;
use crate::format_selector;
use crate::types::{
    AuthorizationStatus, CameraFrame, CapturedPhoto, InterruptionReason, PhotoSettings,
    PointOfInterest, Selection, SelectionCriteria, SystemPressureLevel, TorchMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Configured,
    Running,
    Stopped,
    Closed,
}

/// Latest hardware status reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub torch_available: bool,
    pub system_pressure: Option<SystemPressureLevel>,
    pub adjusting_focus: bool,
    pub adjusting_exposure: bool,
    pub interruption: Option<InterruptionReason>,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
}

struct Shared {
    state: Mutex<SessionState>,
    status: Mutex<DeviceStatus>,
    selection: Mutex<Option<Selection>>,
    bridge: DelegateBridge,
}

type Reply<T> = oneshot::Sender<Result<T, CameraError>>;

enum Command {
    Configure {
        criteria: SelectionCriteria,
        reply: Reply<Selection>,
    },
    Start {
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    SetTorch {
        mode: TorchMode,
        reply: Reply<()>,
    },
    Focus {
        point: PointOfInterest,
        reply: Reply<()>,
    },
    Expose {
        point: PointOfInterest,
        reply: Reply<()>,
    },
    Zoom {
        factor: f64,
        reply: Reply<()>,
    },
    CapturePhoto {
        settings: PhotoSettings,
        reply: Reply<CapturedPhoto>,
    },
    Shutdown,
}

/// Completion of a queued session operation.
///
/// Resolves to [`CameraError::WorkerUnavailable`] if the worker exited before
/// answering.
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, CameraError>>,
}

impl<T> Pending<T> {
    /// Block the calling thread until the worker answers.
    ///
    /// Must not be called from inside an async runtime; await instead.
    pub fn wait(self) -> Result<T, CameraError> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(CameraError::WorkerUnavailable))
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(mut self, timeout: Duration) -> Result<T, CameraError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.rx.try_recv() {
                Ok(result) => return result,
                Err(oneshot::error::TryRecvError::Closed) => {
                    return Err(CameraError::WorkerUnavailable)
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
            if Instant::now() >= deadline {
                return Err(CameraError::Timeout(format!(
                    "session worker did not answer within {:?}",
                    timeout
                )));
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, CameraError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CameraError::WorkerUnavailable)))
    }
}

pub struct SessionController {
    shared: Arc<Shared>,
    commands: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: SessionConfig,
    photo: PhotoConfig,
    default_criteria: SelectionCriteria,
    device_id: String,
}

impl SessionController {
    /// Validate `config` and spawn the worker that will own `device`.
    pub fn new<D: CaptureDevice>(
        device: D,
        config: &CrabCaptureConfig,
    ) -> Result<Self, CameraError> {
        config.validate()?;

        let device_id = device.id().to_string();
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState::Idle),
            status: Mutex::new(DeviceStatus {
                torch_available: device.has_torch(),
                ..DeviceStatus::default()
            }),
            selection: Mutex::new(None),
            bridge: DelegateBridge::new(),
        });

        let (tx, rx) = crossbeam_channel::unbounded();
        let worker_shared = shared.clone();
        let zoom_overrides = config.session.zoom_overrides.clone();
        let device: Box<dyn CaptureDevice> = Box::new(device);
        let handle = std::thread::Builder::new()
            .name(config.session.worker_thread_name.clone())
            .spawn(move || run_worker(device, worker_shared, rx, zoom_overrides))
            .map_err(|e| CameraError::SessionError(format!("spawn failed: {e}")))?;

        log::info!("Session controller created for device {}", device_id);

        Ok(Self {
            shared,
            commands: tx,
            worker: Mutex::new(Some(handle)),
            config: config.session.clone(),
            photo: config.photo.clone(),
            default_criteria: config.selection.clone(),
            device_id,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn bridge(&self) -> &DelegateBridge {
        &self.shared.bridge
    }

    pub fn subscribe<D: CameraDelegate + 'static>(&self, delegate: D) -> SubscriptionId {
        self.shared.bridge.subscribe(delegate)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.bridge.unsubscribe(id)
    }

    /// Handle the host's video output uses to hand over frames.
    pub fn frame_sink(&self) -> FrameSink {
        FrameSink {
            shared: self.shared.clone(),
        }
    }

    /// Handle the host's observers use to report hardware status.
    pub fn status_sink(&self) -> StatusSink {
        StatusSink {
            shared: self.shared.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.shared.state)
    }

    pub fn status(&self) -> DeviceStatus {
        lock(&self.shared.status).clone()
    }

    pub fn active_selection(&self) -> Option<Selection> {
        lock(&self.shared.selection).clone()
    }

    /// Select and activate a format for `criteria`.
    pub fn configure(&self, criteria: SelectionCriteria) -> Pending<Selection> {
        self.submit(|reply| Command::Configure { criteria, reply })
    }

    /// Configure with the criteria from the loaded configuration.
    pub fn configure_default(&self) -> Pending<Selection> {
        self.configure(self.default_criteria.clone())
    }

    /// Configure and wait up to the configured timeout.
    pub fn configure_blocking(
        &self,
        criteria: SelectionCriteria,
    ) -> Result<Selection, CameraError> {
        self.configure(criteria)
            .wait_timeout(self.config.configure_timeout())
    }

    pub fn start(&self) -> Pending<()> {
        self.submit(|reply| Command::Start { reply })
    }

    pub fn stop(&self) -> Pending<()> {
        self.submit(|reply| Command::Stop { reply })
    }

    pub fn set_torch_mode(&self, mode: TorchMode) -> Pending<()> {
        self.submit(|reply| Command::SetTorch { mode, reply })
    }

    pub fn focus_at(&self, point: PointOfInterest) -> Pending<()> {
        self.submit(|reply| Command::Focus { point, reply })
    }

    pub fn expose_at(&self, point: PointOfInterest) -> Pending<()> {
        self.submit(|reply| Command::Expose { point, reply })
    }

    pub fn set_zoom_factor(&self, factor: f64) -> Pending<()> {
        self.submit(|reply| Command::Zoom { factor, reply })
    }

    /// Capture a still. `None` uses the configured photo defaults.
    pub fn capture_photo(&self, settings: Option<PhotoSettings>) -> Pending<CapturedPhoto> {
        let settings = settings.unwrap_or_else(|| self.photo.settings());
        self.submit(|reply| Command::CapturePhoto { settings, reply })
    }

    /// Stop the session, drain queued work and join the worker.
    pub fn shutdown(&self) -> Result<(), CameraError> {
        let handle = lock(&self.worker).take();
        let Some(handle) = handle else {
            return Ok(());
        };

        // Fails only if the worker is already gone
        let _ = self.commands.send(Command::Shutdown);

        let timeout = self.config.shutdown_timeout();
        let start = Instant::now();
        while !handle.is_finished() {
            if start.elapsed() >= timeout {
                *lock(&self.worker) = Some(handle);
                return Err(CameraError::Timeout(
                    "session worker did not exit".to_string(),
                ));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        if handle.join().is_err() {
            log::error!("Session worker for {} panicked", self.device_id);
        }

        *lock(&self.shared.state) = SessionState::Closed;
        log::info!("Session controller for {} shut down", self.device_id);
        Ok(())
    }

    fn submit<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Pending<T> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(make(tx)).is_err() {
            // The command and its reply sender were dropped; rx reports it
            log::warn!("Session worker for {} is not running", self.device_id);
        }
        Pending { rx }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Error shutting down session in drop: {}", e);
        }
    }
}

/// Entry point for frames produced by the host's video output.
#[derive(Clone)]
pub struct FrameSink {
    shared: Arc<Shared>,
}

impl FrameSink {
    /// Forward a frame to subscribers.
    ///
    /// Frames are dropped while the session is not running or is
    /// interrupted. Returns whether the frame was delivered.
    pub fn deliver(&self, frame: CameraFrame) -> bool {
        let running = *lock(&self.shared.state) == SessionState::Running;
        {
            let mut status = lock(&self.shared.status);
            if !running || status.interruption.is_some() {
                status.frames_dropped += 1;
                return false;
            }
            status.frames_delivered += 1;
        }
        self.shared.bridge.publish(CameraEvent::FrameOutput(frame));
        true
    }
}

/// Entry point for hardware status observed by the host.
#[derive(Clone)]
pub struct StatusSink {
    shared: Arc<Shared>,
}

impl StatusSink {
    pub fn torch_availability_changed(&self, available: bool) {
        lock(&self.shared.status).torch_available = available;
        self.shared
            .bridge
            .publish(CameraEvent::TorchAvailabilityChanged(available));
    }

    pub fn system_pressure_changed(&self, level: SystemPressureLevel) {
        if matches!(
            level,
            SystemPressureLevel::Critical | SystemPressureLevel::Shutdown
        ) {
            log::warn!("System pressure is {:?}", level);
        }
        lock(&self.shared.status).system_pressure = Some(level);
        self.shared
            .bridge
            .publish(CameraEvent::SystemPressureChanged(level));
    }

    pub fn adjusting_focus_changed(&self, adjusting: bool) {
        lock(&self.shared.status).adjusting_focus = adjusting;
        self.shared
            .bridge
            .publish(CameraEvent::AdjustingFocusChanged(adjusting));
    }

    pub fn adjusting_exposure_changed(&self, adjusting: bool) {
        lock(&self.shared.status).adjusting_exposure = adjusting;
        self.shared
            .bridge
            .publish(CameraEvent::AdjustingExposureChanged(adjusting));
    }

    pub fn session_interrupted(&self, reason: InterruptionReason) {
        log::info!("Session interrupted: {:?}", reason);
        lock(&self.shared.status).interruption = Some(reason);
        self.shared
            .bridge
            .publish(CameraEvent::SessionInterrupted(reason));
    }

    pub fn interruption_ended(&self) {
        log::info!("Session interruption ended");
        lock(&self.shared.status).interruption = None;
        self.shared.bridge.publish(CameraEvent::InterruptionEnded);
    }

    pub fn runtime_error(&self, message: impl Into<String>) {
        let message = message.into();
        log::error!("Capture session runtime error: {}", message);
        self.shared
            .bridge
            .publish(CameraEvent::RuntimeError(message));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn run_worker(
    mut device: Box<dyn CaptureDevice>,
    shared: Arc<Shared>,
    commands: Receiver<Command>,
    zoom_overrides: Vec<ZoomOverride>,
) {
    log::debug!("Session worker started for device {}", device.id());

    for command in commands.iter() {
        match command {
            Command::Configure { criteria, reply } => {
                let result = configure(device.as_mut(), &shared, &criteria, &zoom_overrides);
                let _ = reply.send(result);
            }
            Command::Start { reply } => {
                let _ = reply.send(start(device.as_mut(), &shared));
            }
            Command::Stop { reply } => {
                let _ = reply.send(stop(device.as_mut(), &shared));
            }
            Command::SetTorch { mode, reply } => {
                let result = if device.has_torch() {
                    with_configuration_lock(device.as_mut(), |d| d.set_torch_mode(mode))
                } else {
                    Err(CameraError::ControlError("device has no torch".to_string()))
                };
                let _ = reply.send(result);
            }
            Command::Focus { point, reply } => {
                let result = with_configuration_lock(device.as_mut(), |d| d.set_focus_point(point));
                let _ = reply.send(result);
            }
            Command::Expose { point, reply } => {
                let result =
                    with_configuration_lock(device.as_mut(), |d| d.set_exposure_point(point));
                let _ = reply.send(result);
            }
            Command::Zoom { factor, reply } => {
                let _ = reply.send(set_zoom(device.as_mut(), factor));
            }
            Command::CapturePhoto { settings, reply } => {
                let _ = reply.send(capture_photo(device.as_mut(), &shared, &settings));
            }
            Command::Shutdown => break,
        }
    }

    if *lock(&shared.state) == SessionState::Running {
        device.stop_running();
        shared.bridge.publish(CameraEvent::SessionStopped);
    }
    *lock(&shared.state) = SessionState::Closed;
    log::debug!("Session worker for device {} exited", device.id());
}

fn configure(
    device: &mut dyn CaptureDevice,
    shared: &Shared,
    criteria: &SelectionCriteria,
    zoom_overrides: &[ZoomOverride],
) -> Result<Selection, CameraError> {
    criteria.validate()?;

    let formats = device.supported_formats();
    let selection = format_selector::select(&formats, criteria).map_err(|e| {
        log::warn!(
            "Format selection failed for {} ({} formats): {}",
            device.id(),
            formats.len(),
            e
        );
        CameraError::from(e)
    })?;

    let zoom = zoom_factor_for(device, zoom_overrides);

    {
        let mut guard = ConfigurationLock::acquire(device)?;
        guard
            .device()
            .activate_format(&selection.format, selection.frame_duration)
            .map_err(|e| {
                log::error!("Failed to activate format {}: {}", selection.format, e);
                e
            })?;
        if let Some(factor) = zoom {
            match guard.device().set_zoom_factor(factor) {
                Ok(()) => log::info!("Applied model zoom override {}", factor),
                Err(e) => log::warn!("Model zoom override {} not applied: {}", factor, e),
            }
        }
    }

    *lock(&shared.selection) = Some(selection.clone());
    {
        let mut state = lock(&shared.state);
        if *state == SessionState::Idle {
            *state = SessionState::Configured;
        }
    }

    log::info!(
        "Configured {} with {}{}",
        device.id(),
        selection.format,
        selection
            .frame_duration
            .map(|d| format!(" pinned at {}/{}s", d.value, d.timescale))
            .unwrap_or_default()
    );
    Ok(selection)
}

fn zoom_factor_for(device: &dyn CaptureDevice, overrides: &[ZoomOverride]) -> Option<f64> {
    let identifier = device.model_identifier()?;
    let model = match DeviceModel::parse(&identifier) {
        Ok(model) => model,
        Err(e) => {
            log::debug!("Ignoring model identifier: {}", e);
            return None;
        }
    };
    zoom_override_for(&model, overrides)
        .map(|factor| factor.clamp(1.0, device.max_zoom_factor().max(1.0)))
}

fn start(device: &mut dyn CaptureDevice, shared: &Shared) -> Result<(), CameraError> {
    {
        let state = lock(&shared.state);
        match *state {
            SessionState::Configured | SessionState::Stopped => {}
            SessionState::Idle => {
                return Err(CameraError::SessionError(
                    "session must be configured before starting".to_string(),
                ))
            }
            SessionState::Running => {
                return Err(CameraError::SessionError(
                    "session is already running".to_string(),
                ))
            }
            SessionState::Closed => {
                return Err(CameraError::SessionError("session is closed".to_string()))
            }
        }
    }

    match device.authorization_status() {
        AuthorizationStatus::Authorized => {}
        status => {
            return Err(CameraError::PermissionDenied(format!(
                "camera access is {}",
                status.as_str()
            )))
        }
    }

    device.start_running()?;
    *lock(&shared.state) = SessionState::Running;
    log::info!("Capture session running on {}", device.id());
    shared.bridge.publish(CameraEvent::SessionStarted);
    Ok(())
}

fn stop(device: &mut dyn CaptureDevice, shared: &Shared) -> Result<(), CameraError> {
    if *lock(&shared.state) != SessionState::Running {
        return Err(CameraError::SessionError(
            "session is not running".to_string(),
        ));
    }
    // Output callbacks may still deliver frames while the device drains
    device.stop_running();
    *lock(&shared.state) = SessionState::Stopped;
    log::info!("Capture session stopped on {}", device.id());
    shared.bridge.publish(CameraEvent::SessionStopped);
    Ok(())
}

fn set_zoom(device: &mut dyn CaptureDevice, factor: f64) -> Result<(), CameraError> {
    let max = device.max_zoom_factor();
    if !factor.is_finite() || factor < 1.0 || factor > max {
        return Err(CameraError::ControlError(format!(
            "zoom factor {} outside 1.0..={}",
            factor, max
        )));
    }
    with_configuration_lock(device, |d| d.set_zoom_factor(factor))
}

fn capture_photo(
    device: &mut dyn CaptureDevice,
    shared: &Shared,
    settings: &PhotoSettings,
) -> Result<CapturedPhoto, CameraError> {
    if *lock(&shared.state) != SessionState::Running {
        return Err(CameraError::CaptureError(
            "session is not running".to_string(),
        ));
    }

    match device.capture_photo(settings) {
        Ok(photo) => {
            log::debug!("Captured photo {} ({}x{})", photo.id, photo.width, photo.height);
            shared
                .bridge
                .publish(CameraEvent::PhotoCaptured(photo.clone()));
            Ok(photo)
        }
        Err(e) => {
            log::warn!("Photo capture failed: {}", e);
            shared.bridge.publish(CameraEvent::PhotoFailed(e.to_string()));
            Err(e)
        }
    }
}

fn with_configuration_lock<F>(device: &mut dyn CaptureDevice, change: F) -> Result<(), CameraError>
where
    F: FnOnce(&mut dyn CaptureDevice) -> Result<(), crate::errors::ActivationError>,
{
    let mut guard = ConfigurationLock::acquire(device)?;
    change(guard.device())?;
    Ok(())
}

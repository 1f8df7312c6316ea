//! Scripted [`CaptureDevice`] for tests and demos.
//!
//! Every call is recorded in a shared [`MockRecord`]; keep the handle from
//! [`MockCaptureDevice::record`] before moving the device into a session.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::device::CaptureDevice;
use crate::errors::{ActivationError, CameraError};
use crate::types::{
    AuthorizationStatus, CaptureFormat, CapturedPhoto, FrameDuration, PhotoSettings,
    PointOfInterest, TorchMode,
};

#[derive(Debug, Default, Clone)]
pub struct MockRecord {
    pub locks: u32,
    pub unlocks: u32,
    pub locked: bool,
    pub activations: Vec<(CaptureFormat, Option<FrameDuration>)>,
    pub active_format: Option<CaptureFormat>,
    pub running: bool,
    pub start_calls: u32,
    pub stop_calls: u32,
    pub torch_modes: Vec<TorchMode>,
    pub focus_points: Vec<PointOfInterest>,
    pub exposure_points: Vec<PointOfInterest>,
    pub zoom_factors: Vec<f64>,
    pub photos_taken: u32,
}

type StopHook = Box<dyn FnMut() + Send>;

pub struct MockCaptureDevice {
    id: String,
    model: Option<String>,
    authorization: AuthorizationStatus,
    formats: Vec<CaptureFormat>,
    torch: bool,
    max_zoom: f64,
    fail_lock: bool,
    fail_activation: Option<String>,
    fail_photo: bool,
    fail_zoom: Option<String>,
    on_stop: Option<StopHook>,
    record: Arc<Mutex<MockRecord>>,
}

impl MockCaptureDevice {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            model: None,
            authorization: AuthorizationStatus::Authorized,
            formats: Vec::new(),
            torch: false,
            max_zoom: 1.0,
            fail_lock: false,
            fail_activation: None,
            fail_photo: false,
            fail_zoom: None,
            on_stop: None,
            record: Arc::new(Mutex::new(MockRecord::default())),
        }
    }

    pub fn with_formats(mut self, formats: Vec<CaptureFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn with_authorization(mut self, status: AuthorizationStatus) -> Self {
        self.authorization = status;
        self
    }

    pub fn with_torch(mut self) -> Self {
        self.torch = true;
        self
    }

    pub fn with_max_zoom(mut self, factor: f64) -> Self {
        self.max_zoom = factor;
        self
    }

    pub fn fail_lock(mut self) -> Self {
        self.fail_lock = true;
        self
    }

    pub fn fail_activation(mut self, reason: &str) -> Self {
        self.fail_activation = Some(reason.to_string());
        self
    }

    pub fn fail_photo(mut self) -> Self {
        self.fail_photo = true;
        self
    }

    pub fn fail_zoom(mut self, reason: &str) -> Self {
        self.fail_zoom = Some(reason.to_string());
        self
    }

    /// Run `hook` inside `stop_running`, before the device reports stopped.
    pub fn on_stop<F>(mut self, hook: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_stop = Some(Box::new(hook));
        self
    }

    /// Shared handle to the call log.
    pub fn record(&self) -> Arc<Mutex<MockRecord>> {
        self.record.clone()
    }

    pub fn lock_count(&self) -> u32 {
        self.state().locks
    }

    pub fn unlock_count(&self) -> u32 {
        self.state().unlocks
    }

    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    fn state(&self) -> MutexGuard<'_, MockRecord> {
        // A panicking test thread must not hide the record from the next assertion
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn require_lock(&self, what: &str) -> Result<(), ActivationError> {
        if self.state().locked {
            Ok(())
        } else {
            Err(ActivationError::LockFailed(format!(
                "{} changed without configuration lock",
                what
            )))
        }
    }
}

impl CaptureDevice for MockCaptureDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn model_identifier(&self) -> Option<String> {
        self.model.clone()
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        self.authorization
    }

    fn supported_formats(&self) -> Vec<CaptureFormat> {
        self.formats.clone()
    }

    fn lock_for_configuration(&mut self) -> Result<(), ActivationError> {
        if self.fail_lock {
            return Err(ActivationError::LockFailed("device busy".to_string()));
        }
        let mut state = self.state();
        state.locks += 1;
        state.locked = true;
        Ok(())
    }

    fn unlock_for_configuration(&mut self) {
        let mut state = self.state();
        state.unlocks += 1;
        state.locked = false;
    }

    fn activate_format(
        &mut self,
        format: &CaptureFormat,
        frame_duration: Option<FrameDuration>,
    ) -> Result<(), ActivationError> {
        self.require_lock("active format")?;
        if let Some(reason) = &self.fail_activation {
            return Err(ActivationError::Rejected(reason.clone()));
        }
        if !self.formats.contains(format) {
            return Err(ActivationError::Rejected(format!(
                "format not offered by device: {}",
                format
            )));
        }
        let mut state = self.state();
        state.activations.push((format.clone(), frame_duration));
        state.active_format = Some(format.clone());
        Ok(())
    }

    fn start_running(&mut self) -> Result<(), CameraError> {
        let mut state = self.state();
        state.start_calls += 1;
        state.running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        if let Some(hook) = self.on_stop.as_mut() {
            hook();
        }
        let mut state = self.state();
        state.stop_calls += 1;
        state.running = false;
    }

    fn has_torch(&self) -> bool {
        self.torch
    }

    fn set_torch_mode(&mut self, mode: TorchMode) -> Result<(), ActivationError> {
        if !self.torch {
            return Err(ActivationError::Unsupported("torch".to_string()));
        }
        self.require_lock("torch mode")?;
        self.state().torch_modes.push(mode);
        Ok(())
    }

    fn set_focus_point(&mut self, point: PointOfInterest) -> Result<(), ActivationError> {
        self.require_lock("focus point")?;
        self.state().focus_points.push(point);
        Ok(())
    }

    fn set_exposure_point(&mut self, point: PointOfInterest) -> Result<(), ActivationError> {
        self.require_lock("exposure point")?;
        self.state().exposure_points.push(point);
        Ok(())
    }

    fn max_zoom_factor(&self) -> f64 {
        self.max_zoom
    }

    fn set_zoom_factor(&mut self, factor: f64) -> Result<(), ActivationError> {
        self.require_lock("zoom factor")?;
        if let Some(reason) = &self.fail_zoom {
            return Err(ActivationError::Rejected(reason.clone()));
        }
        self.state().zoom_factors.push(factor);
        Ok(())
    }

    fn capture_photo(&mut self, settings: &PhotoSettings) -> Result<CapturedPhoto, CameraError> {
        if self.fail_photo {
            return Err(CameraError::CaptureError("shutter failed".to_string()));
        }
        let mut state = self.state();
        let format = state
            .active_format
            .clone()
            .ok_or_else(|| CameraError::CaptureError("no active format".to_string()))?;
        state.photos_taken += 1;

        let (width, height) = if settings.high_resolution {
            (format.still_width, format.still_height)
        } else {
            (format.video_width, format.video_height)
        };
        Ok(CapturedPhoto::new(
            vec![0xff, 0xd8, 0xff, 0xd9],
            width,
            height,
            settings.clone(),
        ))
    }
}

//! Host camera device abstraction
//!
//! The host platform (AVFoundation on iOS, or a test double) implements
//! [`CaptureDevice`]. The session controller owns the device on its worker
//! thread, so implementations only need to be `Send`.

use crate::errors::{ActivationError, CameraError};
use crate::types::{
    AuthorizationStatus, CaptureFormat, CapturedPhoto, DevicePosition, FrameDuration,
    PhotoSettings, PointOfInterest, TorchMode,
};

pub trait CaptureDevice: Send + 'static {
    /// Stable identifier of the device
    fn id(&self) -> &str;

    fn position(&self) -> DevicePosition {
        DevicePosition::Back
    }

    /// Hardware model identifier of the host, e.g. `iPhone12,1`.
    fn model_identifier(&self) -> Option<String> {
        None
    }

    fn authorization_status(&self) -> AuthorizationStatus;

    /// Supported formats in the device's own deterministic order.
    fn supported_formats(&self) -> Vec<CaptureFormat>;

    fn lock_for_configuration(&mut self) -> Result<(), ActivationError>;

    fn unlock_for_configuration(&mut self);

    /// Commit `format` and, when given, pin both min and max frame duration.
    ///
    /// Only called while the configuration lock is held.
    fn activate_format(
        &mut self,
        format: &CaptureFormat,
        frame_duration: Option<FrameDuration>,
    ) -> Result<(), ActivationError>;

    fn start_running(&mut self) -> Result<(), CameraError>;

    fn stop_running(&mut self);

    fn has_torch(&self) -> bool {
        false
    }

    fn set_torch_mode(&mut self, _mode: TorchMode) -> Result<(), ActivationError> {
        Err(ActivationError::Unsupported("torch".to_string()))
    }

    fn set_focus_point(&mut self, _point: PointOfInterest) -> Result<(), ActivationError> {
        Err(ActivationError::Unsupported("focus point of interest".to_string()))
    }

    fn set_exposure_point(&mut self, _point: PointOfInterest) -> Result<(), ActivationError> {
        Err(ActivationError::Unsupported("exposure point of interest".to_string()))
    }

    fn max_zoom_factor(&self) -> f64 {
        1.0
    }

    fn set_zoom_factor(&mut self, _factor: f64) -> Result<(), ActivationError> {
        Err(ActivationError::Unsupported("zoom".to_string()))
    }

    fn capture_photo(&mut self, settings: &PhotoSettings) -> Result<CapturedPhoto, CameraError>;
}

/// Holds the configuration lock for the lifetime of the guard.
pub struct ConfigurationLock<'a> {
    device: &'a mut dyn CaptureDevice,
}

impl<'a> ConfigurationLock<'a> {
    pub fn acquire(device: &'a mut dyn CaptureDevice) -> Result<Self, ActivationError> {
        device.lock_for_configuration()?;
        Ok(Self { device })
    }

    pub fn device(&mut self) -> &mut dyn CaptureDevice {
        &mut *self.device
    }
}

impl Drop for ConfigurationLock<'_> {
    fn drop(&mut self) {
        self.device.unlock_for_configuration();
    }
}

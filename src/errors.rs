use std::fmt;

/// Failures produced by format selection.
///
/// Both variants are recoverable by the caller: the first means the device is
/// unusable, the second means the requested constraints are too strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("device reports no capture formats")]
    NoFormatsAvailable,
    #[error("no capture format satisfies the requested constraints")]
    NoAppropriateFormat,
}

/// Hardware-level failures reported by a [`crate::device::CaptureDevice`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationError {
    #[error("could not lock device for configuration: {0}")]
    LockFailed(String),
    #[error("device rejected configuration: {0}")]
    Rejected(String),
    #[error("operation not supported by device: {0}")]
    Unsupported(String),
}

#[derive(Debug)]
pub enum CameraError {
    Selection(SelectionError),
    ActivationFailed(ActivationError),
    ConfigurationError(String),
    PermissionDenied(String),
    SessionError(String),
    CaptureError(String),
    ControlError(String),
    ConversionError(String),
    WorkerUnavailable,
    Timeout(String),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CameraError::Selection(e) => write!(f, "Format selection error: {}", e),
            CameraError::ActivationFailed(e) => write!(f, "Format activation failed: {}", e),
            CameraError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            CameraError::PermissionDenied(msg) => write!(f, "Permission denied error: {}", msg),
            CameraError::SessionError(msg) => write!(f, "Session error: {}", msg),
            CameraError::CaptureError(msg) => write!(f, "Capture error: {}", msg),
            CameraError::ControlError(msg) => write!(f, "Camera control error: {}", msg),
            CameraError::ConversionError(msg) => write!(f, "Image conversion error: {}", msg),
            CameraError::WorkerUnavailable => write!(f, "Session worker is not running"),
            CameraError::Timeout(msg) => write!(f, "Timed out: {}", msg),
        }
    }
}

impl std::error::Error for CameraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CameraError::Selection(e) => Some(e),
            CameraError::ActivationFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SelectionError> for CameraError {
    fn from(e: SelectionError) -> Self {
        CameraError::Selection(e)
    }
}

impl From<ActivationError> for CameraError {
    fn from(e: ActivationError) -> Self {
        CameraError::ActivationFailed(e)
    }
}

impl CameraError {
    /// True when the error came from the selector rather than the hardware.
    pub fn is_selection_failure(&self) -> bool {
        matches!(self, CameraError::Selection(_))
    }

    /// True when the device refused to commit a configuration.
    pub fn is_activation_failure(&self) -> bool {
        matches!(self, CameraError::ActivationFailed(_))
    }
}

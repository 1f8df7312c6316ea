//! CrabCapture: camera capture sessions with device format negotiation
//!
//! This crate configures a camera capture session on top of a host camera
//! framework, picks the capture format that best fits the caller's
//! constraints, streams frames, captures photos, and forwards hardware status
//! to subscribers.
//!
//! # Features
//! - Pure, deterministic capture format selection
//! - Serialized device configuration on a dedicated worker thread
//! - Frame, photo and hardware status fan-out to delegates
//! - TOML configuration with validation
//! - Device model parsing for per-model tweaks
//!
//! # Usage
//! ```rust,no_run
//! use crabcapture::config::CrabCaptureConfig;
//! use crabcapture::session::SessionController;
//! use crabcapture::testing::{rear_camera_catalog, MockCaptureDevice};
//!
//! let device = MockCaptureDevice::new("back").with_formats(rear_camera_catalog());
//! let session = SessionController::new(device, &CrabCaptureConfig::default())?;
//! let selection = session.configure_default().wait()?;
//! println!("running at {}", selection.format);
//! session.start().wait()?;
//! # Ok::<(), crabcapture::CameraError>(())
//! ```
pub mod config;
pub mod delegate;
pub mod device;
pub mod device_model;
pub mod errors;
pub mod format_selector;
pub mod image_convert;
pub mod invariant_ppt;
pub mod session;
pub mod types;

// Testing utilities - synthetic catalogs and a scripted device
pub mod testing;

// Re-exports for convenience
pub use delegate::{CameraDelegate, CameraEvent, DelegateBridge, SubscriptionId};
pub use device::CaptureDevice;
pub use device_model::{DeviceKind, DeviceModel};
pub use errors::{ActivationError, CameraError, SelectionError};
pub use format_selector::{explain, select};
pub use session::{SessionController, SessionState};
pub use types::{
    CameraFrame, CaptureFormat, CapturedPhoto, FrameDuration, FrameRateRange, HeightRange,
    Selection, SelectionCriteria,
};

/// Initialize logging for the capture layer
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabcapture=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "crabcapture");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}

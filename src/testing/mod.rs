//! Testing utilities for CrabCapture
//!
//! Synthetic format catalogs modeled on real phone cameras and a scripted
//! capture device, so the selector and the session controller can be
//! exercised without hardware.

pub mod mock_device;
pub mod synthetic_data;

pub use mock_device::{MockCaptureDevice, MockRecord};
pub use synthetic_data::{
    front_camera_catalog, rear_camera_catalog, synthetic_video_frame, widescreen_only_catalog,
};

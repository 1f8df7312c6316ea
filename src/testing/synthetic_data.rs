//! Format catalogs and frames shaped like real phone camera output
//!
//! The catalogs follow the layout phones actually report: formats grouped by
//! video size, small sizes first, with a lower-resolution still mode listed
//! before the full-sensor variant of the same video size.

use crate::types::{CameraFrame, CaptureFormat, PixelFormat};

const SENSOR_12MP: (u32, u32) = (4032, 3024);
const SENSOR_8MP: (u32, u32) = (3264, 2448);
const BINNED_12MP: (u32, u32) = (2016, 1512);

/// Rear wide camera of a 12MP phone.
pub fn rear_camera_catalog() -> Vec<CaptureFormat> {
    vec![
        CaptureFormat::new(SENSOR_12MP, (192, 144)).with_frame_rate_range(1.0, 30.0),
        CaptureFormat::new(SENSOR_12MP, (352, 288)).with_frame_rate_range(1.0, 30.0),
        CaptureFormat::new(SENSOR_12MP, (480, 360)).with_frame_rate_range(1.0, 30.0),
        CaptureFormat::new(BINNED_12MP, (640, 480)).with_frame_rate_range(1.0, 60.0),
        CaptureFormat::new(SENSOR_12MP, (640, 480)).with_frame_rate_range(1.0, 30.0),
        CaptureFormat::new(SENSOR_12MP, (960, 540)).with_frame_rate_range(1.0, 30.0),
        CaptureFormat::new(SENSOR_12MP, (1280, 720)).with_frame_rate_range(1.0, 30.0),
        CaptureFormat::new((1280, 720), (1280, 720)).with_frame_rate_range(1.0, 240.0),
        CaptureFormat::new(SENSOR_12MP, (1920, 1080)).with_frame_rate_range(1.0, 30.0),
        CaptureFormat::new((1920, 1080), (1920, 1080)).with_frame_rate_range(1.0, 120.0),
        CaptureFormat::new(SENSOR_12MP, (1920, 1440)).with_frame_rate_range(1.0, 30.0),
        CaptureFormat::new(SENSOR_12MP, (3840, 2160))
            .with_frame_rate_range(1.0, 30.0)
            .with_frame_rate_range(60.0, 60.0),
        CaptureFormat::new(SENSOR_12MP, (4032, 3024)).with_frame_rate_range(1.0, 30.0),
    ]
}

/// Front camera of an 8MP selfie module.
pub fn front_camera_catalog() -> Vec<CaptureFormat> {
    vec![
        CaptureFormat::new(SENSOR_8MP, (640, 480)).with_frame_rate_range(1.0, 30.0),
        CaptureFormat::new(SENSOR_8MP, (1280, 720)).with_frame_rate_range(1.0, 60.0),
        CaptureFormat::new(SENSOR_8MP, (1920, 1080)).with_frame_rate_range(1.0, 30.0),
        CaptureFormat::new(SENSOR_8MP, (3264, 2448)).with_frame_rate_range(1.0, 24.0),
    ]
}

/// A device that only streams 16:9 video.
pub fn widescreen_only_catalog() -> Vec<CaptureFormat> {
    vec![
        CaptureFormat::new((1920, 1080), (1280, 720)).with_frame_rate_range(1.0, 60.0),
        CaptureFormat::new((1920, 1080), (1920, 1080)).with_frame_rate_range(1.0, 30.0),
    ]
}

/// BGRA gradient frame that changes with `frame_number`.
pub fn synthetic_video_frame(frame_number: u64, width: u32, height: u32) -> CameraFrame {
    let mut data = vec![0u8; (width * height * 4) as usize];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 4) as usize;
            data[idx] = base.wrapping_add(((x + y) % 256) as u8); // B
            data[idx + 1] = base.wrapping_add((y % 256) as u8); // G
            data[idx + 2] = base.wrapping_add((x % 256) as u8); // R
            data[idx + 3] = 0xff;
        }
    }

    CameraFrame::new(data, width, height, "synthetic".to_string())
        .with_pixel_format(PixelFormat::Bgra32)
}

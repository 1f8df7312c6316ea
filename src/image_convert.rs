//! Frame to image conversion helpers

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::errors::CameraError;
use crate::types::{CameraFrame, PixelFormat};

/// How the sensor image must be rotated to appear upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Orientation {
    #[default]
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

/// Convert a frame into an owned image, honoring its pixel layout.
///
/// Row padding beyond `width * bytes_per_pixel` is not supported; frames must
/// be tightly packed.
pub fn frame_to_image(frame: &CameraFrame) -> Result<DynamicImage, CameraError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(CameraError::ConversionError(format!(
            "invalid frame size {}x{}",
            frame.width, frame.height
        )));
    }
    let expected = frame.expected_len();
    if frame.data.len() < expected {
        return Err(CameraError::ConversionError(format!(
            "frame has {} bytes, {}x{} {:?} needs {}",
            frame.data.len(),
            frame.width,
            frame.height,
            frame.pixel_format,
            expected
        )));
    }
    let pixels = frame.data[..expected].to_vec();
    let size_error =
        || CameraError::ConversionError("buffer does not match dimensions".to_string());

    let image = match frame.pixel_format {
        PixelFormat::Rgba32 => DynamicImage::ImageRgba8(
            RgbaImage::from_raw(frame.width, frame.height, pixels).ok_or_else(size_error)?,
        ),
        PixelFormat::Bgra32 => {
            let mut pixels = pixels;
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
            DynamicImage::ImageRgba8(
                RgbaImage::from_raw(frame.width, frame.height, pixels).ok_or_else(size_error)?,
            )
        }
        PixelFormat::Rgb24 => DynamicImage::ImageRgb8(
            RgbImage::from_raw(frame.width, frame.height, pixels).ok_or_else(size_error)?,
        ),
        PixelFormat::Gray8 => DynamicImage::ImageLuma8(
            GrayImage::from_raw(frame.width, frame.height, pixels).ok_or_else(size_error)?,
        ),
    };
    Ok(image)
}

/// Rotate and mirror `image` so it displays upright.
pub fn apply_orientation(image: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Up => image,
        Orientation::Down => image.rotate180(),
        Orientation::Left => image.rotate270(),
        Orientation::Right => image.rotate90(),
        Orientation::UpMirrored => image.fliph(),
        Orientation::DownMirrored => image.flipv(),
        Orientation::LeftMirrored => image.rotate270().fliph(),
        Orientation::RightMirrored => image.rotate90().fliph(),
    }
}

/// Upright RGB copy of a frame.
pub fn frame_to_rgb(
    frame: &CameraFrame,
    orientation: Orientation,
) -> Result<RgbImage, CameraError> {
    Ok(apply_orientation(frame_to_image(frame)?, orientation).to_rgb8())
}

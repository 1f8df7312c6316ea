//! Core value types shared by the selector, the session controller and the
//! delegate bridge.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CameraError;

/// Continuous frame-rate band a format can sustain, in frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRateRange {
    pub min: f64,
    pub max: f64,
}

impl FrameRateRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Inclusive on both ends. NaN never matches.
    pub fn contains(&self, rate: f64) -> bool {
        self.min <= rate && rate <= self.max
    }
}

/// One capture format exposed by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureFormat {
    /// Largest still image this format can produce
    pub still_width: u32,
    pub still_height: u32,
    /// Streamed video frame size
    pub video_width: u32,
    pub video_height: u32,
    #[serde(default)]
    pub frame_rate_ranges: Vec<FrameRateRange>,
}

impl CaptureFormat {
    pub fn new(still: (u32, u32), video: (u32, u32)) -> Self {
        Self {
            still_width: still.0,
            still_height: still.1,
            video_width: video.0,
            video_height: video.1,
            frame_rate_ranges: Vec::new(),
        }
    }

    pub fn with_frame_rate_range(mut self, min: f64, max: f64) -> Self {
        self.frame_rate_ranges.push(FrameRateRange::new(min, max));
        self
    }

    /// Still-image pixel count; widened so 16k x 16k sensors cannot overflow.
    pub fn still_pixel_count(&self) -> u64 {
        u64::from(self.still_width) * u64::from(self.still_height)
    }

    pub fn supports_frame_rate(&self, rate: f64) -> bool {
        self.frame_rate_ranges.iter().any(|r| r.contains(rate))
    }

    pub fn max_frame_rate(&self) -> Option<f64> {
        self.frame_rate_ranges
            .iter()
            .map(|r| r.max)
            .fold(None, |acc, m| Some(acc.map_or(m, |a: f64| a.max(m))))
    }
}

impl std::fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "video {}x{} / still {}x{}",
            self.video_width, self.video_height, self.still_width, self.still_height
        )?;
        for range in &self.frame_rate_ranges {
            write!(f, " [{}-{}fps]", range.min, range.max)?;
        }
        Ok(())
    }
}

/// Inclusive bounds on the streamed video height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightRange {
    pub min: u32,
    pub max: u32,
}

impl HeightRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, height: u32) -> bool {
        (self.min..=self.max).contains(&height)
    }
}

/// Caller-supplied constraints for format negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    /// Only formats whose still resolution equals the device maximum qualify
    pub require_max_still_resolution: bool,
    pub video_height_range: HeightRange,
    /// Video width:height must be 4:3
    pub require_aspect_ratio_4_3: bool,
    /// Soft preference; formats whose ranges contain it win over order
    pub preferred_frame_rate: f64,
    /// 0.0 compares the ratio exactly
    #[serde(default)]
    pub aspect_tolerance: f64,
}

impl Default for SelectionCriteria {
    fn default() -> Self {
        Self {
            require_max_still_resolution: true,
            video_height_range: HeightRange::new(480, 1080),
            require_aspect_ratio_4_3: false,
            preferred_frame_rate: 30.0,
            aspect_tolerance: 0.0,
        }
    }
}

impl SelectionCriteria {
    pub fn new(video_height_range: HeightRange, preferred_frame_rate: f64) -> Self {
        Self {
            video_height_range,
            preferred_frame_rate,
            ..Self::default()
        }
    }

    pub fn with_max_still_resolution(mut self, required: bool) -> Self {
        self.require_max_still_resolution = required;
        self
    }

    pub fn with_aspect_ratio_4_3(mut self, required: bool) -> Self {
        self.require_aspect_ratio_4_3 = required;
        self
    }

    pub fn with_aspect_tolerance(mut self, tolerance: f64) -> Self {
        self.aspect_tolerance = tolerance;
        self
    }

    /// Reject criteria that can never produce a meaningful frame duration.
    pub fn validate(&self) -> Result<(), CameraError> {
        if !self.preferred_frame_rate.is_finite() || self.preferred_frame_rate <= 0.0 {
            return Err(CameraError::ConfigurationError(format!(
                "preferred frame rate must be a positive number, got {}",
                self.preferred_frame_rate
            )));
        }
        if self.video_height_range.min > self.video_height_range.max {
            return Err(CameraError::ConfigurationError(format!(
                "video height range is empty: {}..={}",
                self.video_height_range.min, self.video_height_range.max
            )));
        }
        if !self.aspect_tolerance.is_finite() || self.aspect_tolerance < 0.0 {
            return Err(CameraError::ConfigurationError(
                "aspect tolerance must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Frame duration expressed as `value / timescale` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDuration {
    pub value: i64,
    pub timescale: i32,
}

impl FrameDuration {
    pub fn seconds(&self) -> f64 {
        self.value as f64 / f64::from(self.timescale)
    }

    pub fn frames_per_second(&self) -> f64 {
        f64::from(self.timescale) / self.value as f64
    }
}

/// Outcome of a successful selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub format: CaptureFormat,
    /// Position of `format` in the candidate list
    pub index: usize,
    /// Pinned min/max frame duration; `None` keeps the device default
    pub frame_duration: Option<FrameDuration>,
    pub matched_preferred_rate: bool,
}

/// Which way the device faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DevicePosition {
    #[default]
    Back,
    Front,
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TorchMode {
    #[default]
    Off,
    On,
    Auto,
}

/// Normalized point in the sensor's coordinate space, both axes in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub x: f64,
    pub y: f64,
}

impl PointOfInterest {
    pub fn new(x: f64, y: f64) -> Result<Self, CameraError> {
        if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
            return Err(CameraError::ControlError(format!(
                "point of interest ({}, {}) outside unit square",
                x, y
            )));
        }
        Ok(Self { x, y })
    }

    pub fn center() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::NotDetermined => "not_determined",
            AuthorizationStatus::Restricted => "restricted",
            AuthorizationStatus::Denied => "denied",
            AuthorizationStatus::Authorized => "authorized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemPressureLevel {
    Nominal,
    Fair,
    Serious,
    Critical,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptionReason {
    VideoDeviceNotAvailableInBackground,
    AudioDeviceInUseByAnotherClient,
    VideoDeviceInUseByAnotherClient,
    VideoDeviceNotAvailableWithMultipleForegroundApps,
    VideoDeviceNotAvailableDueToSystemPressure,
    Unknown,
}

/// Memory layout of frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Bgra32,
    Rgba32,
    Rgb24,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Bgra32 | PixelFormat::Rgba32 => 4,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// One streamed video frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraFrame {
    pub id: String,
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
}

impl CameraFrame {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32, device_id: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            data: data.into(),
            width,
            height,
            pixel_format: PixelFormat::Bgra32,
            timestamp: Utc::now(),
            device_id,
        }
    }

    pub fn with_pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    /// Bytes a tightly packed frame of this size and layout occupies.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_format.bytes_per_pixel()
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() >= self.expected_len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FlashMode {
    #[default]
    Off,
    On,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoSettings {
    pub flash_mode: FlashMode,
    /// Capture at the active format's full still resolution
    pub high_resolution: bool,
}

impl Default for PhotoSettings {
    fn default() -> Self {
        Self {
            flash_mode: FlashMode::Off,
            high_resolution: true,
        }
    }
}

/// Still image returned by the device, already encoded by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedPhoto {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
    pub timestamp: DateTime<Utc>,
    pub settings: PhotoSettings,
}

impl CapturedPhoto {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32, settings: PhotoSettings) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            width,
            height,
            data: data.into(),
            timestamp: Utc::now(),
            settings,
        }
    }
}

//! Capture format negotiation
//!
//! Picks one format out of a device's catalog. The mandatory filters
//! (maximum still resolution, 4:3 video, video height range) decide which
//! formats are *appropriate*; among those the first one whose frame-rate
//! ranges contain the preferred rate wins, otherwise the first appropriate
//! format is used as a fallback.
//!
//! Selection is pure. Committing the result to hardware is the job of
//! [`crate::session::SessionController`].

use serde::{Deserialize, Serialize};

use crate::assert_invariant;
use crate::errors::SelectionError;
use crate::types::{CaptureFormat, FrameDuration, Selection, SelectionCriteria};

/// Timescale used when pinning the frame duration to the preferred rate.
pub const FRAME_DURATION_TIMESCALE: i32 = 1200;

/// Why a format failed a mandatory filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    /// Still resolution is below the device maximum
    NotMaxStillResolution,
    /// Video frames are not 4:3
    AspectRatioMismatch,
    /// Video height falls outside the requested range
    HeightOutOfRange,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::NotMaxStillResolution => "still resolution below device maximum",
            Rejection::AspectRatioMismatch => "video aspect ratio is not 4:3",
            Rejection::HeightOutOfRange => "video height outside requested range",
        }
    }
}

/// Per-format diagnostic produced by [`explain`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatVerdict {
    pub index: usize,
    pub format: CaptureFormat,
    pub rejection: Option<Rejection>,
    pub supports_preferred_rate: bool,
}

impl FormatVerdict {
    pub fn is_appropriate(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Select the format to activate.
///
/// Candidate order is preserved, so ties always resolve to the earliest
/// format in `formats`.
pub fn select(
    formats: &[CaptureFormat],
    criteria: &SelectionCriteria,
) -> Result<Selection, SelectionError> {
    let max_still = max_still_pixel_count(formats).ok_or(SelectionError::NoFormatsAvailable)?;

    let mut fallback: Option<usize> = None;
    let mut desired: Option<usize> = None;

    for (index, format) in formats.iter().enumerate() {
        if let Err(rejection) = check_mandatory(format, criteria, max_still) {
            log::trace!("Rejecting format #{} ({}): {}", index, format, rejection.as_str());
            continue;
        }

        if fallback.is_none() {
            fallback = Some(index);
        }

        if matches_preferred_rate(format, criteria.preferred_frame_rate) {
            desired = Some(index);
            break;
        }
    }

    let selection = match (desired, fallback) {
        (Some(index), _) => Selection {
            format: formats[index].clone(),
            index,
            frame_duration: Some(frame_duration_for(criteria.preferred_frame_rate)),
            matched_preferred_rate: true,
        },
        (None, Some(index)) => Selection {
            format: formats[index].clone(),
            index,
            frame_duration: None,
            matched_preferred_rate: false,
        },
        (None, None) => {
            log::debug!(
                "No appropriate format among {} candidates for {:?}",
                formats.len(),
                criteria
            );
            return Err(SelectionError::NoAppropriateFormat);
        }
    };

    verify_selection(formats, criteria, max_still, &selection);

    log::debug!(
        "Selected format #{} ({}), preferred rate {}: {}",
        selection.index,
        selection.format,
        criteria.preferred_frame_rate,
        if selection.matched_preferred_rate {
            "matched"
        } else {
            "fallback"
        }
    );

    Ok(selection)
}

/// Report, for every candidate, which mandatory filter rejected it.
pub fn explain(formats: &[CaptureFormat], criteria: &SelectionCriteria) -> Vec<FormatVerdict> {
    let Some(max_still) = max_still_pixel_count(formats) else {
        return Vec::new();
    };

    formats
        .iter()
        .enumerate()
        .map(|(index, format)| FormatVerdict {
            index,
            format: format.clone(),
            rejection: check_mandatory(format, criteria, max_still).err(),
            supports_preferred_rate: matches_preferred_rate(format, criteria.preferred_frame_rate),
        })
        .collect()
}

/// Frame duration that pins the device to `frame_rate`.
///
/// Rates above the timescale would round to zero; the value is clamped to one
/// tick instead.
pub fn frame_duration_for(frame_rate: f64) -> FrameDuration {
    let value = (f64::from(FRAME_DURATION_TIMESCALE) / frame_rate).round() as i64;
    FrameDuration {
        value: value.max(1),
        timescale: FRAME_DURATION_TIMESCALE,
    }
}

/// Exact 4:3 test on integer dimensions, or a tolerance band when one is given.
pub fn is_four_by_three(width: u32, height: u32, tolerance: f64) -> bool {
    if width == 0 {
        return false;
    }
    if tolerance > 0.0 {
        let ratio = f64::from(height) / f64::from(width);
        return (ratio - 0.75).abs() <= tolerance;
    }
    u64::from(height) * 4 == u64::from(width) * 3
}

fn max_still_pixel_count(formats: &[CaptureFormat]) -> Option<u64> {
    formats.iter().map(CaptureFormat::still_pixel_count).max()
}

fn check_mandatory(
    format: &CaptureFormat,
    criteria: &SelectionCriteria,
    max_still: u64,
) -> Result<(), Rejection> {
    if criteria.require_max_still_resolution && format.still_pixel_count() != max_still {
        return Err(Rejection::NotMaxStillResolution);
    }
    if criteria.require_aspect_ratio_4_3
        && !is_four_by_three(
            format.video_width,
            format.video_height,
            criteria.aspect_tolerance,
        )
    {
        return Err(Rejection::AspectRatioMismatch);
    }
    if !criteria.video_height_range.contains(format.video_height) {
        return Err(Rejection::HeightOutOfRange);
    }
    Ok(())
}

fn matches_preferred_rate(format: &CaptureFormat, rate: f64) -> bool {
    rate.is_finite() && rate > 0.0 && format.supports_frame_rate(rate)
}

fn verify_selection(
    formats: &[CaptureFormat],
    criteria: &SelectionCriteria,
    max_still: u64,
    selection: &Selection,
) {
    const CTX: &str = "format_selector::select";

    assert_invariant!(
        formats.get(selection.index) == Some(&selection.format),
        "selected format is drawn from the candidates",
        CTX
    );
    assert_invariant!(
        !criteria.require_max_still_resolution
            || selection.format.still_pixel_count() == max_still,
        "selected format has the maximum still resolution when required",
        CTX
    );
    assert_invariant!(
        !criteria.require_aspect_ratio_4_3
            || is_four_by_three(
                selection.format.video_width,
                selection.format.video_height,
                criteria.aspect_tolerance
            ),
        "selected format is 4:3 when required",
        CTX
    );
    assert_invariant!(
        criteria
            .video_height_range
            .contains(selection.format.video_height),
        "selected video height lies within the requested range",
        CTX
    );
    assert_invariant!(
        selection.matched_preferred_rate == selection.frame_duration.is_some(),
        "frame duration is pinned only for preferred-rate matches",
        CTX
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HeightRange;

    fn vga() -> CaptureFormat {
        CaptureFormat::new((3264, 2448), (640, 480)).with_frame_rate_range(24.0, 30.0)
    }

    fn hd() -> CaptureFormat {
        CaptureFormat::new((3264, 2448), (1280, 720)).with_frame_rate_range(24.0, 60.0)
    }

    fn criteria(rate: f64) -> SelectionCriteria {
        SelectionCriteria::new(HeightRange::new(480, 1080), rate)
    }

    #[test]
    fn test_empty_catalog() {
        assert_eq!(
            select(&[], &criteria(30.0)),
            Err(SelectionError::NoFormatsAvailable)
        );
        assert!(explain(&[], &criteria(30.0)).is_empty());
    }

    #[test]
    fn test_preferred_rate_beats_order() {
        let selection = select(&[vga(), hd()], &criteria(60.0)).unwrap();
        assert_eq!(selection.index, 1);
        assert_eq!(
            selection.frame_duration,
            Some(FrameDuration {
                value: 20,
                timescale: 1200
            })
        );
    }

    #[test]
    fn test_fallback_is_first_appropriate() {
        let selection = select(&[vga(), hd()], &criteria(15.0)).unwrap();
        assert_eq!(selection.index, 0);
        assert!(selection.frame_duration.is_none());
        assert!(!selection.matched_preferred_rate);
    }

    #[test]
    fn test_first_rate_match_wins() {
        let selection = select(&[vga(), hd()], &criteria(30.0)).unwrap();
        assert_eq!(selection.index, 0);
        assert!(selection.matched_preferred_rate);
    }

    #[test]
    fn test_max_still_filter_uses_still_dimensions() {
        let small_still =
            CaptureFormat::new((1920, 1080), (1280, 720)).with_frame_rate_range(1.0, 60.0);
        let selection = select(&[small_still, vga()], &criteria(60.0)).unwrap();
        // Only the full-resolution format qualifies, and it cannot do 60fps
        assert_eq!(selection.index, 1);
        assert!(!selection.matched_preferred_rate);
    }

    #[test]
    fn test_aspect_ratio_exact() {
        assert!(is_four_by_three(640, 480, 0.0));
        assert!(is_four_by_three(4032, 3024, 0.0));
        assert!(!is_four_by_three(1280, 720, 0.0));
        assert!(!is_four_by_three(641, 480, 0.0));
        assert!(!is_four_by_three(0, 0, 0.0));
    }

    #[test]
    fn test_aspect_ratio_tolerance() {
        assert!(is_four_by_three(641, 480, 0.01));
        assert!(!is_four_by_three(1280, 720, 0.01));
    }

    #[test]
    fn test_frame_duration_rounding() {
        assert_eq!(frame_duration_for(30.0).value, 40);
        assert_eq!(frame_duration_for(29.97).value, 40);
        assert_eq!(frame_duration_for(24.0).value, 50);
        assert_eq!(frame_duration_for(240.0).value, 5);
        assert_eq!(frame_duration_for(5000.0).value, 1);
    }

    #[test]
    fn test_non_positive_rate_never_matches() {
        let zero_floor =
            CaptureFormat::new((3264, 2448), (640, 480)).with_frame_rate_range(0.0, 30.0);
        let selection = select(&[zero_floor], &criteria(0.0)).unwrap();
        assert!(!selection.matched_preferred_rate);
        assert!(selection.frame_duration.is_none());
    }

    #[test]
    fn test_explain_reports_each_filter() {
        let formats = vec![
            CaptureFormat::new((1920, 1080), (1920, 1080)),
            CaptureFormat::new((3264, 2448), (1280, 720)),
            CaptureFormat::new((3264, 2448), (320, 240)),
            vga(),
        ];
        let verdicts = explain(&formats, &criteria(30.0).with_aspect_ratio_4_3(true));
        assert_eq!(
            verdicts.iter().map(|v| v.rejection).collect::<Vec<_>>(),
            vec![
                Some(Rejection::NotMaxStillResolution),
                Some(Rejection::AspectRatioMismatch),
                Some(Rejection::HeightOutOfRange),
                None,
            ]
        );
        assert!(verdicts[3].supports_preferred_rate);
    }
}

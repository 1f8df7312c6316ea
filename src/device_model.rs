//! Hardware model identifiers
//!
//! Parses identifiers such as `iPhone10,3` into a kind plus major/minor
//! revision. The session controller uses this to apply per-model zoom
//! overrides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CameraError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    IPhone,
    IPad,
    IPod,
    Watch,
    AppleTv,
    Simulator,
}

impl DeviceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DeviceKind::IPhone => "iPhone",
            DeviceKind::IPad => "iPad",
            DeviceKind::IPod => "iPod",
            DeviceKind::Watch => "Watch",
            DeviceKind::AppleTv => "AppleTV",
            DeviceKind::Simulator => "",
        }
    }
}

const PREFIXES: [DeviceKind; 5] = [
    DeviceKind::IPhone,
    DeviceKind::IPad,
    DeviceKind::IPod,
    DeviceKind::Watch,
    DeviceKind::AppleTv,
];

const SIMULATOR_IDS: [&str; 3] = ["x86_64", "arm64", "i386"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceModel {
    pub kind: DeviceKind,
    pub major: u32,
    pub minor: u32,
    /// Simulator architecture, empty for real hardware
    pub arch: String,
}

impl DeviceModel {
    pub fn new(kind: DeviceKind, major: u32, minor: u32) -> Self {
        Self {
            kind,
            major,
            minor,
            arch: String::new(),
        }
    }

    pub fn parse(identifier: &str) -> Result<Self, CameraError> {
        let identifier = identifier.trim();
        if SIMULATOR_IDS.contains(&identifier) {
            return Ok(Self {
                kind: DeviceKind::Simulator,
                major: 0,
                minor: 0,
                arch: identifier.to_string(),
            });
        }

        let invalid = || {
            CameraError::ConfigurationError(format!(
                "unrecognized device model: {:?}",
                identifier
            ))
        };

        let kind = PREFIXES
            .iter()
            .copied()
            .find(|k| identifier.starts_with(k.prefix()))
            .ok_or_else(invalid)?;
        let numbers = &identifier[kind.prefix().len()..];
        let (major, minor) = numbers.split_once(',').ok_or_else(invalid)?;

        Ok(Self::new(
            kind,
            parse_revision(major).ok_or_else(invalid)?,
            parse_revision(minor).ok_or_else(invalid)?,
        ))
    }

    pub fn is_simulator(&self) -> bool {
        self.kind == DeviceKind::Simulator
    }
}

fn parse_revision(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for DeviceModel {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_simulator() {
            write!(f, "{}", self.arch)
        } else {
            write!(f, "{}{},{}", self.kind.prefix(), self.major, self.minor)
        }
    }
}

/// Zoom factor to apply right after configuration on a given model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomOverride {
    pub model: String,
    pub factor: f64,
}

/// First override whose model parses to the same descriptor as `model`.
pub fn zoom_override_for(model: &DeviceModel, overrides: &[ZoomOverride]) -> Option<f64> {
    overrides
        .iter()
        .find(|o| DeviceModel::parse(&o.model).is_ok_and(|m| &m == model))
        .map(|o| o.factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_phone() {
        let model = DeviceModel::parse("iPhone10,3").unwrap();
        assert_eq!(model.kind, DeviceKind::IPhone);
        assert_eq!((model.major, model.minor), (10, 3));
        assert_eq!(model.to_string(), "iPhone10,3");
    }

    #[test]
    fn test_parse_other_kinds() {
        assert_eq!(DeviceModel::parse("iPad8,12").unwrap().kind, DeviceKind::IPad);
        assert_eq!(DeviceModel::parse("iPod9,1").unwrap().kind, DeviceKind::IPod);
        assert_eq!(DeviceModel::parse("Watch6,2").unwrap().kind, DeviceKind::Watch);
        assert_eq!(
            "AppleTV11,1".parse::<DeviceModel>().unwrap().kind,
            DeviceKind::AppleTv
        );
    }

    #[test]
    fn test_parse_simulator() {
        let model = DeviceModel::parse("arm64").unwrap();
        assert!(model.is_simulator());
        assert_eq!(model.to_string(), "arm64");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in [
            "",
            "iPhone",
            "iPhone10",
            "iPhone10,",
            "iPhone,3",
            "iPhoneX,3",
            "Pixel7,1",
            "iPhone+1,2",
        ] {
            assert!(DeviceModel::parse(bad).is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_zoom_override_lookup() {
        let overrides = vec![
            ZoomOverride {
                model: "not a model".to_string(),
                factor: 9.0,
            },
            ZoomOverride {
                model: "iPhone13,4".to_string(),
                factor: 1.5,
            },
        ];
        let model = DeviceModel::new(DeviceKind::IPhone, 13, 4);
        assert_eq!(zoom_override_for(&model, &overrides), Some(1.5));

        let other = DeviceModel::new(DeviceKind::IPhone, 13, 3);
        assert_eq!(zoom_override_for(&other, &overrides), None);
    }
}

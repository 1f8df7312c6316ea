#[cfg(test)]
mod error_tests {
    use crabcapture::errors::{ActivationError, CameraError, SelectionError};
    use std::error::Error;

    #[test]
    fn test_selection_errors_are_distinguishable() {
        assert_ne!(
            SelectionError::NoFormatsAvailable,
            SelectionError::NoAppropriateFormat
        );
        assert_eq!(
            SelectionError::NoFormatsAvailable.to_string(),
            "device reports no capture formats"
        );
    }

    #[test]
    fn test_selection_error_converts_and_keeps_source() {
        let error: CameraError = SelectionError::NoAppropriateFormat.into();
        assert!(error.is_selection_failure());
        assert!(!error.is_activation_failure());
        assert!(error.to_string().starts_with("Format selection error"));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_activation_error_converts_and_keeps_source() {
        let error: CameraError = ActivationError::Rejected("busy".to_string()).into();
        assert!(error.is_activation_failure());
        assert_eq!(
            error.to_string(),
            "Format activation failed: device rejected configuration: busy"
        );
        assert!(error.source().is_some());
    }

    #[test]
    fn test_camera_error_display_trait() {
        let error = CameraError::CaptureError("Display test".to_string());
        assert_eq!(format!("{}", error), "Capture error: Display test");
        assert!(error.source().is_none());
    }

    #[test]
    fn test_all_error_variants_have_messages() {
        let errors = vec![
            CameraError::Selection(SelectionError::NoFormatsAvailable),
            CameraError::ActivationFailed(ActivationError::LockFailed("lock".to_string())),
            CameraError::ConfigurationError("config".to_string()),
            CameraError::PermissionDenied("denied".to_string()),
            CameraError::SessionError("session".to_string()),
            CameraError::CaptureError("capture".to_string()),
            CameraError::ControlError("control".to_string()),
            CameraError::ConversionError("conversion".to_string()),
            CameraError::WorkerUnavailable,
            CameraError::Timeout("timeout".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
            let _as_trait: &dyn Error = &error;
        }
    }
}

//! Session controller tests against the scripted capture device

use crabcapture::config::CrabCaptureConfig;
use crabcapture::delegate::CameraEvent;
use crabcapture::device_model::ZoomOverride;
use crabcapture::session::{FrameSink, SessionController, SessionState};
use crabcapture::testing::{
    rear_camera_catalog, synthetic_video_frame, widescreen_only_catalog, MockCaptureDevice,
};
use crabcapture::types::{
    AuthorizationStatus, HeightRange, InterruptionReason, PhotoSettings, PointOfInterest,
    SelectionCriteria, SystemPressureLevel, TorchMode,
};
use crabcapture::{CameraError, SelectionError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn rear_device() -> MockCaptureDevice {
    MockCaptureDevice::new("back").with_formats(rear_camera_catalog())
}

fn sixty_fps() -> SelectionCriteria {
    SelectionCriteria::new(HeightRange::new(480, 1080), 60.0).with_max_still_resolution(false)
}

fn collect_events(session: &SessionController) -> Arc<Mutex<Vec<String>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    session.subscribe(move |event: &CameraEvent| {
        sink.lock().unwrap().push(event.name().to_string());
    });
    events
}

#[cfg(test)]
mod configuration_tests {
    use super::*;

    #[test]
    fn test_configure_activates_selected_format() {
        let device = rear_device();
        let record = device.record();
        let session = SessionController::new(device, &CrabCaptureConfig::default()).unwrap();

        let selection = session.configure_blocking(sixty_fps()).unwrap();
        assert_eq!(session.active_selection(), Some(selection.clone()));
        assert_eq!(session.state(), SessionState::Configured);

        let record = record.lock().unwrap();
        assert_eq!(record.activations.len(), 1);
        assert_eq!(record.activations[0].0, selection.format);
        assert_eq!(record.activations[0].1, selection.frame_duration);
        assert_eq!(record.locks, 1);
        assert_eq!(record.unlocks, 1);
        assert!(!record.locked);
    }

    #[test]
    fn test_selection_failure_is_distinct_from_activation_failure() {
        let session = SessionController::new(
            MockCaptureDevice::new("wide").with_formats(widescreen_only_catalog()),
            &CrabCaptureConfig::default(),
        )
        .unwrap();
        let err = session
            .configure_blocking(sixty_fps().with_aspect_ratio_4_3(true))
            .unwrap_err();
        assert!(err.is_selection_failure());
        assert!(matches!(
            err,
            CameraError::Selection(SelectionError::NoAppropriateFormat)
        ));

        let failing = SessionController::new(
            rear_device().fail_activation("format locked by another client"),
            &CrabCaptureConfig::default(),
        )
        .unwrap();
        let err = failing.configure_blocking(sixty_fps()).unwrap_err();
        assert!(err.is_activation_failure());
        assert!(!err.is_selection_failure());
        assert_eq!(failing.state(), SessionState::Idle);
        assert!(failing.active_selection().is_none());
    }

    #[test]
    fn test_device_without_formats() {
        let session =
            SessionController::new(MockCaptureDevice::new("empty"), &CrabCaptureConfig::default())
                .unwrap();
        assert!(matches!(
            session.configure_default().wait(),
            Err(CameraError::Selection(SelectionError::NoFormatsAvailable))
        ));
    }

    #[test]
    fn test_lock_failure_reports_activation_error() {
        let device = rear_device().fail_lock();
        let record = device.record();
        let session = SessionController::new(device, &CrabCaptureConfig::default()).unwrap();

        let err = session.configure_default().wait().unwrap_err();
        assert!(err.is_activation_failure());
        assert!(record.lock().unwrap().activations.is_empty());
    }

    #[test]
    fn test_invalid_criteria_rejected_before_touching_device() {
        let device = rear_device();
        let record = device.record();
        let session = SessionController::new(device, &CrabCaptureConfig::default()).unwrap();

        let mut criteria = sixty_fps();
        criteria.preferred_frame_rate = 0.0;
        assert!(matches!(
            session.configure(criteria).wait(),
            Err(CameraError::ConfigurationError(_))
        ));
        assert_eq!(record.lock().unwrap().locks, 0);
    }

    #[test]
    fn test_zoom_override_for_matching_model() {
        let mut config = CrabCaptureConfig::default();
        config.session.zoom_overrides.push(ZoomOverride {
            model: "iPhone13,4".to_string(),
            factor: 8.0,
        });

        let device = rear_device().with_model("iPhone13,4").with_max_zoom(4.0);
        let record = device.record();
        let session = SessionController::new(device, &config).unwrap();
        session.configure_default().wait().unwrap();

        // Clamped to the device maximum
        assert_eq!(record.lock().unwrap().zoom_factors, vec![4.0]);

        let other = rear_device().with_model("iPhone13,3");
        let other_record = other.record();
        let session = SessionController::new(other, &config).unwrap();
        session.configure_default().wait().unwrap();
        assert!(other_record.lock().unwrap().zoom_factors.is_empty());
    }

    #[test]
    fn test_zoom_override_failure_keeps_activated_format() {
        let mut config = CrabCaptureConfig::default();
        config.session.zoom_overrides.push(ZoomOverride {
            model: "iPhone13,4".to_string(),
            factor: 2.0,
        });

        let device = rear_device()
            .with_model("iPhone13,4")
            .with_max_zoom(4.0)
            .fail_zoom("zoom ramp busy");
        let record = device.record();
        let session = SessionController::new(device, &config).unwrap();

        let selection = session.configure_default().wait().unwrap();
        assert_eq!(session.state(), SessionState::Configured);
        assert_eq!(session.active_selection(), Some(selection.clone()));

        let record = record.lock().unwrap();
        assert_eq!(record.activations.len(), 1);
        assert_eq!(record.active_format, Some(selection.format));
        assert!(record.zoom_factors.is_empty());
        assert!(!record.locked);
    }

    #[tokio::test]
    async fn test_configure_can_be_awaited() {
        let session = SessionController::new(rear_device(), &CrabCaptureConfig::default()).unwrap();
        let selection = session.configure(sixty_fps()).await.unwrap();
        assert!(selection.matched_preferred_rate);
        assert_eq!(selection.frame_duration.map(|d| d.value), Some(20));
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_start_requires_authorization() {
        let session = SessionController::new(
            rear_device().with_authorization(AuthorizationStatus::Denied),
            &CrabCaptureConfig::default(),
        )
        .unwrap();
        session.configure_default().wait().unwrap();
        assert!(matches!(
            session.start().wait(),
            Err(CameraError::PermissionDenied(_))
        ));
        assert_eq!(session.state(), SessionState::Configured);
    }

    #[test]
    fn test_lifecycle_events_are_published() {
        let session = SessionController::new(rear_device(), &CrabCaptureConfig::default()).unwrap();
        let events = collect_events(&session);

        session.configure_default().wait().unwrap();
        session.start().wait().unwrap();
        session.stop().wait().unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["session_started".to_string(), "session_stopped".to_string()]
        );
    }

    #[test]
    fn test_completions_work_on_any_executor() {
        let session = SessionController::new(rear_device(), &CrabCaptureConfig::default()).unwrap();
        futures::executor::block_on(async {
            session.configure_default().await.unwrap();
            session.start().await.unwrap();
        });
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn test_shutdown_stops_running_session() {
        let device = rear_device();
        let record = device.record();
        let session = SessionController::new(device, &CrabCaptureConfig::default()).unwrap();
        session.configure_default().wait().unwrap();
        session.start().wait().unwrap();

        session.shutdown().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!record.lock().unwrap().running);
        assert!(matches!(
            session.start().wait(),
            Err(CameraError::WorkerUnavailable)
        ));
    }

    #[test]
    fn test_stop_lets_draining_output_deliver_frames() {
        let sink_slot: Arc<Mutex<Option<FrameSink>>> = Arc::new(Mutex::new(None));
        let delivered = Arc::new(AtomicBool::new(false));

        let slot = sink_slot.clone();
        let flag = delivered.clone();
        let device = rear_device().on_stop(move || {
            let sink = slot.lock().unwrap().clone();
            let flag = flag.clone();
            // The output queue hands over its last frame from its own thread
            std::thread::spawn(move || {
                if let Some(sink) = sink {
                    flag.store(sink.deliver(synthetic_video_frame(9, 16, 12)), Ordering::SeqCst);
                }
            })
            .join()
            .unwrap();
        });

        let session = SessionController::new(device, &CrabCaptureConfig::default()).unwrap();
        *sink_slot.lock().unwrap() = Some(session.frame_sink());
        session.configure_default().wait().unwrap();
        session.start().wait().unwrap();

        session.stop().wait_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(delivered.load(Ordering::SeqCst));
        assert_eq!(session.status().frames_delivered, 1);
        session.shutdown().unwrap();
    }

    #[test]
    fn test_frames_only_flow_while_running() {
        let session = SessionController::new(rear_device(), &CrabCaptureConfig::default()).unwrap();
        let events = collect_events(&session);
        let frames = session.frame_sink();

        assert!(!frames.deliver(synthetic_video_frame(0, 16, 12)));

        session.configure_default().wait().unwrap();
        session.start().wait().unwrap();
        assert!(frames.deliver(synthetic_video_frame(1, 16, 12)));

        session
            .status_sink()
            .session_interrupted(InterruptionReason::VideoDeviceInUseByAnotherClient);
        assert!(!frames.deliver(synthetic_video_frame(2, 16, 12)));
        session.status_sink().interruption_ended();
        assert!(frames.deliver(synthetic_video_frame(3, 16, 12)));

        let status = session.status();
        assert_eq!(status.frames_delivered, 2);
        assert_eq!(status.frames_dropped, 2);
        assert_eq!(
            events
                .lock()
                .unwrap()
                .iter()
                .filter(|name| name.as_str() == "frame_output")
                .count(),
            2
        );
    }
}

#[cfg(test)]
mod control_tests {
    use super::*;

    #[test]
    fn test_torch_requires_hardware() {
        let session = SessionController::new(rear_device(), &CrabCaptureConfig::default()).unwrap();
        assert!(matches!(
            session.set_torch_mode(TorchMode::On).wait(),
            Err(CameraError::ControlError(_))
        ));

        let device = rear_device().with_torch();
        let record = device.record();
        let session = SessionController::new(device, &CrabCaptureConfig::default()).unwrap();
        assert!(session.status().torch_available);
        session.set_torch_mode(TorchMode::On).wait().unwrap();
        session.set_torch_mode(TorchMode::Off).wait().unwrap();
        assert_eq!(
            record.lock().unwrap().torch_modes,
            vec![TorchMode::On, TorchMode::Off]
        );
    }

    #[test]
    fn test_focus_and_exposure_hold_configuration_lock() {
        let device = rear_device();
        let record = device.record();
        let session = SessionController::new(device, &CrabCaptureConfig::default()).unwrap();

        let point = PointOfInterest::new(0.25, 0.75).unwrap();
        session.focus_at(point).wait().unwrap();
        session.expose_at(point).wait().unwrap();

        let record = record.lock().unwrap();
        assert_eq!(record.focus_points, vec![point]);
        assert_eq!(record.exposure_points, vec![point]);
        assert_eq!(record.locks, 2);
        assert_eq!(record.unlocks, 2);
    }

    #[test]
    fn test_photo_capture_requires_running_session() {
        let session = SessionController::new(rear_device(), &CrabCaptureConfig::default()).unwrap();
        session.configure_default().wait().unwrap();
        assert!(matches!(
            session.capture_photo(None).wait(),
            Err(CameraError::CaptureError(_))
        ));

        let events = collect_events(&session);
        session.start().wait().unwrap();
        let photo = session.capture_photo(None).wait().unwrap();
        let active = session.active_selection().unwrap().format;
        assert_eq!((photo.width, photo.height), (active.still_width, active.still_height));

        let preview = session
            .capture_photo(Some(PhotoSettings {
                high_resolution: false,
                ..PhotoSettings::default()
            }))
            .wait()
            .unwrap();
        assert_eq!(preview.width, active.video_width);

        assert_eq!(
            events
                .lock()
                .unwrap()
                .iter()
                .filter(|name| name.as_str() == "photo_captured")
                .count(),
            2
        );
    }

    #[test]
    fn test_photo_failure_is_published() {
        let session =
            SessionController::new(rear_device().fail_photo(), &CrabCaptureConfig::default())
                .unwrap();
        let events = collect_events(&session);
        session.configure_default().wait().unwrap();
        session.start().wait().unwrap();

        assert!(session.capture_photo(None).wait().is_err());
        assert!(events
            .lock()
            .unwrap()
            .contains(&"photo_failed".to_string()));
    }

    #[test]
    fn test_status_sink_updates_snapshot() {
        let session = SessionController::new(rear_device(), &CrabCaptureConfig::default()).unwrap();
        let events = collect_events(&session);
        let status = session.status_sink();

        status.torch_availability_changed(true);
        status.system_pressure_changed(SystemPressureLevel::Serious);
        status.adjusting_focus_changed(true);
        status.adjusting_exposure_changed(true);
        status.runtime_error("media services were reset");

        let snapshot = session.status();
        assert!(snapshot.torch_available);
        assert_eq!(snapshot.system_pressure, Some(SystemPressureLevel::Serious));
        assert!(snapshot.adjusting_focus);
        assert!(snapshot.adjusting_exposure);
        assert_eq!(events.lock().unwrap().len(), 5);
    }
}

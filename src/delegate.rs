//! Frame, photo and hardware-status fan-out
//!
//! Host adapters publish [`CameraEvent`]s; subscribers register a
//! [`CameraDelegate`] (any `Fn(&CameraEvent)` closure works) or take an
//! async channel, and unregister on teardown.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::{
    CameraFrame, CapturedPhoto, InterruptionReason, SystemPressureLevel,
};

#[derive(Debug, Clone, Serialize)]
pub enum CameraEvent {
    FrameOutput(CameraFrame),
    PhotoCaptured(CapturedPhoto),
    PhotoFailed(String),
    TorchAvailabilityChanged(bool),
    SystemPressureChanged(SystemPressureLevel),
    AdjustingFocusChanged(bool),
    AdjustingExposureChanged(bool),
    SessionInterrupted(InterruptionReason),
    InterruptionEnded,
    RuntimeError(String),
    SessionStarted,
    SessionStopped,
}

impl CameraEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CameraEvent::FrameOutput(_) => "frame_output",
            CameraEvent::PhotoCaptured(_) => "photo_captured",
            CameraEvent::PhotoFailed(_) => "photo_failed",
            CameraEvent::TorchAvailabilityChanged(_) => "torch_availability_changed",
            CameraEvent::SystemPressureChanged(_) => "system_pressure_changed",
            CameraEvent::AdjustingFocusChanged(_) => "adjusting_focus_changed",
            CameraEvent::AdjustingExposureChanged(_) => "adjusting_exposure_changed",
            CameraEvent::SessionInterrupted(_) => "session_interrupted",
            CameraEvent::InterruptionEnded => "interruption_ended",
            CameraEvent::RuntimeError(_) => "runtime_error",
            CameraEvent::SessionStarted => "session_started",
            CameraEvent::SessionStopped => "session_stopped",
        }
    }
}

/// Receives camera events. Called on the publishing thread.
pub trait CameraDelegate: Send + Sync {
    fn handle_event(&self, event: &CameraEvent);
}

impl<F> CameraDelegate for F
where
    F: Fn(&CameraEvent) + Send + Sync,
{
    fn handle_event(&self, event: &CameraEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Default)]
pub struct DelegateBridge {
    delegates: Arc<RwLock<HashMap<SubscriptionId, Arc<dyn CameraDelegate>>>>,
}

impl DelegateBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<D>(&self, delegate: D) -> SubscriptionId
    where
        D: CameraDelegate + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.write().insert(id, Arc::new(delegate));
        log::debug!("Registered camera delegate {}", id);
        id
    }

    /// Returns false if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.write().remove(&id).is_some();
        if removed {
            log::debug!("Unregistered camera delegate {}", id);
        }
        removed
    }

    /// Deliver events through an unbounded channel.
    ///
    /// The subscription removes itself the first time it publishes into a
    /// closed receiver.
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<CameraEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Arc::downgrade(&self.delegates);
        let id = SubscriptionId(Uuid::new_v4());

        let forward = move |event: &CameraEvent| {
            if tx.send(event.clone()).is_err() {
                if let Some(delegates) = bridge.upgrade() {
                    if let Ok(mut map) = delegates.write() {
                        map.remove(&id);
                    }
                }
            }
        };

        self.write().insert(id, Arc::new(forward));
        (id, rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().len()
    }

    pub fn publish(&self, event: CameraEvent) {
        // Snapshot so a delegate may (un)subscribe from inside its callback
        let delegates: Vec<Arc<dyn CameraDelegate>> = self.read().values().cloned().collect();
        log::trace!("Publishing {} to {} delegates", event.name(), delegates.len());
        for delegate in delegates {
            delegate.handle_event(&event);
        }
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<SubscriptionId, Arc<dyn CameraDelegate>>> {
        self.delegates
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<SubscriptionId, Arc<dyn CameraDelegate>>> {
        self.delegates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

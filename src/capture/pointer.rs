//! Pointer fallback source
//!
//! Used when no camera is present. The host forwards pointer events through a
//! [`PointerHandle`]; each cycle the source reports at most one detection for
//! the pointer, labelled active while the button is held. A press is latched
//! until the next cycle reads it, so a tap shorter than one frame still shows
//! up as active once. The pointer is always one identity however fast it
//! moves.

use crate::capture::source::{Detection, DetectionError, DetectionSource, SourceKind, SourceResult};
use crate::processing::tracker::Association;
use async_trait::async_trait;
use parking_lot::Mutex as ParkingMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fixed size reported for the pointer entity
pub const POINTER_SIZE: f64 = 1.0;

#[derive(Debug, Default, Clone, Copy)]
struct PointerState {
    position: Option<(f64, f64)>,
    pressed: bool,
    /// Press not yet seen by `detect`
    press_latched: bool,
}

/// Host-facing handle for feeding pointer events into the source
#[derive(Clone)]
pub struct PointerHandle {
    listening: Arc<AtomicBool>,
    state: Arc<ParkingMutex<PointerState>>,
}

impl PointerHandle {
    /// Pointer moved to client coordinates within a viewport of the given size
    pub fn move_to(&self, client_x: f64, client_y: f64, viewport_width: f64, viewport_height: f64) {
        if !self.listening.load(Ordering::SeqCst) {
            return;
        }
        let x = normalize(client_x, viewport_width);
        let y = normalize(client_y, viewport_height);
        self.state.lock().position = Some((x, y));
    }

    /// Button pressed at client coordinates
    pub fn press(&self, client_x: f64, client_y: f64, viewport_width: f64, viewport_height: f64) {
        if !self.listening.load(Ordering::SeqCst) {
            return;
        }
        let mut state = self.state.lock();
        state.position = Some((
            normalize(client_x, viewport_width),
            normalize(client_y, viewport_height),
        ));
        state.pressed = true;
        state.press_latched = true;
    }

    pub fn release(&self) {
        if !self.listening.load(Ordering::SeqCst) {
            return;
        }
        self.state.lock().pressed = false;
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

fn normalize(coordinate: f64, extent: f64) -> f64 {
    if !extent.is_finite() || extent <= 0.0 || !coordinate.is_finite() {
        return 0.0;
    }
    (coordinate / extent).clamp(0.0, 1.0)
}

pub struct PointerSource {
    active_label: String,
    idle_label: String,
    listening: Arc<AtomicBool>,
    state: Arc<ParkingMutex<PointerState>>,
}

impl PointerSource {
    pub fn new(active_label: impl Into<String>, idle_label: impl Into<String>) -> Self {
        Self {
            active_label: active_label.into(),
            idle_label: idle_label.into(),
            listening: Arc::new(AtomicBool::new(false)),
            state: Arc::new(ParkingMutex::new(PointerState::default())),
        }
    }

    pub fn handle(&self) -> PointerHandle {
        PointerHandle {
            listening: self.listening.clone(),
            state: self.state.clone(),
        }
    }
}

#[async_trait]
impl DetectionSource for PointerSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Pointer
    }

    async fn start(&mut self) -> SourceResult<()> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Pointer controls enabled");
        Ok(())
    }

    async fn stop(&mut self) -> SourceResult<()> {
        if !self.listening.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        // A release that arrives while detached must not leave the button stuck
        {
            let mut state = self.state.lock();
            state.pressed = false;
            state.press_latched = false;
        }
        tracing::info!("Pointer controls disabled");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    fn association(&self) -> Association {
        Association::Single
    }

    fn detect(&mut self, _timestamp_ms: f64) -> Result<Vec<Detection>, DetectionError> {
        if !self.is_active() {
            return Err(DetectionError::Inactive);
        }

        let state = {
            let mut shared = self.state.lock();
            let state = *shared;
            shared.press_latched = false;
            state
        };
        let Some((x, y)) = state.position else {
            return Ok(vec![]);
        };
        let label = if state.pressed || state.press_latched {
            &self.active_label
        } else {
            &self.idle_label
        };

        Ok(vec![Detection::new(x, y, label.as_str(), POINTER_SIZE)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> PointerSource {
        PointerSource::new("Pointing_Up", "Open_Palm")
    }

    #[tokio::test]
    async fn test_no_detection_before_first_event() {
        let mut pointer = source();
        pointer.start().await.unwrap();
        assert!(pointer.detect(0.0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_is_normalized_and_idle() {
        let mut pointer = source();
        let handle = pointer.handle();
        pointer.start().await.unwrap();

        handle.move_to(320.0, 90.0, 640.0, 360.0);
        let detections = pointer.detect(0.0).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].position(), (0.5, 0.25));
        assert_eq!(detections[0].label, "Open_Palm");
        assert_eq!(detections[0].size, POINTER_SIZE);
    }

    #[tokio::test]
    async fn test_press_reports_active_until_release() {
        let mut pointer = source();
        let handle = pointer.handle();
        pointer.start().await.unwrap();

        handle.press(100.0, 100.0, 200.0, 200.0);
        assert_eq!(pointer.detect(0.0).unwrap()[0].label, "Pointing_Up");

        handle.release();
        assert_eq!(pointer.detect(1.0).unwrap()[0].label, "Open_Palm");
    }

    #[tokio::test]
    async fn test_tap_between_frames_reports_active_once() {
        let mut pointer = source();
        let handle = pointer.handle();
        pointer.start().await.unwrap();

        handle.move_to(100.0, 100.0, 200.0, 200.0);
        assert_eq!(pointer.detect(0.0).unwrap()[0].label, "Open_Palm");

        handle.press(100.0, 100.0, 200.0, 200.0);
        handle.release();
        assert_eq!(pointer.detect(33.0).unwrap()[0].label, "Pointing_Up");
        assert_eq!(pointer.detect(66.0).unwrap()[0].label, "Open_Palm");
    }

    #[test]
    fn test_pointer_is_a_single_identity() {
        assert_eq!(source().association(), Association::Single);
    }

    #[tokio::test]
    async fn test_coordinates_are_clamped() {
        let mut pointer = source();
        let handle = pointer.handle();
        pointer.start().await.unwrap();

        handle.move_to(-50.0, 900.0, 640.0, 360.0);
        assert_eq!(pointer.detect(0.0).unwrap()[0].position(), (0.0, 1.0));

        handle.move_to(10.0, 10.0, 0.0, 360.0);
        assert_eq!(pointer.detect(0.0).unwrap()[0].x, 0.0);
    }

    #[tokio::test]
    async fn test_events_ignored_while_stopped() {
        let mut pointer = source();
        let handle = pointer.handle();

        handle.move_to(10.0, 10.0, 100.0, 100.0);
        assert!(!handle.is_listening());
        assert_eq!(pointer.detect(0.0), Err(DetectionError::Inactive));

        pointer.start().await.unwrap();
        assert!(pointer.detect(0.0).unwrap().is_empty());

        handle.press(10.0, 10.0, 100.0, 100.0);
        pointer.stop().await.unwrap();
        pointer.start().await.unwrap();
        assert_eq!(pointer.detect(0.0).unwrap()[0].label, "Open_Palm");
    }
}

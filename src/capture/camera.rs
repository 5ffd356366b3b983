//! Camera-backed detection source
//!
//! Frame acquisition and the hand gesture model are external collaborators,
//! reached through [`FrameGrabber`] and [`GestureRecognizer`]. This module only
//! turns their output into [`Detection`]s.

use crate::capture::source::{
    Detection, DetectionError, DetectionSource, SourceError, SourceKind, SourceResult,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Landmark indices in the 21-point hand model
pub const WRIST: usize = 0;
pub const INDEX_FINGER_MCP: usize = 5;
pub const INDEX_FINGER_TIP: usize = 8;

/// Capture and recognizer options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    pub max_hands: u32,
    pub min_hand_presence_confidence: f32,
    pub min_tracking_confidence: f32,
    /// Flip x so the view behaves like a mirror
    pub mirror_x: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            max_hands: 3,
            min_hand_presence_confidence: 0.6,
            min_tracking_confidence: 0.6,
            mirror_x: true,
        }
    }
}

impl CameraConfig {
    pub fn recognizer_options(&self) -> RecognizerOptions {
        RecognizerOptions {
            max_hands: self.max_hands,
            min_hand_presence_confidence: self.min_hand_presence_confidence,
            min_tracking_confidence: self.min_tracking_confidence,
        }
    }
}

/// Model options applied before the camera stream starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognizerOptions {
    pub max_hands: u32,
    pub min_hand_presence_confidence: f32,
    pub min_tracking_confidence: f32,
}

/// Raw video frame handed to the recognizer
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Pixel data in the grabber's native layout
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Normalized 3-D landmark
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Ranked gesture category for one hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureCategory {
    pub category_name: String,
    pub score: f32,
}

/// Recognizer output for one hand
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognizedHand {
    pub landmarks: Vec<Landmark>,
    /// Best category first
    pub gestures: Vec<GestureCategory>,
}

/// Camera acquisition (external)
#[async_trait]
pub trait FrameGrabber: Send {
    async fn start(&mut self) -> SourceResult<()>;
    async fn stop(&mut self) -> SourceResult<()>;

    /// Latest frame, `None` until the stream has real dimensions
    fn current_frame(&mut self) -> Option<VideoFrame>;
}

/// Hand gesture model (external)
pub trait GestureRecognizer: Send {
    fn configure(&mut self, options: &RecognizerOptions) -> SourceResult<()>;

    fn recognize(
        &mut self,
        frame: &VideoFrame,
        timestamp_ms: f64,
    ) -> Result<Vec<RecognizedHand>, DetectionError>;
}

impl RecognizedHand {
    /// Convert to a detection anchored on the index fingertip
    ///
    /// Size is the wrist to index-knuckle distance, which shrinks as the hand
    /// moves away from the camera. Landmarks may stray slightly outside the
    /// frame, so the position is clamped to [0, 1]. Returns `None` for partial
    /// hands or hands without a gesture category.
    pub fn to_detection(&self, mirror_x: bool) -> Option<Detection> {
        let tip = self.landmarks.get(INDEX_FINGER_TIP)?;
        let wrist = self.landmarks.get(WRIST)?;
        let knuckle = self.landmarks.get(INDEX_FINGER_MCP)?;
        let gesture = self.gestures.first()?;

        let size = ((knuckle.x - wrist.x).powi(2)
            + (knuckle.y - wrist.y).powi(2)
            + (knuckle.z - wrist.z).powi(2))
        .sqrt();
        let x = if mirror_x { 1.0 - tip.x } else { tip.x };

        Some(Detection::new(
            x.clamp(0.0, 1.0),
            tip.y.clamp(0.0, 1.0),
            gesture.category_name.as_str(),
            size,
        ))
    }
}

pub struct CameraSource {
    config: CameraConfig,
    grabber: Box<dyn FrameGrabber>,
    recognizer: Box<dyn GestureRecognizer>,
    is_active: bool,
}

impl CameraSource {
    pub fn new(
        config: CameraConfig,
        grabber: Box<dyn FrameGrabber>,
        recognizer: Box<dyn GestureRecognizer>,
    ) -> Self {
        Self {
            config,
            grabber,
            recognizer,
            is_active: false,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }
}

#[async_trait]
impl DetectionSource for CameraSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Camera
    }

    async fn start(&mut self) -> SourceResult<()> {
        if self.is_active {
            return Err(SourceError::AlreadyActive);
        }
        self.recognizer.configure(&self.config.recognizer_options())?;
        self.grabber.start().await?;
        self.is_active = true;

        tracing::info!(
            "Camera started ({}x{}, max_hands={})",
            self.config.width,
            self.config.height,
            self.config.max_hands
        );
        Ok(())
    }

    async fn stop(&mut self) -> SourceResult<()> {
        if !self.is_active {
            return Ok(());
        }
        // Stays active until the grabber lets go, so a failed stop can be retried
        self.grabber.stop().await?;
        self.is_active = false;

        tracing::info!("Camera stopped");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn detect(&mut self, timestamp_ms: f64) -> Result<Vec<Detection>, DetectionError> {
        if !self.is_active {
            return Err(DetectionError::Inactive);
        }
        let frame = self
            .grabber
            .current_frame()
            .ok_or(DetectionError::FrameNotReady)?;

        let hands = self.recognizer.recognize(&frame, timestamp_ms)?;
        let mirror_x = self.config.mirror_x;

        Ok(hands
            .iter()
            .take(self.config.max_hands as usize)
            .filter_map(|hand| hand.to_detection(mirror_x))
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex as ParkingMutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Grabber whose stream state is observable from the test
    pub(crate) struct FakeGrabber {
        pub streaming: Arc<AtomicBool>,
        pub has_frame: bool,
        /// Number of upcoming `stop` calls that fail
        pub failing_stops: usize,
    }

    impl FakeGrabber {
        pub(crate) fn new(streaming: Arc<AtomicBool>, has_frame: bool) -> Self {
            Self {
                streaming,
                has_frame,
                failing_stops: 0,
            }
        }
    }

    #[async_trait]
    impl FrameGrabber for FakeGrabber {
        async fn start(&mut self) -> SourceResult<()> {
            self.streaming.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&mut self) -> SourceResult<()> {
            if self.failing_stops > 0 {
                self.failing_stops -= 1;
                return Err(SourceError::Device("track still in use".to_string()));
            }
            self.streaming.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn current_frame(&mut self) -> Option<VideoFrame> {
            self.has_frame.then(|| VideoFrame {
                data: vec![0; 4],
                width: 1,
                height: 1,
            })
        }
    }

    /// Recognizer returning queued results in order, then nothing
    pub(crate) struct ScriptedRecognizer {
        pub results: Arc<ParkingMutex<Vec<Result<Vec<RecognizedHand>, DetectionError>>>>,
        pub configured: Arc<ParkingMutex<Option<RecognizerOptions>>>,
    }

    impl ScriptedRecognizer {
        pub(crate) fn new(results: Vec<Result<Vec<RecognizedHand>, DetectionError>>) -> Self {
            Self {
                results: Arc::new(ParkingMutex::new(results)),
                configured: Arc::new(ParkingMutex::new(None)),
            }
        }
    }

    impl GestureRecognizer for ScriptedRecognizer {
        fn configure(&mut self, options: &RecognizerOptions) -> SourceResult<()> {
            *self.configured.lock() = Some(*options);
            Ok(())
        }

        fn recognize(
            &mut self,
            _frame: &VideoFrame,
            _timestamp_ms: f64,
        ) -> Result<Vec<RecognizedHand>, DetectionError> {
            let mut results = self.results.lock();
            if results.is_empty() {
                Ok(vec![])
            } else {
                results.remove(0)
            }
        }
    }

    pub(crate) fn hand(tip: (f64, f64), gesture: &str) -> RecognizedHand {
        let mut landmarks = vec![Landmark { x: 0.0, y: 0.0, z: 0.0 }; 21];
        landmarks[WRIST] = Landmark { x: 0.5, y: 0.9, z: 0.0 };
        landmarks[INDEX_FINGER_MCP] = Landmark { x: 0.5, y: 0.6, z: 0.4 };
        landmarks[INDEX_FINGER_TIP] = Landmark { x: tip.0, y: tip.1, z: 0.0 };
        RecognizedHand {
            landmarks,
            gestures: vec![GestureCategory {
                category_name: gesture.to_string(),
                score: 0.9,
            }],
        }
    }

    fn camera(
        has_frame: bool,
        results: Vec<Result<Vec<RecognizedHand>, DetectionError>>,
        mirror_x: bool,
    ) -> (CameraSource, Arc<AtomicBool>) {
        let streaming = Arc::new(AtomicBool::new(false));
        let source = CameraSource::new(
            CameraConfig {
                mirror_x,
                ..Default::default()
            },
            Box::new(FakeGrabber::new(streaming.clone(), has_frame)),
            Box::new(ScriptedRecognizer::new(results)),
        );
        (source, streaming)
    }

    #[test]
    fn test_hand_to_detection() {
        let detection = hand((0.2, 0.3), "Pointing_Up").to_detection(false).unwrap();
        assert_eq!(detection.position(), (0.2, 0.3));
        assert_eq!(detection.label, "Pointing_Up");
        assert!((detection.size - 0.5).abs() < 1e-9);

        let mirrored = hand((0.2, 0.3), "Pointing_Up").to_detection(true).unwrap();
        assert!((mirrored.x - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_landmarks_outside_frame_are_clamped() {
        let mirrored = hand((-0.03, 1.02), "Open_Palm").to_detection(true).unwrap();
        assert_eq!(mirrored.position(), (1.0, 1.0));

        let mirrored = hand((1.04, -0.01), "Open_Palm").to_detection(true).unwrap();
        assert_eq!(mirrored.position(), (0.0, 0.0));

        let plain = hand((1.04, 0.5), "Open_Palm").to_detection(false).unwrap();
        assert_eq!(plain.position(), (1.0, 0.5));
    }

    #[test]
    fn test_partial_hand_is_skipped() {
        let mut partial = hand((0.2, 0.3), "Open_Palm");
        partial.landmarks.truncate(8);
        assert!(partial.to_detection(false).is_none());

        let mut unlabeled = hand((0.2, 0.3), "Open_Palm");
        unlabeled.gestures.clear();
        assert!(unlabeled.to_detection(false).is_none());
    }

    #[tokio::test]
    async fn test_start_and_stop_drive_the_grabber() {
        let (mut source, streaming) = camera(true, vec![], false);

        source.start().await.unwrap();
        assert!(streaming.load(Ordering::SeqCst));
        assert!(matches!(source.start().await, Err(SourceError::AlreadyActive)));

        source.stop().await.unwrap();
        assert!(!streaming.load(Ordering::SeqCst));
        assert_eq!(source.detect(0.0), Err(DetectionError::Inactive));
    }

    #[tokio::test]
    async fn test_detect_converts_hands() {
        let results = vec![Ok(vec![
            hand((0.1, 0.1), "Open_Palm"),
            RecognizedHand::default(),
            hand((0.9, 0.9), "Pointing_Up"),
        ])];
        let (mut source, _) = camera(true, results, false);
        source.start().await.unwrap();

        let detections = source.detect(0.0).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].label, "Open_Palm");
        assert_eq!(detections[1].position(), (0.9, 0.9));
    }

    #[tokio::test]
    async fn test_detect_without_frame_or_with_model_error() {
        let (mut source, _) = camera(false, vec![], false);
        source.start().await.unwrap();
        assert_eq!(source.detect(0.0), Err(DetectionError::FrameNotReady));

        let failure = DetectionError::Recognizer("gpu lost".to_string());
        let (mut source, _) = camera(true, vec![Err(failure.clone())], false);
        source.start().await.unwrap();
        assert_eq!(source.detect(0.0), Err(failure));
        assert!(source.detect(33.0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_stop_keeps_camera_active_for_retry() {
        let streaming = Arc::new(AtomicBool::new(false));
        let mut grabber = FakeGrabber::new(streaming.clone(), true);
        grabber.failing_stops = 1;
        let mut source = CameraSource::new(
            CameraConfig::default(),
            Box::new(grabber),
            Box::new(ScriptedRecognizer::new(vec![])),
        );
        source.start().await.unwrap();

        assert!(matches!(source.stop().await, Err(SourceError::Device(_))));
        assert!(source.is_active());
        assert!(streaming.load(Ordering::SeqCst));

        source.stop().await.unwrap();
        assert!(!source.is_active());
        assert!(!streaming.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_recognizer_options_applied_and_hands_capped() {
        let recognizer = ScriptedRecognizer::new(vec![Ok(vec![
            hand((0.1, 0.1), "Open_Palm"),
            hand((0.3, 0.3), "Open_Palm"),
            hand((0.5, 0.5), "Open_Palm"),
        ])]);
        let configured = recognizer.configured.clone();
        let config = CameraConfig {
            max_hands: 2,
            min_hand_presence_confidence: 0.7,
            mirror_x: false,
            ..Default::default()
        };
        let mut source = CameraSource::new(
            config.clone(),
            Box::new(FakeGrabber::new(Arc::new(AtomicBool::new(false)), true)),
            Box::new(recognizer),
        );
        assert!(configured.lock().is_none());

        source.start().await.unwrap();
        assert_eq!(*configured.lock(), Some(config.recognizer_options()));

        let detections = source.detect(0.0).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[1].position(), (0.3, 0.3));
    }
}

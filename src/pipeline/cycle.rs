//! One detection cycle: detect, associate, derive clicks, publish
//!
//! Publish order within a cycle is fixed. Fresh entities come first, in
//! detection order, each `move` immediately followed by its `click` when one
//! fires. Held-over entities follow in id order (moves only). A single `tick`
//! closes the cycle, including cycles whose detection failed.

use crate::capture::source::{Detection, DetectionError, DetectionSource, SourceKind};
use crate::config::PipelineConfig;
use crate::events::{ClickEvent, Event, EventBus, MoveEvent};
use crate::processing::gesture::ClickDetector;
use crate::processing::tracker::IdentityTracker;
use std::sync::Arc;

/// What a cycle published
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub moves: usize,
    pub clicks: usize,
    pub expired: usize,
    pub detection_error: Option<DetectionError>,
}

/// State touched by a cycle. Only ever driven from one task at a time.
pub struct TrackingCore {
    source: Box<dyn DetectionSource>,
    tracker: IdentityTracker,
    clicks: ClickDetector,
    bus: Arc<EventBus>,
}

impl TrackingCore {
    pub fn new(source: Box<dyn DetectionSource>, config: &PipelineConfig, bus: Arc<EventBus>) -> Self {
        Self {
            tracker: IdentityTracker::new(config.tracker()).with_association(source.association()),
            source,
            clicks: ClickDetector::new(config.clicks()),
            bus,
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn source_mut(&mut self) -> &mut dyn DetectionSource {
        self.source.as_mut()
    }

    pub fn tracker(&self) -> &IdentityTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut IdentityTracker {
        &mut self.tracker
    }

    /// Poll the source once and process the result
    pub fn run_cycle(&mut self, now_ms: f64) -> CycleReport {
        let result = self.source.detect(now_ms);
        self.process(result, now_ms)
    }

    pub fn process(
        &mut self,
        result: Result<Vec<Detection>, DetectionError>,
        now_ms: f64,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        match result {
            Ok(detections) => {
                let update = self.tracker.update(&detections, now_ms);

                for observation in &update.observations {
                    let entity = &observation.entity;
                    self.bus.publish(&Event::Move(MoveEvent::from(entity)));
                    report.moves += 1;

                    if observation.held_over {
                        continue;
                    }
                    let clicked = match self.tracker.edge_state_mut(entity.id) {
                        Some(state) => self.clicks.observe(state, &entity.label, now_ms),
                        None => false,
                    };
                    if clicked {
                        tracing::debug!("Click from identity {} at ({:.3}, {:.3})", entity.id, entity.x, entity.y);
                        self.bus.publish(&Event::Click(ClickEvent {
                            x: entity.x,
                            y: entity.y,
                        }));
                        report.clicks += 1;
                    }
                }
                report.expired = update.expired.len();
            }
            Err(DetectionError::FrameNotReady) => {
                tracing::debug!("Frame not ready, skipping detection");
                report.detection_error = Some(DetectionError::FrameNotReady);
            }
            Err(e) => {
                tracing::warn!("Gesture recognition error: {}", e);
                report.detection_error = Some(e);
            }
        }

        self.bus.publish(&Event::Tick);
        report
    }
}

//! Per-frame processing
//!
//! Identity association for raw detections and click derivation from the
//! associated labels.

pub mod gesture;
pub mod tracker;

pub use gesture::{ClickDetector, GestureEdgeState};
pub use tracker::{Association, EntityId, FrameUpdate, IdentityTracker, Observation, TrackedEntity};

//! Detection source trait
//!
//! Defines the interface shared by every producer of per-frame detections
//! (camera recognizer, pointer fallback, scripted replay).

use crate::processing::tracker::Association;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-frame detection failures. The cycle for that frame is skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("Recognizer error: {0}")]
    Recognizer(String),

    #[error("Frame not ready")]
    FrameNotReady,

    #[error("Source is not active")]
    Inactive,
}

/// Errors raised while acquiring or releasing a source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Source already active")]
    AlreadyActive,
}

/// Result type for source acquisition
pub type SourceResult<T> = Result<T, SourceError>;

/// One raw, identity-less observation from a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Normalized horizontal position in [0, 1]
    pub x: f64,
    /// Normalized vertical position in [0, 1]
    pub y: f64,
    /// Gesture category reported for this observation
    pub label: String,
    /// Apparent hand size, always positive
    pub size: f64,
}

impl Detection {
    pub fn new(x: f64, y: f64, label: impl Into<String>, size: f64) -> Self {
        Self {
            x,
            y,
            label: label.into(),
            size,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Finite coordinates and a positive, finite size
    pub fn is_well_formed(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.size.is_finite() && self.size > 0.0
    }
}

/// Trait for detection sources
///
/// A source is started once per running period and polled once per scheduler
/// cycle. `detect` runs on the pipeline's single logical thread and is never
/// called concurrently with itself.
#[async_trait]
pub trait DetectionSource: Send {
    fn kind(&self) -> SourceKind;

    /// Acquire the underlying device (camera stream, pointer listeners)
    async fn start(&mut self) -> SourceResult<()>;

    /// Release the underlying device
    async fn stop(&mut self) -> SourceResult<()>;

    fn is_active(&self) -> bool;

    /// How the tracker binds this source's detections to identities
    fn association(&self) -> Association {
        Association::Nearest
    }

    /// Produce this frame's detections
    fn detect(&mut self, timestamp_ms: f64) -> Result<Vec<Detection>, DetectionError>;
}

/// Types of detection sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    /// Camera frames through a hand gesture recognizer
    Camera,
    /// Single entity driven by pointer input
    Pointer,
    /// Pre-recorded frames
    Replay,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Camera => write!(f, "camera"),
            SourceKind::Pointer => write!(f, "pointer"),
            SourceKind::Replay => write!(f, "replay"),
        }
    }
}

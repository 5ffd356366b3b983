//! Replay source
//!
//! Plays back a recorded script of frames, one per detect call. Once the
//! script is exhausted every further frame is empty.

use crate::capture::source::{Detection, DetectionError, DetectionSource, SourceKind, SourceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// One scripted frame: either detections or a detector failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplayFrame {
    Failed { error: String },
    Detected { detections: Vec<Detection> },
}

impl ReplayFrame {
    pub fn detected(detections: Vec<Detection>) -> Self {
        ReplayFrame::Detected { detections }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ReplayFrame::Failed {
            error: error.into(),
        }
    }
}

pub struct ReplaySource {
    frames: VecDeque<ReplayFrame>,
    total: usize,
    is_active: bool,
}

impl ReplaySource {
    pub fn new(frames: Vec<ReplayFrame>) -> Self {
        Self {
            total: frames.len(),
            frames: frames.into(),
            is_active: false,
        }
    }

    /// Load a JSON array of frames
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let frames: Vec<ReplayFrame> = serde_json::from_str(&content)?;
        Ok(Self::new(frames))
    }

    pub fn total_frames(&self) -> usize {
        self.total
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl DetectionSource for ReplaySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Replay
    }

    async fn start(&mut self) -> SourceResult<()> {
        self.is_active = true;
        tracing::debug!("Replay started ({} frames remaining)", self.frames.len());
        Ok(())
    }

    async fn stop(&mut self) -> SourceResult<()> {
        self.is_active = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn detect(&mut self, _timestamp_ms: f64) -> Result<Vec<Detection>, DetectionError> {
        if !self.is_active {
            return Err(DetectionError::Inactive);
        }
        match self.frames.pop_front() {
            Some(ReplayFrame::Detected { detections }) => Ok(detections),
            Some(ReplayFrame::Failed { error }) => Err(DetectionError::Recognizer(error)),
            None => Ok(vec![]),
        }
    }
}

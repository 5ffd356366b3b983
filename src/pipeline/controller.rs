//! Lifecycle controller
//!
//! Owns the running pipeline: the detection source, the tracking state and the
//! scheduler task. `start` and `stop` are idempotent. Visibility changes from
//! the host map onto them.

use crate::capture::source::{DetectionSource, SourceError, SourceKind};
use crate::config::{ConfigError, PipelineConfig};
use crate::events::EventBus;
use crate::pipeline::cycle::TrackingCore;
use crate::pipeline::scheduler::{Clock, FrameScheduler, RepaintHost, ScheduleState};
use crate::processing::tracker::TrackedEntity;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    Stopped,
    Running,
}

pub struct GesturePipeline {
    config: PipelineConfig,
    source_kind: SourceKind,
    core: Arc<Mutex<TrackingCore>>,
    bus: Arc<EventBus>,
    host: Arc<dyn RepaintHost>,
    clock: Clock,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    cycles: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl GesturePipeline {
    /// Build a stopped pipeline. Fails fast on an invalid configuration.
    pub fn new(
        config: PipelineConfig,
        source: Box<dyn DetectionSource>,
        host: Arc<dyn RepaintHost>,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let bus = Arc::new(EventBus::new());
        let source_kind = source.kind();
        let core = TrackingCore::new(source, &config, bus.clone());

        Ok(Self {
            config,
            source_kind,
            core: Arc::new(Mutex::new(core)),
            bus,
            host,
            clock: Clock::new(),
            running: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            cycles: Arc::new(AtomicU64::new(0)),
            task: None,
        })
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    pub fn state(&self) -> LifecycleState {
        if self.task.is_some() {
            LifecycleState::Running
        } else {
            LifecycleState::Stopped
        }
    }

    /// Completed cycles since construction
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub async fn tracked_entities(&self) -> Vec<TrackedEntity> {
        self.core.lock().await.tracker().entities()
    }

    /// Acquire the source and begin scheduling
    ///
    /// Once the source is acquired, click cooldowns are cleared; tracked
    /// identities are kept.
    pub async fn start(&mut self) -> PipelineResult<()> {
        if self.task.is_some() {
            return Ok(());
        }

        {
            let mut core = self.core.lock().await;
            core.source_mut().start().await?;
            core.tracker_mut().reset_click_cooldowns();
        }

        self.running.store(true, Ordering::SeqCst);
        let scheduler = FrameScheduler::new(
            ScheduleState::new(self.config.frame_interval_ms, self.config.frame_budget_ms),
            self.host.clone(),
            self.clock,
            self.running.clone(),
            self.wake.clone(),
        );
        self.task = Some(tokio::spawn(
            scheduler.run(self.core.clone(), self.cycles.clone()),
        ));

        tracing::info!("Gesture pipeline started ({} source)", self.source_kind);
        Ok(())
    }

    /// Stop scheduling and release the source
    ///
    /// A cycle already in progress finishes; no further cycle starts.
    pub async fn stop(&mut self) -> PipelineResult<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
        if let Err(e) = task.await {
            tracing::warn!("Scheduler task ended abnormally: {}", e);
        }

        self.core.lock().await.source_mut().stop().await?;

        tracing::info!("Gesture pipeline stopped after {} cycles", self.cycles());
        Ok(())
    }

    /// Host visibility signal: hidden stops, visible starts
    pub async fn on_visibility_change(&mut self, hidden: bool) -> PipelineResult<()> {
        if hidden {
            self.stop().await
        } else {
            self.start().await
        }
    }

    /// Stop and forget every tracked identity
    pub async fn teardown(&mut self) -> PipelineResult<()> {
        self.stop().await?;
        self.core.lock().await.tracker_mut().clear();
        Ok(())
    }
}

/// Dropping a running pipeline aborts the scheduler and releases the source on
/// the current runtime. Outside a runtime the source cannot be released, so
/// call [`GesturePipeline::stop`] first when that matters.
impl Drop for GesturePipeline {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(task) = self.task.take() else {
            return;
        };
        task.abort();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let core = self.core.clone();
                runtime.spawn(async move {
                    let mut core = core.lock().await;
                    let released = core.source_mut().stop().await;
                    if let Err(e) = released {
                        tracing::warn!("Failed to release {} source: {}", core.source_kind(), e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!("Pipeline dropped outside a runtime, {} source not released", self.source_kind);
            }
        }
    }
}

//! Pipeline runtime: the per-frame cycle, its scheduler and the lifecycle
//! controller that starts and stops both.

pub mod controller;
pub mod cycle;
pub mod scheduler;

pub use controller::{GesturePipeline, LifecycleState, PipelineError, PipelineResult};
pub use cycle::{CycleReport, TrackingCore};
pub use scheduler::{Clock, FixedRateRepaint, FrameScheduler, Poll, RepaintHost, ScheduleState};

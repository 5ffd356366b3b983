//! Gesture Input - stable pointers and clicks from hand detections.
//!
//! Takes the per-frame output of a hand gesture recognizer (or a pointer, when
//! there is no camera), gives each hand a persistent identity, derives clicks
//! from gesture transitions and publishes `move`, `click` and `tick` events at
//! a bounded frame rate.

pub mod capture;
pub mod config;
pub mod events;
pub mod pipeline;
pub mod processing;
pub mod recorder;

pub use capture::{select_source, CameraProvider, Detection, DetectionError, DetectionSource, SourceKind};
pub use config::{ConfigError, PipelineConfig};
pub use events::{ClickEvent, Event, EventBus, EventKind, MoveEvent};
pub use pipeline::{GesturePipeline, LifecycleState, PipelineError};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default tracing subscriber (`RUST_LOG` overrides the filter)
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gesture_input=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

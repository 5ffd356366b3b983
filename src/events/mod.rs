//! Events published by the pipeline
//!
//! `move` for every present entity each cycle, `click` on a derived click,
//! and one `tick` per completed cycle.

pub mod bus;
pub mod types;

pub use bus::{Delivery, EventBus, HandlerResult, SubscriptionId};
pub use types::{ClickEvent, Event, EventKind, MoveEvent};

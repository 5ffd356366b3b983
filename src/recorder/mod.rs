//! Session recording
//!
//! Captures the events a pipeline publishes so a session can be inspected or
//! replayed offline.

pub mod event_log;

pub use event_log::{EventLog, EventLogDocument, RecordedEvent};

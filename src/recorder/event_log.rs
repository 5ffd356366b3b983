use crate::events::{Event, EventBus, EventKind, SubscriptionId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex as ParkingMutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// One published event and when it was seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    /// Milliseconds since the log was attached
    pub offset_ms: f64,
    #[serde(flatten)]
    pub event: Event,
}

/// Serialized form of a session log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogDocument {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub moves: usize,
    pub clicks: usize,
    pub ticks: usize,
    pub events: Vec<RecordedEvent>,
}

/// Records every event published on a bus until dropped or detached
pub struct EventLog {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    events: Arc<ParkingMutex<Vec<RecordedEvent>>>,
    bus: Arc<EventBus>,
    subscriptions: Vec<(EventKind, SubscriptionId)>,
}

impl EventLog {
    pub fn attach(bus: Arc<EventBus>) -> Self {
        let events: Arc<ParkingMutex<Vec<RecordedEvent>>> = Arc::new(ParkingMutex::new(Vec::new()));
        let start_time = Instant::now();

        let subscriptions = EventKind::ALL
            .iter()
            .map(|&kind| {
                let events = events.clone();
                let id = bus.subscribe(kind, move |event| {
                    events.lock().push(RecordedEvent {
                        offset_ms: start_time.elapsed().as_secs_f64() * 1000.0,
                        event: event.clone(),
                    });
                    Ok(())
                });
                (kind, id)
            })
            .collect();

        let session_id = Uuid::new_v4();
        tracing::debug!("Event log {} attached", session_id);

        Self {
            session_id,
            started_at: Utc::now(),
            events,
            bus,
            subscriptions,
        }
    }

    /// Stop recording; already recorded events are kept
    pub fn detach(&mut self) {
        for (kind, id) in self.subscriptions.drain(..) {
            self.bus.unsubscribe(kind, id);
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|recorded| recorded.event.kind() == kind)
            .count()
    }

    pub fn snapshot(&self) -> EventLogDocument {
        let events = self.events.lock().clone();
        let tally = |kind: EventKind| events.iter().filter(|r| r.event.kind() == kind).count();

        EventLogDocument {
            session_id: self.session_id,
            started_at: self.started_at,
            moves: tally(EventKind::Move),
            clicks: tally(EventKind::Click),
            ticks: tally(EventKind::Tick),
            events,
        }
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let document = self.snapshot();
        let data = serde_json::to_vec_pretty(&document)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, data)?;

        tracing::info!(
            "Event log written to {:?} (moves={}, clicks={}, ticks={})",
            path,
            document.moves,
            document.clicks,
            document.ticks
        );
        Ok(())
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        self.detach();
    }
}

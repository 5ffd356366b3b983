use crate::processing::tracker::{EntityId, TrackedEntity};
use serde::{Deserialize, Serialize};

/// Position and state of one present entity, published every cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveEvent {
    pub id: EntityId,
    pub x: f64,
    pub y: f64,
    pub label: String,
    pub size: f64,
}

impl From<&TrackedEntity> for MoveEvent {
    fn from(entity: &TrackedEntity) -> Self {
        Self {
            id: entity.id,
            x: entity.x,
            y: entity.y,
            label: entity.label.clone(),
            size: entity.size,
        }
    }
}

/// Derived click. Carries only the position; consumers resolve identity themselves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Event {
    Move(MoveEvent),
    Click(ClickEvent),
    Tick,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Move(_) => EventKind::Move,
            Event::Click(_) => EventKind::Click,
            Event::Tick => EventKind::Tick,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Move,
    Click,
    Tick,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Move, EventKind::Click, EventKind::Tick];
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Move => write!(f, "move"),
            EventKind::Click => write!(f, "click"),
            EventKind::Tick => write!(f, "tick"),
        }
    }
}

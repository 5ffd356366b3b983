//! Identity tracking for per-frame detections
//!
//! Greedy nearest-neighbor association: each detection, in arrival order,
//! takes the closest identity not yet claimed this frame if it lies within
//! the association threshold, otherwise it gets a fresh identity. The result
//! is frame-local and not globally optimal. A detection that lands closer to
//! someone else's identity than to its own can steal it, and the tracker
//! keeps that behavior as is.
//!
//! Identities that miss a frame are held over at their last known state and
//! keep being reported until they have been silent for longer than the expiry
//! timeout.

use crate::capture::source::Detection;
use crate::config::TrackerConfig;
use crate::processing::gesture::GestureEdgeState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Identity handle. Allocated in increasing order, never reissued.
pub type EntityId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntity {
    pub id: EntityId,
    pub x: f64,
    pub y: f64,
    pub label: String,
    pub size: f64,
    pub last_seen_ms: f64,
}

impl TrackedEntity {
    fn from_detection(id: EntityId, detection: &Detection, now_ms: f64) -> Self {
        Self {
            id,
            x: detection.x,
            y: detection.y,
            label: detection.label.clone(),
            size: detection.size,
            last_seen_ms: now_ms,
        }
    }

    fn refresh(&mut self, detection: &Detection, now_ms: f64) {
        self.x = detection.x;
        self.y = detection.y;
        self.label.clone_from(&detection.label);
        self.size = detection.size;
        self.last_seen_ms = now_ms;
    }

    pub fn distance_to(&self, detection: &Detection) -> f64 {
        (self.x - detection.x).hypot(self.y - detection.y)
    }
}

/// One entity reported for a frame
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub entity: TrackedEntity,
    /// No detection matched this frame; the state is the last known one
    pub held_over: bool,
}

/// Outcome of one association step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameUpdate {
    /// Fresh entities in detection order, then held-over entities by id
    pub observations: Vec<Observation>,
    /// Identities removed by this step
    pub expired: Vec<EntityId>,
}

/// How a detection is bound to an existing identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Association {
    /// Closest unclaimed identity, if within the association threshold
    #[default]
    Nearest,
    /// The source reports a single entity; its detection always continues
    /// the live identity however far it moved
    Single,
}

/// Entity plus its click derivation state, so both expire together
#[derive(Debug, Clone)]
struct TrackedRecord {
    entity: TrackedEntity,
    edge: Option<GestureEdgeState>,
}

#[derive(Debug)]
pub struct IdentityTracker {
    config: TrackerConfig,
    association: Association,
    records: BTreeMap<EntityId, TrackedRecord>,
    next_id: EntityId,
}

impl IdentityTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            association: Association::Nearest,
            records: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn with_association(mut self, association: Association) -> Self {
        self.association = association;
        self
    }

    pub fn association(&self) -> Association {
        self.association
    }

    /// Associate a frame's detections and return the live set, ordered by id
    pub fn associate(&mut self, detections: &[Detection], now_ms: f64) -> Vec<TrackedEntity> {
        self.update(detections, now_ms);
        self.entities()
    }

    /// Associate a frame's detections and report what happened to each identity
    pub fn update(&mut self, detections: &[Detection], now_ms: f64) -> FrameUpdate {
        let mut claimed: HashSet<EntityId> = HashSet::with_capacity(detections.len());
        let mut observations = Vec::with_capacity(self.records.len() + detections.len());

        for detection in detections {
            if !detection.is_well_formed() {
                tracing::debug!("Dropping malformed detection: {:?}", detection);
                continue;
            }

            let id = match self.nearest_unclaimed(detection, &claimed) {
                Some((id, distance)) if self.continues(distance) => id,
                _ => self.allocate_id(),
            };
            claimed.insert(id);

            let record = self.records.entry(id).or_insert_with(|| {
                tracing::debug!("New identity {} at ({:.3}, {:.3})", id, detection.x, detection.y);
                TrackedRecord {
                    entity: TrackedEntity::from_detection(id, detection, now_ms),
                    edge: None,
                }
            });
            record.entity.refresh(detection, now_ms);

            observations.push(Observation {
                entity: record.entity.clone(),
                held_over: false,
            });
        }

        let expiry_timeout_ms = self.config.expiry_timeout_ms;
        let mut expired = Vec::new();
        self.records.retain(|id, record| {
            if claimed.contains(id) {
                return true;
            }
            if now_ms - record.entity.last_seen_ms > expiry_timeout_ms {
                expired.push(*id);
                return false;
            }
            observations.push(Observation {
                entity: record.entity.clone(),
                held_over: true,
            });
            true
        });

        if !expired.is_empty() {
            tracing::debug!("Expired identities {:?}", expired);
        }

        FrameUpdate {
            observations,
            expired,
        }
    }

    /// Closest unclaimed identity; ties go to the lowest id
    fn nearest_unclaimed(
        &self,
        detection: &Detection,
        claimed: &HashSet<EntityId>,
    ) -> Option<(EntityId, f64)> {
        let mut best: Option<(EntityId, f64)> = None;
        for (id, record) in &self.records {
            if claimed.contains(id) {
                continue;
            }
            let distance = record.entity.distance_to(detection);
            match best {
                Some((_, best_distance)) if best_distance <= distance => {}
                _ => best = Some((*id, distance)),
            }
        }
        best
    }

    fn continues(&self, distance: f64) -> bool {
        match self.association {
            Association::Nearest => distance < self.config.association_threshold,
            Association::Single => true,
        }
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn entities(&self) -> Vec<TrackedEntity> {
        self.records.values().map(|r| r.entity.clone()).collect()
    }

    pub fn get(&self, id: EntityId) -> Option<&TrackedEntity> {
        self.records.get(&id).map(|r| &r.entity)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Id the next new identity will receive
    pub fn next_id(&self) -> EntityId {
        self.next_id
    }

    pub fn edge_state(&self, id: EntityId) -> Option<&GestureEdgeState> {
        self.records.get(&id).and_then(|r| r.edge.as_ref())
    }

    /// Edge state for a live identity, created on first use
    pub fn edge_state_mut(&mut self, id: EntityId) -> Option<&mut GestureEdgeState> {
        self.records
            .get_mut(&id)
            .map(|r| r.edge.get_or_insert_with(GestureEdgeState::default))
    }

    pub fn reset_click_cooldowns(&mut self) {
        for edge in self.records.values_mut().filter_map(|r| r.edge.as_mut()) {
            edge.reset_cooldown();
        }
    }

    /// Drop every identity. The id counter keeps counting.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

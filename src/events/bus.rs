//! Typed publish/subscribe for pipeline events
//!
//! Handlers run synchronously, in subscription order, on the publishing
//! thread. A handler that returns an error or panics is logged and skipped;
//! the remaining handlers still run. Nothing is queued: an event with no
//! subscribers is dropped.

use crate::events::types::{ClickEvent, Event, EventKind, MoveEvent};
use parking_lot::Mutex as ParkingMutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result returned by event handlers
pub type HandlerResult = anyhow::Result<()>;

type Handler = Arc<dyn Fn(&Event) -> HandlerResult + Send + Sync>;

/// Token returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Outcome of one publish call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    handlers: ParkingMutex<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Returns false when the subscription was not registered for `kind`
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        list.len() != before
    }

    pub fn on_move<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&MoveEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Move, move |event| match event {
            Event::Move(payload) => handler(payload),
            _ => Ok(()),
        })
    }

    pub fn on_click<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ClickEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Click, move |event| match event {
            Event::Click(payload) => handler(payload),
            _ => Ok(()),
        })
    }

    pub fn on_tick<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Tick, move |_| handler())
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every handler subscribed to its kind
    pub fn publish(&self, event: &Event) -> Delivery {
        let kind = event.kind();
        // Snapshot so handlers may subscribe or unsubscribe while being called
        let snapshot: Vec<Handler> = match self.handlers.lock().get(&kind) {
            Some(list) => list.iter().map(|(_, handler)| handler.clone()).collect(),
            None => return Delivery::default(),
        };

        let mut delivery = Delivery::default();
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivery.delivered += 1,
                Ok(Err(e)) => {
                    delivery.failed += 1;
                    tracing::warn!("{} handler failed: {:#}", kind, e);
                }
                Err(_) => {
                    delivery.failed += 1;
                    tracing::error!("{} handler panicked", kind);
                }
            }
        }
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn move_event(id: u64) -> Event {
        Event::Move(MoveEvent {
            id,
            x: 0.5,
            y: 0.5,
            label: "Open_Palm".to_string(),
            size: 0.2,
        })
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let calls = Arc::new(ParkingMutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let calls = calls.clone();
            bus.on_tick(move || {
                calls.lock().push(name);
                Ok(())
            });
        }

        let delivery = bus.publish(&Event::Tick);
        assert_eq!(delivery, Delivery { delivered: 3, failed: 0 });
        assert_eq!(*calls.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_kinds_are_separate() {
        let bus = EventBus::new();
        let moves = Arc::new(AtomicUsize::new(0));
        let counter = moves.clone();
        bus.on_move(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(&Event::Tick);
        bus.publish(&Event::Click(ClickEvent { x: 0.1, y: 0.1 }));
        assert_eq!(moves.load(Ordering::SeqCst), 0);

        bus.publish(&move_event(3));
        assert_eq!(moves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let id = bus.on_tick(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(&Event::Tick);
        assert!(!bus.unsubscribe(EventKind::Move, id));
        assert!(bus.unsubscribe(EventKind::Tick, id));
        assert!(!bus.unsubscribe(EventKind::Tick, id));
        bus.publish(&Event::Tick);

        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(EventKind::Tick), 0);
    }

    #[test]
    fn test_failing_handlers_are_isolated() {
        let bus = EventBus::new();
        let reached = Arc::new(AtomicUsize::new(0));

        bus.on_click(|_| Err(anyhow::anyhow!("renderer not ready")));
        bus.on_click(|_| panic!("handler bug"));
        let counter = reached.clone();
        bus.on_click(move |click| {
            assert_eq!(click.x, 0.3);
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let delivery = bus.publish(&Event::Click(ClickEvent { x: 0.3, y: 0.4 }));
        assert_eq!(delivery, Delivery { delivered: 1, failed: 2 });
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(&move_event(0)), Delivery::default());
    }

    #[test]
    fn test_handler_may_subscribe_during_publish() {
        let bus = Arc::new(EventBus::new());
        let inner = bus.clone();
        bus.on_tick(move || {
            inner.on_tick(|| Ok(()));
            Ok(())
        });

        assert_eq!(bus.publish(&Event::Tick).delivered, 1);
        assert_eq!(bus.subscriber_count(EventKind::Tick), 2);
    }
}

//! Listener registry and synchronous fan-out.

use satchel_core::StorageEvent;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Receives storage events.
///
/// Any `Fn(&StorageEvent) + Send + Sync` closure is a listener.
pub trait StorageListener: Send + Sync {
    fn on_event(&self, event: &StorageEvent);
}

impl<F> StorageListener for F
where
    F: Fn(&StorageEvent) + Send + Sync,
{
    fn on_event(&self, event: &StorageEvent) {
        self(event)
    }
}

/// Handle identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Registration {
    id: ListenerId,
    listener: Arc<dyn StorageListener>,
}

/// Ordered set of listeners owned by one storage instance.
///
/// `emit` calls every listener registered at the time of the call, in
/// registration order. A panicking listener is logged and skipped; it never
/// reaches the emitting operation and never stops later listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Registration>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. The same `Arc` may be registered more than
    /// once; each registration gets its own id.
    pub fn add_listener(&self, listener: Arc<dyn StorageListener>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration { id, listener });
        id
    }

    /// Remove a registration. Unknown ids are ignored; returns whether
    /// anything was removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }

    /// Remove every registration of `listener`, compared by identity.
    pub fn remove_listener_instance(&self, listener: &Arc<dyn StorageListener>) -> usize {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|registration| !Arc::ptr_eq(&registration.listener, listener));
        before - listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver `event` to every registered listener.
    pub fn emit(&self, event: &StorageEvent) {
        // Snapshot so listeners may (un)register without deadlocking.
        let snapshot: Vec<(ListenerId, Arc<dyn StorageListener>)> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|registration| (registration.id, Arc::clone(&registration.listener)))
            .collect();

        for (id, listener) in snapshot {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if delivered.is_err() {
                tracing::warn!(
                    listener_id = %id,
                    event = %event.kind,
                    plugin_id = %event.plugin_id,
                    "storage listener panicked; continuing delivery"
                );
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_core::StorageEventKind;
    use std::sync::Mutex;

    fn event(kind: StorageEventKind) -> StorageEvent {
        StorageEvent {
            kind,
            plugin_id: "weather".to_string(),
            namespace: "plugin".to_string(),
            key: Some("city".to_string()),
            success: true,
            error: None,
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Arc<dyn StorageListener> {
        let log = Arc::clone(log);
        Arc::new(move |event: &StorageEvent| {
            log.lock().unwrap().push(format!("{tag}:{}", event.kind));
        })
    }

    #[test]
    fn test_emit_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.add_listener(recorder(&log, "first"));
        bus.add_listener(recorder(&log, "second"));

        bus.emit(&event(StorageEventKind::Set));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:storage:set".to_string(), "second:storage:set".to_string()]
        );
    }

    #[test]
    fn test_remove_listener_stops_delivery() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = bus.add_listener(recorder(&log, "only"));

        bus.emit(&event(StorageEventKind::Get));
        assert!(bus.remove_listener(id));
        bus.emit(&event(StorageEventKind::Get));

        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_remove_unknown_listener_is_noop() {
        let bus = EventBus::new();
        let id = bus.add_listener(Arc::new(|_: &StorageEvent| {}));
        assert!(bus.remove_listener(id));
        assert!(!bus.remove_listener(id));
    }

    #[test]
    fn test_remove_by_identity() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = recorder(&log, "dup");
        bus.add_listener(Arc::clone(&listener));
        bus.add_listener(Arc::clone(&listener));
        bus.add_listener(recorder(&log, "other"));

        assert_eq!(bus.remove_listener_instance(&listener), 2);
        bus.emit(&event(StorageEventKind::Remove));
        assert_eq!(*log.lock().unwrap(), vec!["other:storage:remove".to_string()]);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.add_listener(Arc::new(|_: &StorageEvent| panic!("listener bug")));
        bus.add_listener(recorder(&log, "after"));

        bus.emit(&event(StorageEventKind::Clear));

        assert_eq!(*log.lock().unwrap(), vec!["after:storage:clear".to_string()]);
    }

    #[test]
    fn test_listener_may_unregister_during_emit() {
        let bus = Arc::new(EventBus::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let bus_ref = Arc::clone(&bus);
        let slot_ref = Arc::clone(&slot);
        let id = bus.add_listener(Arc::new(move |_: &StorageEvent| {
            if let Some(id) = *slot_ref.lock().unwrap() {
                bus_ref.remove_listener(id);
            }
        }));
        *slot.lock().unwrap() = Some(id);

        bus.emit(&event(StorageEventKind::Set));
        assert_eq!(bus.listener_count(), 0);
    }
}

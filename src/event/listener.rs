use std::sync::{Arc, Mutex, RwLock, Weak};

use dashmap::DashMap;

use super::{event::Event, payload::EventType};

/// Observer of events fanned out by an agent.
pub trait EventListener: Send + Sync {
    fn on(&self, event: &Event);
}

impl<F> EventListener for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on(&self, event: &Event) {
        self(event)
    }
}

pub fn listener_fn<F>(f: F) -> Arc<dyn EventListener>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Forwards to a listener without keeping it alive.
pub struct WeakListener {
    target: Weak<dyn EventListener>,
}

impl WeakListener {
    pub fn new(target: Weak<dyn EventListener>) -> Self {
        Self { target }
    }

    pub fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }
}

impl EventListener for WeakListener {
    fn on(&self, event: &Event) {
        if let Some(target) = self.target.upgrade() {
            target.on(event);
        }
    }
}

/// Listener that keeps every event it receives.
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<Event>>,
}

impl EventRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn of_type(&self, event_type: &EventType) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.is(event_type))
            .collect()
    }

    pub fn count(&self, event_type: &EventType) -> usize {
        self.of_type(event_type).len()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventListener for EventRecorder {
    fn on(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Per-type and global listeners of one agent. Registration is additive.
#[derive(Default)]
pub struct ListenerIndex {
    by_type: DashMap<EventType, Vec<Arc<dyn EventListener>>>,
    global: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl ListenerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn EventListener>) {
        if let Ok(mut global) = self.global.write() {
            global.push(listener);
        }
    }

    pub fn add_for(&self, event_type: EventType, listener: Arc<dyn EventListener>) {
        self.by_type.entry(event_type).or_default().push(listener);
    }

    /// Notifies type-specific listeners, then global ones. Both lists are
    /// snapshotted first so listeners may register more listeners.
    pub fn dispatch(&self, event: &Event) {
        let scoped: Vec<Arc<dyn EventListener>> = self
            .by_type
            .get(&event.event_type())
            .map(|listeners| listeners.clone())
            .unwrap_or_default();
        let global: Vec<Arc<dyn EventListener>> = self
            .global
            .read()
            .map(|listeners| listeners.clone())
            .unwrap_or_default();

        for listener in scoped.iter().chain(global.iter()) {
            listener.on(event);
        }
    }

    pub fn global_count(&self) -> usize {
        self.global.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn count_for(&self, event_type: &EventType) -> usize {
        self.by_type.get(event_type).map(|l| l.len()).unwrap_or(0)
    }
}

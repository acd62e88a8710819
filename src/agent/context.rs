use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock, RwLock, Weak,
};

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::{
    config::AgentConfig,
    event::{Event, EventListener, EventType, ListenerIndex, SourceRef, WeakListener},
    id::AgentId,
};

use super::{
    queues::{tier_queues, TierInbox, TierQueues},
    AgentState, RuntimeAgent,
};

pub(crate) type IngressFilter = Box<dyn Fn(&str, &Event) -> bool + Send + Sync>;

/// State shared between an agent's handle, its processing task and every
/// producer holding a listener to it.
pub(crate) struct AgentShared {
    pub(crate) id: AgentId,
    pub(crate) name: RwLock<String>,
    pub(crate) kind: String,
    pub(crate) active: AtomicBool,
    pub(crate) accepting: AtomicBool,
    pub(crate) queues: TierQueues,
    pub(crate) listeners: ListenerIndex,
    pub(crate) state: watch::Sender<AgentState>,
    pub(crate) ingress_filter: OnceLock<IngressFilter>,
    pub(crate) children: DashMap<String, Arc<dyn RuntimeAgent>>,
    pub(crate) config: AgentConfig,
}

impl AgentShared {
    pub(crate) fn new(name: &str, kind: &str, config: AgentConfig) -> (Self, TierInbox) {
        let (queues, inbox) = tier_queues();
        let (state, _) = watch::channel(AgentState::Created);
        let shared = Self {
            id: AgentId::new(),
            name: RwLock::new(name.to_string()),
            kind: kind.to_string(),
            active: AtomicBool::new(true),
            accepting: AtomicBool::new(false),
            queues,
            listeners: ListenerIndex::new(),
            state,
            ingress_filter: OnceLock::new(),
            children: DashMap::new(),
            config,
        };
        (shared, inbox)
    }
}

impl EventListener for AgentShared {
    fn on(&self, event: &Event) {
        AgentContext::ingress_into(self, event.clone());
    }
}

/// Handle to an agent's shared state, given to behaviors and rules.
#[derive(Clone)]
pub struct AgentContext {
    pub(crate) shared: Arc<AgentShared>,
}

impl AgentContext {
    pub(crate) fn new(shared: Arc<AgentShared>) -> Self {
        Self { shared }
    }

    /// A context that belongs to no running agent. Triggering still reaches
    /// its listeners; ingress is refused.
    pub fn detached(name: &str) -> Self {
        let (shared, _inbox) = AgentShared::new(name, "Detached", AgentConfig::default());
        Self::new(Arc::new(shared))
    }

    pub fn id(&self) -> AgentId {
        self.shared.id
    }

    pub fn name(&self) -> String {
        self.shared
            .name
            .read()
            .map(|name| name.clone())
            .unwrap_or_default()
    }

    pub fn set_name(&self, name: &str) {
        if let Ok(mut current) = self.shared.name.write() {
            *current = name.to_string();
        }
    }

    pub fn kind(&self) -> &str {
        &self.shared.kind
    }

    pub fn config(&self) -> &AgentConfig {
        &self.shared.config
    }

    pub fn source_ref(&self) -> SourceRef {
        SourceRef::new(self.id(), self.name())
    }

    pub fn state(&self) -> AgentState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AgentState> {
        self.shared.state.subscribe()
    }

    pub(crate) fn is_running(&self) -> bool {
        matches!(*self.shared.state.borrow(), AgentState::Running)
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Deactivating discards every queued, undispatched event. Reactivation
    /// starts from empty queues.
    pub fn set_active(&self, active: bool) {
        let was_active = self.shared.active.swap(active, Ordering::SeqCst);
        if was_active && !active {
            self.shared.queues.invalidate();
        }
        if was_active != active {
            debug!(agent = %self.name(), active, "Activation changed");
        }
    }

    /// Whether ingress currently accepts events.
    pub fn is_accepting(&self) -> bool {
        self.shared.accepting.load(Ordering::SeqCst) && self.is_active()
    }

    /// Queues an event for this agent. Returns false if it was discarded.
    pub fn ingress(&self, event: Event) -> bool {
        Self::ingress_into(&self.shared, event)
    }

    fn ingress_into(shared: &AgentShared, event: Event) -> bool {
        let generation = shared.queues.generation();
        if !shared.active.load(Ordering::SeqCst) || !shared.accepting.load(Ordering::SeqCst) {
            trace!(event_type = %event.event_type(), "Ingress refused");
            return false;
        }
        if let Some(filter) = shared.ingress_filter.get() {
            let name = shared.name.read().map(|n| n.clone()).unwrap_or_default();
            if !filter(&name, &event) {
                trace!(agent = %name, event_type = %event.event_type(), "Ingress filtered");
                return false;
            }
        }
        shared.queues.push(generation, event)
    }

    /// Fans an event out to this agent's listeners. The event's source is
    /// set to this agent when absent. Inactive agents trigger nothing.
    pub fn trigger(&self, mut event: Event) {
        if !self.is_active() {
            return;
        }
        event.fill_source(|| self.source_ref());
        self.shared.listeners.dispatch(&event);
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.shared.listeners.add(listener);
    }

    pub fn add_listener_for_event_type(
        &self,
        event_type: EventType,
        listener: Arc<dyn EventListener>,
    ) {
        self.shared.listeners.add_for(event_type, listener);
    }

    /// A listener that ingests into this agent without keeping it alive.
    pub fn listener(&self) -> Arc<dyn EventListener> {
        let shared: Arc<dyn EventListener> = self.shared.clone();
        let weak: Weak<dyn EventListener> = Arc::downgrade(&shared);
        Arc::new(WeakListener::new(weak))
    }

    /// Requests graceful termination. A never started agent stops at once.
    pub fn stop(&self) {
        let changed = self.shared.state.send_if_modified(|state| match state {
            AgentState::Created => {
                *state = AgentState::Stopped;
                true
            }
            AgentState::Running => {
                *state = AgentState::Stopping;
                true
            }
            _ => false,
        });
        self.shared.accepting.store(false, Ordering::SeqCst);
        if changed {
            debug!(agent = %self.name(), "Stop requested");
        }
    }

    pub fn children(&self) -> Vec<Arc<dyn RuntimeAgent>> {
        self.shared
            .children
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("state", &self.state())
            .finish()
    }
}

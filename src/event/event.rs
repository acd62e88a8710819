use crate::{
    id::{AgentId, EventId},
    timestamp::Timestamp,
};

use super::{
    payload::{EventPayload, EventType},
    priority::EventPriority,
};

/// Non-owning reference to the agent an event originates from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    pub id: AgentId,
    pub name: String,
}

impl SourceRef {
    pub fn new(id: AgentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A fact that occurred, with its tier, occurrence time and optional source.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    id: EventId,
    name: Option<String>,
    payload: EventPayload,
    priority: EventPriority,
    occurred_at: Timestamp,
    source: Option<SourceRef>,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        let priority = payload.default_priority();
        Self {
            id: EventId::new(),
            name: None,
            payload,
            priority,
            occurred_at: Timestamp::now(),
            source: None,
        }
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self::new(EventPayload::custom(name))
    }

    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: Timestamp) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Used by the wire codec to keep the id of a remote event.
    pub(crate) fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn is(&self, event_type: &EventType) -> bool {
        self.event_type() == *event_type
    }

    pub fn priority(&self) -> EventPriority {
        self.priority
    }

    pub fn set_priority(&mut self, priority: EventPriority) {
        self.priority = priority;
    }

    pub fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }

    pub fn set_occurred_at(&mut self, occurred_at: Timestamp) {
        self.occurred_at = occurred_at;
    }

    pub fn source(&self) -> Option<&SourceRef> {
        self.source.as_ref()
    }

    /// Sets the source if none is present. Returns whether it was filled.
    pub fn fill_source(&mut self, source: impl FnOnce() -> SourceRef) -> bool {
        if self.source.is_some() {
            return false;
        }
        self.source = Some(source());
        true
    }
}

impl From<EventPayload> for Event {
    fn from(payload: EventPayload) -> Self {
        Event::new(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_defaults() {
        let event = Event::custom("Ping");
        assert_eq!(event.priority(), EventPriority::Medium);
        assert_eq!(event.event_type(), EventType::custom("Ping"));
        assert!(event.source().is_none());
        assert!(event.name().is_none());
        assert!(event.occurred_at().elapsed().unwrap().as_secs() < 1);
    }

    #[test]
    fn test_ids_differ() {
        assert_ne!(Event::custom("A").id(), Event::custom("A").id());
    }

    #[test]
    fn test_lifecycle_events_are_very_high() {
        assert_eq!(
            Event::new(EventPayload::Started).priority(),
            EventPriority::VeryHigh
        );
    }

    #[test]
    fn test_explicit_priority() {
        let event = Event::custom("Ping").with_priority(EventPriority::Low);
        assert_eq!(event.priority(), EventPriority::Low);
    }

    #[test]
    fn test_fill_source_once() {
        let first = SourceRef::new(AgentId::new(), "first");
        let second = SourceRef::new(AgentId::new(), "second");
        let mut event = Event::custom("Ping");
        assert!(event.fill_source(|| first.clone()));
        assert!(!event.fill_source(|| second.clone()));
        assert_eq!(event.source(), Some(&first));
    }

    #[test]
    fn test_occurred_at_override() {
        let event = Event::custom("Ping").with_occurred_at(Timestamp::from_millis(42));
        assert_eq!(event.occurred_at().as_millis(), 42);
    }
}

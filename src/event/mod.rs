//! Events, their priority tiers and the listener fan-out.

#[allow(clippy::module_inception)]
mod event;
pub mod listener;
pub mod payload;
pub mod priority;

pub use event::{Event, SourceRef};
pub use listener::{listener_fn, EventListener, EventRecorder, ListenerIndex, WeakListener};
pub use payload::{DistanceUnit, EventPayload, EventType};
pub use priority::EventPriority;

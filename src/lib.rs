//! # robo: event-driven agent engine
//!
//! Agents react to prioritized events with rules and publish what the rules
//! produce to their listeners. Agents nest into components, forming a tree
//! that starts and stops as a unit.
//!
//! ## Events
//!
//! The [`event`] module defines the [`Event`] value, its five urgency tiers
//! ([`EventPriority`]), the built-in payloads ([`EventPayload`]) and the
//! [`EventListener`] capability used to deliver events.
//!
//! ## Agents
//!
//! An [`Agent`] owns one processing task. Each cycle drains its queues from
//! the most to the least urgent tier, runs the [`rule`]s registered for each
//! event type and fans the results out to listeners. Custom state and
//! lifecycle hooks are supplied through [`AgentBehavior`].
//!
//! ```text
//! ingress ──▶ tier queues ──▶ cycle: drain ▶ rules ▶ fan-out ──▶ listeners
//! ```
//!
//! ## Components
//!
//! A [`Component`] is an agent with named children ([`component`]). Starting
//! or stopping it cascades to the children, and it can subscribe to their
//! output automatically.
//!
//! ## Around the engine
//!
//! - Periodic time events ([`native_feature`])
//! - Relay and distance sensor agents ([`devices`])
//! - Key-value message form ([`wire`]) and remote bridges ([`transport`])
//! - JSON configuration ([`config`]) and log setup ([`logging`])

pub mod agent;
pub mod component;
pub mod config;
pub mod devices;
pub mod error;
pub mod event;
pub mod id;
pub mod logging;
pub mod native_feature;
pub mod rule;
pub mod timestamp;
pub mod transport;
pub mod wire;

// Re-exports
pub use agent::{Agent, AgentBehavior, AgentContext, AgentError, AgentResult, AgentState, RuntimeAgent};
pub use component::{Component, NamePolicy, SequentialNames};
pub use error::*;
pub use event::*;
pub use id::{AgentId, EventId};
pub use rule::{Rule, RuleContext, RuleError, RuleResult, SimpleRule};

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

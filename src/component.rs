//! Agents that own named children and cascade their lifecycle to them.

use std::{any::Any, ops::Deref, sync::Arc};

use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, info};

use crate::{
    agent::{wait_terminated, Agent, AgentBehavior, AgentContext, AgentError, AgentResult, RuntimeAgent},
    config::AgentConfig,
};

/// Produces names for children added without one.
pub trait NamePolicy: Send + Sync {
    fn next_name(&self, kind: &str) -> String;
}

/// `"{kind}_{n}"`, counted per kind and per policy instance.
#[derive(Default)]
pub struct SequentialNames {
    counters: DashMap<String, usize>,
}

impl SequentialNames {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NamePolicy for SequentialNames {
    fn next_name(&self, kind: &str) -> String {
        let mut counter = self.counters.entry(kind.to_string()).or_insert(0);
        *counter += 1;
        format!("{}_{}", kind, *counter)
    }
}

/// An agent with a name-keyed set of children.
///
/// Starting the component starts every child right after the component's own
/// `on_started`; stopping it stops every child right after `on_stopped`.
/// Each child runs on its own task.
pub struct Component<B: AgentBehavior> {
    agent: Agent<B>,
    names: Box<dyn NamePolicy>,
}

impl<B: AgentBehavior> Component<B> {
    pub fn new(name: &str, behavior: B) -> Self {
        Self::from_agent(Agent::new(name, behavior))
    }

    pub fn with_config(name: &str, behavior: B, config: AgentConfig) -> Self {
        Self::from_agent(Agent::with_config(name, behavior, config))
    }

    pub fn from_agent(agent: Agent<B>) -> Self {
        Self {
            agent,
            names: Box::new(SequentialNames::new()),
        }
    }

    pub fn with_name_policy(mut self, names: impl NamePolicy + 'static) -> Self {
        self.names = Box::new(names);
        self
    }

    pub fn agent(&self) -> &Agent<B> {
        &self.agent
    }

    /// Registers `child` under its name, replacing any child with the same
    /// name. Unnamed children get one from the name policy. With
    /// `auto_listen` this component listens to every event of the child.
    /// Returns the name used.
    pub fn add_component(&self, child: Arc<dyn RuntimeAgent>, auto_listen: bool) -> String {
        let mut name = child.name();
        if name.is_empty() {
            name = self.names.next_name(&child.kind());
            child.set_name(&name);
        }
        if auto_listen {
            child.add_listener(self.agent.listener());
        }
        let ctx = self.agent.context();
        if ctx.shared.children.insert(name.clone(), child).is_some() {
            debug!(component = %ctx.name(), child = %name, "Child replaced");
        } else {
            debug!(component = %ctx.name(), child = %name, auto_listen, "Child added");
        }
        name
    }

    /// Looks up a direct child.
    pub fn get_component_by_name(&self, name: &str) -> Option<Arc<dyn RuntimeAgent>> {
        self.agent
            .context()
            .shared
            .children
            .get(name)
            .map(|child| child.value().clone())
    }

    /// Looks up a direct child of a known concrete type.
    pub fn get_component<T: RuntimeAgent>(&self, name: &str) -> Option<Arc<T>> {
        self.get_component_by_name(name)?
            .into_any()
            .downcast::<T>()
            .ok()
    }

    pub fn component_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .agent
            .context()
            .shared
            .children
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn children(&self) -> Vec<Arc<dyn RuntimeAgent>> {
        self.agent.context().children()
    }

    /// Stops the component and waits for it and every direct child to
    /// terminate within the configured timeout.
    pub async fn shutdown(&self) -> AgentResult<()> {
        let own = self.agent.shutdown().await;
        let timeout = self.agent.context().config().shutdown_timeout;
        let children = self.children();
        for child in &children {
            child.stop();
        }
        let waits = children
            .iter()
            .map(|child| wait_terminated(child.subscribe_state()));
        let results = tokio::time::timeout(timeout, join_all(waits))
            .await
            .map_err(|_| AgentError::ShutdownTimeout {
                agent: self.agent.name(),
                timeout,
            })?;
        info!(component = %self.agent.name(), children = results.len(), "Component shut down");
        own?;
        results.into_iter().collect()
    }
}

impl<B: AgentBehavior> Deref for Component<B> {
    type Target = Agent<B>;

    fn deref(&self) -> &Self::Target {
        &self.agent
    }
}

impl<B: AgentBehavior> RuntimeAgent for Component<B> {
    fn context(&self) -> &AgentContext {
        self.agent.context()
    }

    fn start(&self) -> AgentResult<()> {
        self.agent.start()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::agent::AgentState;

    #[test]
    fn test_sequential_names_per_kind() {
        let names = SequentialNames::new();
        assert_eq!(names.next_name("Relay"), "Relay_1");
        assert_eq!(names.next_name("Relay"), "Relay_2");
        assert_eq!(names.next_name("Sensor"), "Sensor_1");
        assert_eq!(SequentialNames::new().next_name("Relay"), "Relay_1");
    }

    #[test]
    fn test_unnamed_child_gets_generated_name() {
        let parent = Component::new("root", ());
        let child: Arc<dyn RuntimeAgent> = Arc::new(Agent::new("", ()));
        let name = parent.add_component(child.clone(), true);
        assert_eq!(name, "Agent_1");
        assert_eq!(child.name(), "Agent_1");
    }

    #[test]
    fn test_same_name_overwrites() {
        let parent = Component::new("root", ());
        let first = Arc::new(Agent::new("probe", ()));
        let second = Arc::new(Agent::new("probe", ()));
        parent.add_component(first.clone(), false);
        parent.add_component(second.clone(), false);

        assert_eq!(parent.component_names(), vec!["probe"]);
        let found = parent.get_component::<Agent<()>>("probe").unwrap();
        assert_eq!(found.id(), second.id());
    }

    #[test]
    fn test_typed_lookup_rejects_wrong_type() {
        let parent = Component::new("root", ());
        parent.add_component(Arc::new(Agent::new("leaf", ())), false);
        assert!(parent.get_component::<Component<()>>("leaf").is_none());
        assert!(parent.get_component::<Agent<()>>("leaf").is_some());
        assert!(parent.get_component_by_name("missing").is_none());
    }

    #[test]
    fn test_stop_before_start_leaves_children_untouched() {
        let parent = Component::new("root", ());
        let child = Arc::new(Agent::new("leaf", ()));
        parent.add_component(child.clone(), true);
        parent.stop();
        assert_eq!(parent.state(), AgentState::Stopped);
        assert_eq!(child.state(), AgentState::Created);
    }
}

//! The agent runtime: per-tier queues drained by one processing task per
//! agent, rules matched by event type, and listener fan-out of the results.

mod context;
mod queues;
mod worker;

use std::{
    any::Any,
    sync::{atomic::Ordering, Arc, Mutex},
    time::Duration,
};

use thiserror::Error;
use tokio::{runtime::Handle, sync::watch};
use tracing::{debug, warn};

use crate::{
    config::AgentConfig,
    devices::DeviceError,
    event::{Event, EventListener, EventType},
    id::AgentId,
    rule::{Rule, RuleError, RuleIndex},
};

pub use context::AgentContext;
use context::AgentShared;
use worker::{AgentCore, Worker};

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("no tokio runtime available to run the agent")]
    NoRuntime,
    #[error("agent state lock poisoned")]
    Poisoned,
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
    #[error("{message}")]
    Behavior { message: String },
    #[error("agent panicked: {message}")]
    Panicked { message: String },
    #[error("agent {agent} did not stop within {timeout:?}")]
    ShutdownTimeout { agent: String, timeout: Duration },
    #[error("agent terminated abnormally: {reason}")]
    Terminated { reason: String },
}

impl AgentError {
    pub fn behavior(message: impl Into<String>) -> Self {
        AgentError::Behavior {
            message: message.into(),
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Lifecycle of an agent. `Stopped` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentState {
    Created,
    Running,
    Stopping,
    Stopped,
    Failed { reason: String },
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Stopped | AgentState::Failed { .. })
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Created => f.write_str("Created"),
            AgentState::Running => f.write_str("Running"),
            AgentState::Stopping => f.write_str("Stopping"),
            AgentState::Stopped => f.write_str("Stopped"),
            AgentState::Failed { reason } => write!(f, "Failed: {}", reason),
        }
    }
}

/// Extension points of an agent. Every hook runs on the agent's own task
/// with exclusive access to the behavior state.
///
/// Errors returned from any hook are fatal to the agent.
pub trait AgentBehavior: Send + 'static {
    /// Used for generated names.
    fn kind(&self) -> &str {
        "Agent"
    }

    fn initialize(&mut self, _ctx: &AgentContext) -> AgentResult<()> {
        Ok(())
    }

    /// Runs once before the first cycle and before `Started` is broadcast.
    fn on_started(&mut self, _ctx: &AgentContext) -> AgentResult<()> {
        Ok(())
    }

    /// Runs once after the last cycle and before `Stopped` is broadcast.
    fn on_stopped(&mut self, _ctx: &AgentContext) -> AgentResult<()> {
        Ok(())
    }

    fn on_cycle_starts(&mut self, _ctx: &AgentContext) -> AgentResult<()> {
        Ok(())
    }

    fn on_cycle_ends(&mut self, _ctx: &AgentContext) -> AgentResult<()> {
        Ok(())
    }
}

impl AgentBehavior for () {}

/// Object-safe view of any agent or component, used for children and by
/// collaborators that address agents without knowing their behavior type.
pub trait RuntimeAgent: Send + Sync + 'static {
    fn context(&self) -> &AgentContext;

    /// Spawns the processing task unless one was already spawned.
    fn start(&self) -> AgentResult<()>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn id(&self) -> AgentId {
        self.context().id()
    }

    fn name(&self) -> String {
        self.context().name()
    }

    fn set_name(&self, name: &str) {
        self.context().set_name(name)
    }

    fn kind(&self) -> String {
        self.context().kind().to_string()
    }

    fn stop(&self) {
        self.context().stop()
    }

    fn state(&self) -> AgentState {
        self.context().state()
    }

    fn subscribe_state(&self) -> watch::Receiver<AgentState> {
        self.context().subscribe_state()
    }

    fn is_active(&self) -> bool {
        self.context().is_active()
    }

    fn set_active(&self, active: bool) {
        self.context().set_active(active)
    }

    /// Ingress. Returns false when the event was discarded.
    fn on(&self, event: Event) -> bool {
        self.context().ingress(event)
    }

    fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.context().add_listener(listener)
    }

    fn add_listener_for_event_type(&self, event_type: EventType, listener: Arc<dyn EventListener>) {
        self.context().add_listener_for_event_type(event_type, listener)
    }

    fn listener(&self) -> Arc<dyn EventListener> {
        self.context().listener()
    }
}

pub(crate) type StagedRules<B> = Arc<Mutex<Vec<Box<dyn Rule<B>>>>>;

/// An agent whose behavior state is `B`.
pub struct Agent<B: AgentBehavior> {
    ctx: AgentContext,
    core: Arc<Mutex<AgentCore<B>>>,
    staged: StagedRules<B>,
}

impl<B: AgentBehavior> Agent<B> {
    pub fn new(name: &str, behavior: B) -> Self {
        Self::with_config(name, behavior, AgentConfig::default())
    }

    pub fn with_config(name: &str, behavior: B, config: AgentConfig) -> Self {
        let (shared, inbox) = AgentShared::new(name, behavior.kind(), config);
        Self {
            ctx: AgentContext::new(Arc::new(shared)),
            core: Arc::new(Mutex::new(AgentCore {
                behavior,
                rules: RuleIndex::new(),
                inbox,
            })),
            staged: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Only events the filter accepts are queued. The filter gets the
    /// agent's current name.
    pub fn with_ingress_filter<F>(self, filter: F) -> Self
    where
        F: Fn(&str, &Event) -> bool + Send + Sync + 'static,
    {
        if self.ctx.shared.ingress_filter.set(Box::new(filter)).is_err() {
            warn!(agent = %self.ctx.name(), "Ingress filter already set");
        }
        self
    }

    /// Registers a rule. It is initialized on the agent's task before it
    /// sees any event.
    pub fn add_rule<R>(&self, rule: R) -> AgentResult<()>
    where
        R: Rule<B> + 'static,
    {
        self.add_boxed_rule(Box::new(rule))
    }

    pub fn add_boxed_rule(&self, rule: Box<dyn Rule<B>>) -> AgentResult<()> {
        debug!(agent = %self.ctx.name(), rule = rule.name(), "Rule staged");
        self.staged
            .lock()
            .map_err(|_| AgentError::Poisoned)?
            .push(rule);
        Ok(())
    }

    /// Reads the behavior state.
    ///
    /// # Blocking
    ///
    /// Takes the lock the processing task holds for a whole cycle, fan-out
    /// included, so the calling thread blocks until the cycle ends. From async
    /// code on a multi-thread runtime prefer [`Agent::inspect_async`].
    pub fn inspect<R>(&self, f: impl FnOnce(&B) -> R) -> AgentResult<R> {
        let core = self.core.lock().map_err(|_| AgentError::Poisoned)?;
        Ok(f(&core.behavior))
    }

    /// Reads the behavior state on the blocking pool, leaving the async
    /// worker thread free while a cycle is in progress.
    pub async fn inspect_async<R, F>(&self, f: F) -> AgentResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&B) -> R + Send + 'static,
    {
        let core = self.core.clone();
        tokio::task::spawn_blocking(move || {
            let core = core.lock().map_err(|_| AgentError::Poisoned)?;
            Ok(f(&core.behavior))
        })
        .await
        .map_err(|e| AgentError::Panicked {
            message: e.to_string(),
        })?
    }

    pub fn rule_count(&self) -> AgentResult<usize> {
        let core = self.core.lock().map_err(|_| AgentError::Poisoned)?;
        Ok(core.rules.len())
    }

    /// Waits until the agent reaches a terminal state.
    pub async fn join(&self) -> AgentResult<()> {
        wait_terminated(self.ctx.subscribe_state()).await
    }

    /// Stops the agent and waits for it within the configured timeout.
    pub async fn shutdown(&self) -> AgentResult<()> {
        self.stop();
        let timeout = self.ctx.config().shutdown_timeout;
        tokio::time::timeout(timeout, self.join())
            .await
            .map_err(|_| AgentError::ShutdownTimeout {
                agent: self.ctx.name(),
                timeout,
            })?
    }
}

pub(crate) async fn wait_terminated(mut state: watch::Receiver<AgentState>) -> AgentResult<()> {
    let terminal = state
        .wait_for(AgentState::is_terminal)
        .await
        .map_err(|_| AgentError::Terminated {
            reason: "state channel closed".to_string(),
        })?
        .clone();
    match terminal {
        AgentState::Failed { reason } => Err(AgentError::Terminated { reason }),
        _ => Ok(()),
    }
}

impl<B: AgentBehavior> RuntimeAgent for Agent<B> {
    fn context(&self) -> &AgentContext {
        &self.ctx
    }

    fn start(&self) -> AgentResult<()> {
        let handle = Handle::try_current().map_err(|_| AgentError::NoRuntime)?;
        let accepting = &self.ctx.shared.accepting;
        // Opened under the state lock so a concurrent stop() closes it after.
        let launched = self.ctx.shared.state.send_if_modified(|state| {
            if *state == AgentState::Created {
                *state = AgentState::Running;
                accepting.store(true, Ordering::SeqCst);
                true
            } else {
                false
            }
        });
        if !launched {
            debug!(agent = %self.ctx.name(), state = %self.ctx.state(), "Start ignored");
            return Ok(());
        }

        let worker = Worker {
            ctx: self.ctx.clone(),
            core: self.core.clone(),
            staged: self.staged.clone(),
        };
        handle.spawn(worker.run());
        Ok(())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventRecorder;

    #[test]
    fn test_start_without_runtime() {
        let agent = Agent::new("orphan", ());
        assert!(matches!(agent.start(), Err(AgentError::NoRuntime)));
        assert_eq!(agent.state(), AgentState::Created);
    }

    #[test]
    fn test_new_agent_is_active_and_dormant() {
        let agent = Agent::new("dormant", ());
        assert!(agent.is_active());
        assert_eq!(agent.state(), AgentState::Created);
        assert_eq!(agent.kind(), "Agent");
        assert!(!agent.on(Event::custom("Ping")));
    }

    #[tokio::test]
    async fn test_started_and_stopped_broadcast() {
        let agent = Agent::new("lifecycle", ());
        let recorder = EventRecorder::new();
        agent.add_listener(recorder.clone());

        agent.start().unwrap();
        agent.shutdown().await.unwrap();

        let types: Vec<EventType> = recorder.events().iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec![EventType::Started, EventType::Stopped]);
        assert_eq!(agent.state(), AgentState::Stopped);
        let started = &recorder.events()[0];
        assert_eq!(started.source().unwrap().name, "lifecycle");
    }

    #[tokio::test]
    async fn test_join_reports_failure() {
        struct Broken;
        impl AgentBehavior for Broken {
            fn initialize(&mut self, _ctx: &AgentContext) -> AgentResult<()> {
                Err(AgentError::behavior("no hardware"))
            }
        }

        let agent = Agent::new("broken", Broken);
        agent.start().unwrap();
        let err = agent.join().await.unwrap_err();
        assert!(matches!(err, AgentError::Terminated { ref reason } if reason == "no hardware"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_racing_start_closes_ingress() {
        let handle = Handle::current();
        for _ in 0..200 {
            let agent = Arc::new(Agent::new("racer", ()));
            let starter = {
                let agent = agent.clone();
                let handle = handle.clone();
                std::thread::spawn(move || {
                    let _guard = handle.enter();
                    agent.start().unwrap();
                })
            };
            agent.stop();
            starter.join().unwrap();

            assert_ne!(agent.state(), AgentState::Running);
            assert!(!agent.context().is_accepting());
            assert!(!agent.on(Event::custom("Late")));
            agent.join().await.unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_inspect_async_reads_running_agent() {
        #[derive(Default)]
        struct Counter(u32);
        impl AgentBehavior for Counter {}

        let agent = Agent::new("counter", Counter::default());
        agent
            .add_rule(
                crate::rule::SimpleRule::<Counter>::on(EventType::custom("Bump")).always(|cx| {
                    cx.agent.0 += 1;
                    Ok(Vec::new())
                }),
            )
            .unwrap();
        agent.start().unwrap();
        for _ in 0..3 {
            agent.on(Event::custom("Bump"));
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        let mut seen = 0;
        while seen < 3 && tokio::time::Instant::now() < deadline {
            seen = agent.inspect_async(|c| c.0).await.unwrap();
            tokio::task::yield_now().await;
        }
        assert_eq!(seen, 3);
        agent.shutdown().await.unwrap();
    }

    #[test]
    fn test_state_display() {
        assert_eq!(AgentState::Running.to_string(), "Running");
        assert_eq!(
            AgentState::Failed {
                reason: "boom".into()
            }
            .to_string(),
            "Failed: boom"
        );
    }
}

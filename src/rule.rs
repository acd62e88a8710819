//! Reactive rules bound to one event type.
//!
//! A rule runs on its owning agent's task and gets exclusive access to the
//! agent's behavior state while it executes, so actions can mutate that state
//! without extra locking.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, error};

use crate::{
    agent::AgentContext,
    event::{Event, EventType},
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("rule {rule} failed to initialize: {message}")]
    Initialization { rule: String, message: String },
    #[error("rule {rule} failed: {message}")]
    Execution { rule: String, message: String },
}

impl RuleError {
    pub fn initialization(rule: impl Into<String>, message: impl Into<String>) -> Self {
        RuleError::Initialization {
            rule: rule.into(),
            message: message.into(),
        }
    }

    pub fn execution(rule: impl Into<String>, message: impl Into<String>) -> Self {
        RuleError::Execution {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

pub type RuleResult<T> = Result<T, RuleError>;

/// What a rule sees while it executes.
pub struct RuleContext<'a, B> {
    /// Behavior state of the owning agent.
    pub agent: &'a mut B,
    /// The event that triggered this execution.
    pub event: &'a Event,
    pub ctx: &'a AgentContext,
}

/// Reactive logic owned by an agent whose behavior is `B`.
///
/// `execute` runs the do actions, then the then or else actions depending on
/// `check_condition`, and returns every produced event in order. Override it
/// to replace that model entirely.
pub trait Rule<B>: Send {
    fn name(&self) -> &str;

    /// Read once when the rule is registered.
    fn triggering_event_type(&self) -> EventType;

    /// Called once on the agent's task, after the agent initialized and
    /// before the rule sees its first event.
    fn initialize(&mut self, _agent: &mut B) -> RuleResult<()> {
        Ok(())
    }

    fn do_actions(&mut self, _cx: &mut RuleContext<'_, B>) -> RuleResult<Vec<Event>> {
        Ok(Vec::new())
    }

    fn check_condition(&self, _cx: &RuleContext<'_, B>) -> RuleResult<bool> {
        Ok(true)
    }

    fn then_actions(&mut self, _cx: &mut RuleContext<'_, B>) -> RuleResult<Vec<Event>> {
        Ok(Vec::new())
    }

    fn else_actions(&mut self, _cx: &mut RuleContext<'_, B>) -> RuleResult<Vec<Event>> {
        Ok(Vec::new())
    }

    fn execute(&mut self, cx: &mut RuleContext<'_, B>) -> RuleResult<Vec<Event>> {
        let mut events = self.do_actions(cx)?;
        if self.check_condition(cx)? {
            events.extend(self.then_actions(cx)?);
        } else {
            events.extend(self.else_actions(cx)?);
        }
        Ok(events)
    }
}

type Action<B> = Box<dyn FnMut(&mut RuleContext<'_, B>) -> RuleResult<Vec<Event>> + Send>;
type Condition<B> = Box<dyn Fn(&RuleContext<'_, B>) -> bool + Send>;
type Initializer<B> = Box<dyn FnMut(&mut B) -> RuleResult<()> + Send>;

/// Rule assembled from closures.
///
/// ```ignore
/// let rule = SimpleRule::<()>::on(EventType::custom("Ping"))
///     .then(|_cx| Ok(vec![Event::custom("Pong")]));
/// ```
pub struct SimpleRule<B> {
    name: String,
    event_type: EventType,
    init: Option<Initializer<B>>,
    always: Option<Action<B>>,
    condition: Option<Condition<B>>,
    then: Option<Action<B>>,
    otherwise: Option<Action<B>>,
}

impl<B> SimpleRule<B> {
    pub fn on(event_type: EventType) -> Self {
        Self {
            name: format!("on_{}", event_type),
            event_type,
            init: None,
            always: None,
            condition: None,
            then: None,
            otherwise: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn init<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut B) -> RuleResult<()> + Send + 'static,
    {
        self.init = Some(Box::new(f));
        self
    }

    pub fn always<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut RuleContext<'_, B>) -> RuleResult<Vec<Event>> + Send + 'static,
    {
        self.always = Some(Box::new(f));
        self
    }

    pub fn when<F>(mut self, f: F) -> Self
    where
        F: Fn(&RuleContext<'_, B>) -> bool + Send + 'static,
    {
        self.condition = Some(Box::new(f));
        self
    }

    pub fn then<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut RuleContext<'_, B>) -> RuleResult<Vec<Event>> + Send + 'static,
    {
        self.then = Some(Box::new(f));
        self
    }

    pub fn otherwise<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut RuleContext<'_, B>) -> RuleResult<Vec<Event>> + Send + 'static,
    {
        self.otherwise = Some(Box::new(f));
        self
    }
}

fn run_action<B>(
    action: &mut Option<Action<B>>,
    cx: &mut RuleContext<'_, B>,
) -> RuleResult<Vec<Event>> {
    match action {
        Some(action) => action(cx),
        None => Ok(Vec::new()),
    }
}

impl<B> Rule<B> for SimpleRule<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn triggering_event_type(&self) -> EventType {
        self.event_type.clone()
    }

    fn initialize(&mut self, agent: &mut B) -> RuleResult<()> {
        match self.init.as_mut() {
            Some(init) => init(agent),
            None => Ok(()),
        }
    }

    fn do_actions(&mut self, cx: &mut RuleContext<'_, B>) -> RuleResult<Vec<Event>> {
        run_action(&mut self.always, cx)
    }

    fn check_condition(&self, cx: &RuleContext<'_, B>) -> RuleResult<bool> {
        Ok(self.condition.as_ref().map_or(true, |condition| condition(cx)))
    }

    fn then_actions(&mut self, cx: &mut RuleContext<'_, B>) -> RuleResult<Vec<Event>> {
        run_action(&mut self.then, cx)
    }

    fn else_actions(&mut self, cx: &mut RuleContext<'_, B>) -> RuleResult<Vec<Event>> {
        run_action(&mut self.otherwise, cx)
    }
}

/// Rules of one agent, keyed by triggering event type.
///
/// Newly added rules wait in a staging list until the owning task activates
/// them, which is where `Rule::initialize` runs.
pub struct RuleIndex<B> {
    rules: Vec<Box<dyn Rule<B>>>,
    by_type: HashMap<EventType, Vec<usize>>,
}

impl<B> Default for RuleIndex<B> {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            by_type: HashMap::new(),
        }
    }
}

impl<B> RuleIndex<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes each staged rule and indexes the ones that succeed.
    /// A failing rule is logged and dropped. Returns how many were activated.
    pub fn activate(&mut self, staged: Vec<Box<dyn Rule<B>>>, agent: &mut B, owner: &str) -> usize {
        let mut activated = 0;
        for mut rule in staged {
            if let Err(e) = rule.initialize(agent) {
                error!(agent = owner, rule = rule.name(), "Rule not activated: {}", e);
                continue;
            }
            let event_type = rule.triggering_event_type();
            debug!(agent = owner, rule = rule.name(), %event_type, "Rule activated");
            self.by_type
                .entry(event_type)
                .or_default()
                .push(self.rules.len());
            self.rules.push(rule);
            activated += 1;
        }
        activated
    }

    /// Runs every rule bound to the event's type in registration order and
    /// collects what they produce. Stops at the first error.
    pub fn execute(
        &mut self,
        agent: &mut B,
        event: &Event,
        ctx: &AgentContext,
    ) -> RuleResult<Vec<Event>> {
        let Some(indices) = self.by_type.get(&event.event_type()) else {
            return Ok(Vec::new());
        };
        let mut produced = Vec::new();
        for &i in indices {
            let rule = &mut self.rules[i];
            let mut cx = RuleContext {
                agent: &mut *agent,
                event,
                ctx,
            };
            produced.extend(rule.execute(&mut cx)?);
        }
        Ok(produced)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn count_for(&self, event_type: &EventType) -> usize {
        self.by_type.get(event_type).map_or(0, |rules| rules.len())
    }

    pub fn names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name().to_string()).collect()
    }
}

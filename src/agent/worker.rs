use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::{atomic::Ordering, Arc, Mutex, MutexGuard},
};

use futures::FutureExt;
use tracing::{debug, error, info, trace, warn};

use crate::{
    event::{Event, EventPayload, EventPriority},
    rule::RuleIndex,
};

use super::{
    context::AgentContext, queues::TierInbox, AgentBehavior, AgentError, AgentResult, AgentState,
    StagedRules,
};

/// Everything only the processing task touches.
pub(crate) struct AgentCore<B> {
    pub(crate) behavior: B,
    pub(crate) rules: RuleIndex<B>,
    pub(crate) inbox: TierInbox,
}

/// The processing task of one agent.
pub(crate) struct Worker<B> {
    pub(crate) ctx: AgentContext,
    pub(crate) core: Arc<Mutex<AgentCore<B>>>,
    pub(crate) staged: StagedRules<B>,
}

impl<B: AgentBehavior> Worker<B> {
    pub(crate) async fn run(self) {
        let name = self.ctx.name();
        info!(agent = %name, kind = self.ctx.kind(), "Agent running");

        let outcome = AssertUnwindSafe(self.drive()).catch_unwind().await;
        self.ctx.shared.accepting.store(false, Ordering::SeqCst);

        let reason = match outcome {
            Ok(Ok(())) => {
                self.ctx.shared.state.send_replace(AgentState::Stopped);
                info!(agent = %name, "Agent stopped");
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => AgentError::Panicked {
                message: panic_message(panic.as_ref()),
            }
            .to_string(),
        };
        error!(fatal = true, agent = %name, "Agent terminated: {}", reason);
        self.ctx
            .shared
            .state
            .send_replace(AgentState::Failed { reason });
    }

    async fn drive(&self) -> AgentResult<()> {
        self.startup()?;
        self.ctx.trigger(Event::new(EventPayload::Started));

        let interval = self.ctx.config().cycle_interval;
        while self.ctx.is_running() {
            if self.ctx.is_active() {
                self.cycle()?;
            }
            if interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(interval).await;
            }
        }

        self.teardown()?;
        self.ctx.trigger(Event::new(EventPayload::Stopped));
        Ok(())
    }

    fn lock_core(&self) -> AgentResult<MutexGuard<'_, AgentCore<B>>> {
        self.core.lock().map_err(|_| AgentError::Poisoned)
    }

    fn take_staged(&self) -> AgentResult<Vec<Box<dyn crate::rule::Rule<B>>>> {
        let mut staged = self.staged.lock().map_err(|_| AgentError::Poisoned)?;
        Ok(std::mem::take(&mut *staged))
    }

    fn startup(&self) -> AgentResult<()> {
        let staged = self.take_staged()?;
        let name = self.ctx.name();
        {
            let mut core = self.lock_core()?;
            let AgentCore {
                behavior, rules, ..
            } = &mut *core;
            behavior.initialize(&self.ctx)?;
            rules.activate(staged, behavior, &name);
            behavior.on_started(&self.ctx)?;
        }
        for child in self.ctx.children() {
            if let Err(e) = child.start() {
                warn!(agent = %name, child = %child.name(), "Child failed to start: {}", e);
            }
        }
        Ok(())
    }

    fn teardown(&self) -> AgentResult<()> {
        self.lock_core()?.behavior.on_stopped(&self.ctx)?;
        for child in self.ctx.children() {
            child.stop();
        }
        Ok(())
    }

    /// One pass over the tiers. Results of a tier are fanned out before the
    /// next tier is drained.
    fn cycle(&self) -> AgentResult<()> {
        let staged = self.take_staged()?;
        let mut core = self.lock_core()?;
        let AgentCore {
            behavior,
            rules,
            inbox,
        } = &mut *core;

        if !staged.is_empty() {
            let name = self.ctx.name();
            let activated = rules.activate(staged, behavior, &name);
            debug!(agent = %name, activated, "Late rules activated");
        }

        behavior.on_cycle_starts(&self.ctx)?;

        for priority in EventPriority::ALL {
            let batch = inbox.drain(priority, self.ctx.shared.queues.generation());
            if batch.is_empty() {
                continue;
            }
            let mut produced = Vec::new();
            for event in &batch {
                trace!(
                    agent = %self.ctx.name(),
                    event_type = %event.event_type(),
                    %priority,
                    "Dispatching"
                );
                produced.extend(rules.execute(behavior, event, &self.ctx)?);
            }
            for event in produced {
                self.ctx.trigger(event);
            }
        }

        behavior.on_cycle_ends(&self.ctx)?;
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::event::{Event, EventPriority};

struct Queued {
    generation: u64,
    event: Event,
}

/// Sending half of an agent's five tier queues.
///
/// Every queued event is tagged with the activation generation current at
/// ingress. Deactivation bumps the generation, so whatever was queued before
/// is discarded by the next drain instead of being replayed.
pub(crate) struct TierQueues {
    senders: Vec<mpsc::UnboundedSender<Queued>>,
    generation: AtomicU64,
}

/// Receiving half, owned by the agent's processing task.
pub(crate) struct TierInbox {
    receivers: Vec<mpsc::UnboundedReceiver<Queued>>,
}

pub(crate) fn tier_queues() -> (TierQueues, TierInbox) {
    let (senders, receivers) = EventPriority::ALL
        .iter()
        .map(|_| mpsc::unbounded_channel())
        .unzip();
    (
        TierQueues {
            senders,
            generation: AtomicU64::new(0),
        },
        TierInbox { receivers },
    )
}

impl TierQueues {
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Tag the event with the generation observed *before* the caller's
    /// active check, so a racing deactivation always wins.
    pub(crate) fn push(&self, generation: u64, event: Event) -> bool {
        let tier = event.priority().index();
        self.senders[tier].send(Queued { generation, event }).is_ok()
    }

    /// Invalidates everything queued so far.
    pub(crate) fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl TierInbox {
    /// Takes everything pending in one tier, in arrival order. Events that
    /// arrive while the batch is processed wait for the next cycle.
    pub(crate) fn drain(&mut self, priority: EventPriority, generation: u64) -> Vec<Event> {
        let receiver = &mut self.receivers[priority.index()];
        let mut batch = Vec::new();
        while let Ok(queued) = receiver.try_recv() {
            if queued.generation == generation {
                batch.push(queued.event);
            }
        }
        batch
    }
}

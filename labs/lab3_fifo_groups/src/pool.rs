use std::sync::Arc;

use shared::broker::MessageQueue;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::consumer::{Consumer, ConsumerSettings, ConsumerSummary};
use crate::dispatch::ConsumerScope;
use crate::envelope::GroupRegistry;
use crate::stats::ConsumerStats;

/// How consumers are spread over the groups. One mode per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    /// `consumers` tasks, each taking any group.
    General { consumers: usize },
    /// `group1_consumers` tasks for `group-1`, one task for every other group.
    GroupSpecific { group1_consumers: usize },
}

impl FanOut {
    pub fn total_consumers(&self, registry: &GroupRegistry) -> usize {
        match *self {
            FanOut::General { consumers } => consumers,
            FanOut::GroupSpecific { group1_consumers } => {
                group1_consumers + registry.len().saturating_sub(1)
            }
        }
    }
}

/// Consumer ids and scopes for `fan_out`. Ids start at 1 and never repeat.
pub fn plan(fan_out: FanOut, registry: &GroupRegistry) -> Vec<(usize, ConsumerScope)> {
    match fan_out {
        FanOut::General { consumers } => (1..=consumers).map(|id| (id, ConsumerScope::Any)).collect(),
        FanOut::GroupSpecific { group1_consumers } => registry
            .groups()
            .iter()
            .enumerate()
            .flat_map(|(i, group)| {
                let n = if i == 0 { group1_consumers } else { 1 };
                std::iter::repeat(group.clone()).take(n)
            })
            .enumerate()
            .map(|(i, group)| (i + 1, ConsumerScope::Group(group)))
            .collect(),
    }
}

/// A fixed set of consumer tasks sharing one cancellation token.
pub struct ConsumerPool {
    cancel: CancellationToken,
    handles: Vec<(usize, JoinHandle<ConsumerSummary>)>,
}

impl ConsumerPool {
    /// Spawn every consumer before returning.
    pub fn start<I>(consumers: I, cancel: CancellationToken) -> Self
    where
        I: IntoIterator<Item = Consumer>,
    {
        let handles = consumers
            .into_iter()
            .map(|consumer| {
                let id = consumer.id();
                info!(consumer = id, scope = %consumer.scope(), "starting consumer");
                (id, tokio::spawn(consumer.run(cancel.clone())))
            })
            .collect();
        Self { cancel, handles }
    }

    /// Build consumers for `fan_out` and start them.
    pub fn launch(
        fan_out: FanOut,
        queue: Arc<dyn MessageQueue>,
        registry: Arc<GroupRegistry>,
        stats: Arc<ConsumerStats>,
        settings: ConsumerSettings,
        cancel: CancellationToken,
    ) -> Self {
        let consumers: Vec<Consumer> = plan(fan_out, &registry)
            .into_iter()
            .map(|(id, scope)| {
                Consumer::new(
                    id,
                    scope,
                    Arc::clone(&queue),
                    Arc::clone(&registry),
                    Arc::clone(&stats),
                    settings.clone(),
                )
            })
            .collect();
        Self::start(consumers, cancel)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for every consumer to stop.
    pub async fn join(self) -> Vec<ConsumerSummary> {
        let mut summaries = Vec::with_capacity(self.handles.len());
        for (id, handle) in self.handles {
            match handle.await {
                Ok(summary) => summaries.push(summary),
                Err(e) => error!(consumer = id, "consumer task failed: {e}"),
            }
        }
        summaries
    }
}

//! The polling loop run by every consumer task.
//!
//! Each iteration receives at most one message, lets the dispatch policy
//! decide, then either deletes the message after simulated work (counting it)
//! or hands it straight back to the queue. Only cancellation, or an empty
//! receive in drain mode, ends the loop; remote failures are logged and the
//! loop carries on. Delivery is at-least-once, so the same message may be
//! counted by two consumers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use shared::broker::{MessageQueue, ReceivedMessage};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::dispatch::{self, ConsumerScope, DispatchDecision};
use crate::envelope::GroupRegistry;
use crate::stats::ConsumerStats;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSettings {
    /// Long-poll window for each receive.
    pub wait: Duration,
    /// Simulated processing time before a delete.
    pub work: Duration,
    /// Pause after a failed receive.
    pub error_backoff: Duration,
    /// Stop on the first empty receive instead of polling until cancelled.
    pub drain_on_empty: bool,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(10),
            work: Duration::from_millis(200),
            error_backoff: Duration::from_secs(1),
            drain_on_empty: false,
        }
    }
}

/// What a single poll iteration ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Empty,
    Processed,
    DeleteFailed,
    Released,
    ReleaseFailed,
    ReceiveFailed,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub consumer_id: usize,
    pub processed: u64,
    pub released: u64,
    pub delete_failures: u64,
    pub release_failures: u64,
    pub receive_errors: u64,
}

impl ConsumerSummary {
    fn record(&mut self, outcome: PollOutcome) {
        match outcome {
            PollOutcome::Processed => self.processed += 1,
            PollOutcome::Released => self.released += 1,
            PollOutcome::DeleteFailed => self.delete_failures += 1,
            PollOutcome::ReleaseFailed => self.release_failures += 1,
            PollOutcome::ReceiveFailed => self.receive_errors += 1,
            PollOutcome::Empty | PollOutcome::Cancelled => {}
        }
    }
}

pub struct Consumer {
    id: usize,
    scope: ConsumerScope,
    queue: Arc<dyn MessageQueue>,
    registry: Arc<GroupRegistry>,
    stats: Arc<ConsumerStats>,
    settings: ConsumerSettings,
}

impl Consumer {
    pub fn new(
        id: usize,
        scope: ConsumerScope,
        queue: Arc<dyn MessageQueue>,
        registry: Arc<GroupRegistry>,
        stats: Arc<ConsumerStats>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            id,
            scope,
            queue,
            registry,
            stats,
            settings,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn scope(&self) -> &ConsumerScope {
        &self.scope
    }

    /// Poll until `cancel` fires (or the queue is empty, in drain mode).
    pub async fn run(self, cancel: CancellationToken) -> ConsumerSummary {
        let span = info_span!("consumer", id = self.id, scope = %self.scope);
        self.run_loop(cancel).instrument(span).await
    }

    async fn run_loop(self, cancel: CancellationToken) -> ConsumerSummary {
        let started = Instant::now();
        let mut summary = ConsumerSummary {
            consumer_id: self.id,
            ..Default::default()
        };

        loop {
            if cancel.is_cancelled() {
                info!("shutting down due to cancellation");
                break;
            }

            let outcome = self.poll_once(&cancel).await;
            summary.record(outcome);

            match outcome {
                PollOutcome::Cancelled => {
                    info!("shutting down due to cancellation");
                    break;
                }
                PollOutcome::Empty if self.settings.drain_on_empty => {
                    info!(elapsed = ?started.elapsed(), "no more messages, finished");
                    break;
                }
                PollOutcome::ReceiveFailed => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(self.settings.error_backoff) => {}
                    }
                }
                _ => {}
            }
        }

        summary
    }

    /// One receive → decide → finalize/release cycle.
    pub async fn poll_once(&self, cancel: &CancellationToken) -> PollOutcome {
        let received = tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            res = self.queue.receive(1, self.settings.wait) => res,
        };

        let msg = match received {
            Ok(msgs) => match msgs.into_iter().next() {
                Some(m) => m,
                None => return PollOutcome::Empty,
            },
            Err(e) => {
                warn!("error receiving: {e:#}");
                return PollOutcome::ReceiveFailed;
            }
        };

        match dispatch::decide(&self.registry, &msg, &self.scope) {
            DispatchDecision::Accept => self.finalize(&msg).await,
            DispatchDecision::Reject => self.release(&msg).await,
        }
    }

    async fn finalize(&self, msg: &ReceivedMessage) -> PollOutcome {
        let group = self.registry.recover(msg);
        info!(group, body = %msg.body, "processing");

        tokio::time::sleep(self.settings.work).await;

        match self.queue.delete(&msg.receipt_handle).await {
            Ok(()) => {
                self.stats.increment(self.id, group);
                info!(group, body = %msg.body, "deleted");
                PollOutcome::Processed
            }
            Err(e) => {
                // left in flight; it comes back once the visibility timeout expires
                warn!(message_id = msg.id(), "error deleting message: {e:#}");
                PollOutcome::DeleteFailed
            }
        }
    }

    async fn release(&self, msg: &ReceivedMessage) -> PollOutcome {
        debug!(body = %msg.body, "ignoring message from another group");

        match self.queue.release(&msg.receipt_handle).await {
            Ok(()) => PollOutcome::Released,
            Err(e) => {
                warn!(message_id = msg.id(), "error changing visibility: {e:#}");
                PollOutcome::ReleaseFailed
            }
        }
    }
}

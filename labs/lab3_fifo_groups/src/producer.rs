use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::Deserialize;
use shared::broker::TopicPublisher;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::envelope::GroupRegistry;
use crate::stats::Distribution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProducerMode {
    /// `messages_per_group` messages for every group, interleaved.
    #[default]
    RoundRobin,
    /// `total_messages` messages, each for a uniformly random group.
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerSettings {
    pub mode: ProducerMode,
    pub messages_per_group: usize,
    pub total_messages: usize,
    pub publish_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub group: String,
    pub body: String,
}

/// Decide group and body for every message up front. Bodies always carry the
/// group id as a standalone token so consumers can recover it.
pub fn plan_messages<R: Rng>(
    settings: &ProducerSettings,
    registry: &GroupRegistry,
    rng: &mut R,
) -> Vec<OutgoingMessage> {
    let groups = registry.groups();
    if groups.is_empty() {
        return Vec::new();
    }

    match settings.mode {
        ProducerMode::RoundRobin => (1..=settings.messages_per_group)
            .flat_map(|i| {
                groups.iter().map(move |g| OutgoingMessage {
                    group: g.clone(),
                    body: format!("{g} - Message {i}"),
                })
            })
            .collect(),
        ProducerMode::Random => (1..=settings.total_messages)
            .map(|i| {
                let g = &groups[rng.gen_range(0..groups.len())];
                OutgoingMessage {
                    group: g.clone(),
                    body: format!("Message {i} - Group {g}"),
                }
            })
            .collect(),
    }
}

/// Unique per publish call: group, wall-clock nanos and a per-run sequence.
pub fn dedup_key(group: &str, seq: u64) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{group}-{nanos}-{seq}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendReport {
    /// Successful publishes per group
    pub sent: Distribution,
    pub failed: u64,
    pub elapsed: Duration,
}

impl fmt::Display for SendReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nMessage distribution across groups:")?;
        writeln!(f, "----------------------------------")?;
        write!(f, "{}", self.sent)?;
        writeln!(f, "\nTotal messages sent: {}", self.sent.total)?;
        if self.failed > 0 {
            writeln!(f, "Failed publishes: {}", self.failed)?;
        }
        write!(f, "Total time: {:?}", self.elapsed)
    }
}

pub struct Producer {
    publisher: Arc<dyn TopicPublisher>,
    registry: Arc<GroupRegistry>,
    settings: ProducerSettings,
}

impl Producer {
    pub fn new(
        publisher: Arc<dyn TopicPublisher>,
        registry: Arc<GroupRegistry>,
        settings: ProducerSettings,
    ) -> Self {
        Self {
            publisher,
            registry,
            settings,
        }
    }

    pub fn plan<R: Rng>(&self, rng: &mut R) -> Vec<OutgoingMessage> {
        plan_messages(&self.settings, &self.registry, rng)
    }

    /// Publish `messages` in order. Failed publishes are logged and skipped.
    pub async fn run(&self, messages: Vec<OutgoingMessage>, cancel: &CancellationToken) -> SendReport {
        let started = Instant::now();
        let mut sent: Vec<(String, u64)> = self
            .registry
            .groups()
            .iter()
            .map(|g| (g.clone(), 0))
            .collect();
        let mut failed = 0;

        info!(
            messages = messages.len(),
            groups = self.registry.len(),
            mode = ?self.settings.mode,
            "sending messages"
        );

        for (seq, msg) in (1u64..).zip(messages) {
            if cancel.is_cancelled() {
                warn!(attempted = seq - 1, "publishing cancelled");
                break;
            }

            let dedup = dedup_key(&msg.group, seq);
            match self.publisher.publish(&msg.body, &msg.group, &dedup).await {
                Ok(message_id) => {
                    info!(group = %msg.group, body = %msg.body, message_id = message_id.as_deref(), "sent");
                    if let Some((_, n)) = sent.iter_mut().find(|(g, _)| *g == msg.group) {
                        *n += 1;
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!(group = %msg.group, body = %msg.body, "failed to publish: {e:#}");
                }
            }

            if !self.settings.publish_delay.is_zero() {
                tokio::time::sleep(self.settings.publish_delay).await;
            }
        }

        SendReport {
            sent: Distribution::from_counts(sent),
            failed,
            elapsed: started.elapsed(),
        }
    }
}

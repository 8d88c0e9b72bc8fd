//! Transport-neutral view of the managed messaging service.
//!
//! The SQS/SNS clients implement these traits; tests substitute in-memory
//! fakes so the dispatch loop can run without a broker.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A message as handed out by a queue receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: Option<String>,
    pub body: String,
    /// Token required to delete the message or change its visibility.
    pub receipt_handle: String,
    /// `MessageGroupId` when the transport exposes it; LocalStack often does not.
    pub group_id: Option<String>,
}

impl ReceivedMessage {
    pub fn id(&self) -> &str {
        self.message_id.as_deref().unwrap_or("unknown")
    }
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-poll for up to `max` messages; an empty vec means the wait elapsed.
    async fn receive(&self, max: i32, wait: Duration) -> Result<Vec<ReceivedMessage>>;

    async fn delete(&self, receipt_handle: &str) -> Result<()>;

    async fn change_visibility(&self, receipt_handle: &str, timeout_secs: i32) -> Result<()>;

    /// Make the message immediately receivable again.
    async fn release(&self, receipt_handle: &str) -> Result<()> {
        self.change_visibility(receipt_handle, 0).await
    }
}

#[async_trait]
pub trait TopicPublisher: Send + Sync {
    /// Publish with `group_key` as the FIFO ordering key. Returns the broker message id.
    async fn publish(&self, body: &str, group_key: &str, dedup_key: &str) -> Result<Option<String>>;
}

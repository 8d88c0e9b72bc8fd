use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName, QueueAttributeName};
use std::time::Duration;
use tracing::warn;

use crate::broker::{MessageQueue, ReceivedMessage};

pub async fn get_queue_url(client: &Client, queue_name: &str) -> Result<String> {
    let out = client
        .get_queue_url()
        .queue_name(queue_name)
        .send()
        .await
        .with_context(|| format!("getting queue url for {queue_name}"))?;

    out.queue_url()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("queue url missing in response"))
}

/// All queue URLs visible to the caller, following pagination.
pub async fn list_queues(client: &Client) -> Result<Vec<String>> {
    let mut urls = Vec::new();
    let mut next_token: Option<String> = None;

    loop {
        let out = client
            .list_queues()
            .set_next_token(next_token.take())
            .send()
            .await
            .context("listing queues")?;

        urls.extend(out.queue_urls().iter().cloned());

        match out.next_token() {
            Some(token) => next_token = Some(token.to_string()),
            None => break,
        }
    }
    Ok(urls)
}

/// For debugging: fetch approximate queue metrics
pub async fn queue_attrs(client: &Client, queue_url: &str) -> Result<Vec<(String, String)>> {
    let out = client
        .get_queue_attributes()
        .queue_url(queue_url)
        .attribute_names(QueueAttributeName::All)
        .send()
        .await
        .context("get_queue_attributes")?;

    let mut attrs: Vec<(String, String)> = out
        .attributes()
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.as_str().to_string(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    attrs.sort();
    Ok(attrs)
}

/// An SQS queue bound to one URL.
#[derive(Clone, Debug)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

fn to_received(m: &Message) -> Option<ReceivedMessage> {
    let Some(receipt_handle) = m.receipt_handle() else {
        warn!(message_id = m.message_id(), "missing receipt_handle; skipping");
        return None;
    };
    let group_id = m
        .attributes()
        .and_then(|a| a.get(&MessageSystemAttributeName::MessageGroupId))
        .cloned();

    Some(ReceivedMessage {
        message_id: m.message_id().map(str::to_string),
        body: m.body().unwrap_or("").to_string(),
        receipt_handle: receipt_handle.to_string(),
        group_id,
    })
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self, max: i32, wait: Duration) -> Result<Vec<ReceivedMessage>> {
        // SQS caps long polling at 20 seconds
        let wait_secs = wait.as_secs().min(20) as i32;
        let out = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max)
            .wait_time_seconds(wait_secs)
            // request MessageGroupId so the group can be read without parsing the body
            .message_system_attribute_names(MessageSystemAttributeName::MessageGroupId)
            .send()
            .await
            .context("receiving messages")?;

        Ok(out.messages().iter().filter_map(to_received).collect())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .context("deleting message")?;
        Ok(())
    }

    async fn change_visibility(&self, receipt_handle: &str, timeout_secs: i32) -> Result<()> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(timeout_secs)
            .send()
            .await
            .with_context(|| format!("changing visibility to {timeout_secs}s"))?;
        Ok(())
    }
}

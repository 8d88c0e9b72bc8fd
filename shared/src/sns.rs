use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_sns::Client;

use crate::broker::TopicPublisher;

/// All topic ARNs visible to the caller, following pagination.
pub async fn list_topics(client: &Client) -> Result<Vec<String>> {
    let mut arns = Vec::new();
    let mut next_token: Option<String> = None;

    loop {
        let out = client
            .list_topics()
            .set_next_token(next_token.take())
            .send()
            .await
            .context("listing topics")?;

        arns.extend(out.topics().iter().filter_map(|t| t.topic_arn().map(str::to_string)));

        match out.next_token() {
            Some(token) => next_token = Some(token.to_string()),
            None => break,
        }
    }
    Ok(arns)
}

/// An SNS FIFO topic bound to one ARN.
#[derive(Clone, Debug)]
pub struct SnsTopic {
    client: Client,
    topic_arn: String,
}

impl SnsTopic {
    pub fn new(client: Client, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }
}

#[async_trait]
impl TopicPublisher for SnsTopic {
    async fn publish(&self, body: &str, group_key: &str, dedup_key: &str) -> Result<Option<String>> {
        let out = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .message(body)
            .message_group_id(group_key)
            .message_deduplication_id(dedup_key)
            .send()
            .await
            .with_context(|| format!("publishing to {}", self.topic_arn))?;

        Ok(out.message_id().map(str::to_string))
    }
}

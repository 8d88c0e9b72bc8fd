#![allow(dead_code)]

//! In-memory stand-in for an SNS FIFO topic fanned out into an SQS FIFO queue.
//!
//! Messages of one group are handed out strictly in order: while the head of a
//! group is in flight, nothing behind it in that group is receivable. Receives
//! rotate over the groups that have a visible head.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use shared::broker::{MessageQueue, ReceivedMessage, TopicPublisher};

#[derive(Debug, Clone)]
pub struct Published {
    pub body: String,
    pub group: String,
    pub dedup: String,
}

#[derive(Debug)]
struct Entry {
    id: u64,
    group: String,
    body: String,
    receipt: Option<String>,
    hidden_until: Option<Instant>,
}

impl Entry {
    fn in_flight(&self, now: Instant) -> bool {
        self.hidden_until.is_some_and(|t| t > now)
    }
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<Entry>,
    next_id: u64,
    next_receipt: u64,
    cursor: usize,
    dedup: HashSet<String>,
    published: Vec<Published>,
    deleted: Vec<String>,
}

#[derive(Debug)]
pub struct InMemoryFifo {
    state: Mutex<State>,
    visibility: Duration,
    expose_group_id: bool,
    fail_deletes: AtomicUsize,
    fail_releases: AtomicUsize,
    fail_receives: AtomicUsize,
    fail_publishes: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl Default for InMemoryFifo {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFifo {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            visibility: Duration::from_secs(30),
            expose_group_id: false,
            fail_deletes: AtomicUsize::new(0),
            fail_releases: AtomicUsize::new(0),
            fail_receives: AtomicUsize::new(0),
            fail_publishes: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_visibility(mut self, visibility: Duration) -> Self {
        self.visibility = visibility;
        self
    }

    /// Report `MessageGroupId` on received messages, like real SQS does.
    pub fn exposing_group_id(mut self) -> Self {
        self.expose_group_id = true;
        self
    }

    pub fn fail_next_deletes(&self, n: usize) {
        self.fail_deletes.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_releases(&self, n: usize) {
        self.fail_releases.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_receives(&self, n: usize) {
        self.fail_receives.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_publishes(&self, n: usize) {
        self.fail_publishes.store(n, Ordering::SeqCst);
    }

    pub fn push(&self, group: &str, body: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.entries.push(Entry {
            id,
            group: group.to_string(),
            body: body.to_string(),
            receipt: None,
            hidden_until: None,
        });
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Bodies in the order they were deleted.
    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn published(&self) -> Vec<Published> {
        self.state.lock().unwrap().published.clone()
    }

    fn take_next(&self) -> Option<ReceivedMessage> {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        let receipt = format!("rh-{}", state.next_receipt);

        // heads of every group that is not blocked by an in-flight message
        let mut seen: HashSet<&str> = HashSet::new();
        let mut heads = Vec::new();
        for (i, e) in state.entries.iter().enumerate() {
            if !seen.insert(e.group.as_str()) {
                continue;
            }
            if !e.in_flight(now) {
                heads.push(i);
            }
        }
        if heads.is_empty() {
            return None;
        }
        // rotate across groups so one group's head cannot starve the others
        let i = heads[state.cursor % heads.len()];
        state.cursor += 1;

        state.next_receipt += 1;
        let visibility = self.visibility;
        let entry = &mut state.entries[i];
        entry.receipt = Some(receipt.clone());
        entry.hidden_until = Some(now + visibility);

        Some(ReceivedMessage {
            message_id: Some(format!("m-{}", entry.id)),
            body: entry.body.clone(),
            receipt_handle: receipt,
            group_id: self.expose_group_id.then(|| entry.group.clone()),
        })
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl MessageQueue for InMemoryFifo {
    async fn receive(&self, _max: i32, wait: Duration) -> Result<Vec<ReceivedMessage>> {
        if take_failure(&self.fail_receives) {
            return Err(anyhow!("simulated receive failure"));
        }

        let deadline = Instant::now() + wait;
        loop {
            // let other consumers in before looking, so a releaser does not always win
            tokio::time::sleep(Duration::from_millis(1)).await;
            if let Some(m) = self.take_next() {
                return Ok(vec![m]);
            }
            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.fail_deletes) {
            return Err(anyhow!("simulated delete failure"));
        }

        let mut state = self.state.lock().unwrap();
        let i = state
            .entries
            .iter()
            .position(|e| e.receipt.as_deref() == Some(receipt_handle))
            .ok_or_else(|| anyhow!("receipt handle is invalid: {receipt_handle}"))?;
        let entry = state.entries.remove(i);
        state.deleted.push(entry.body);
        Ok(())
    }

    async fn change_visibility(&self, receipt_handle: &str, timeout_secs: i32) -> Result<()> {
        if take_failure(&self.fail_releases) {
            return Err(anyhow!("simulated visibility failure"));
        }

        let mut state = self.state.lock().unwrap();
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.receipt.as_deref() == Some(receipt_handle))
            .ok_or_else(|| anyhow!("receipt handle is invalid: {receipt_handle}"))?;
        entry.hidden_until = match timeout_secs {
            0 => None,
            secs => Some(Instant::now() + Duration::from_secs(secs as u64)),
        };
        Ok(())
    }
}

#[async_trait]
impl TopicPublisher for InMemoryFifo {
    async fn publish(&self, body: &str, group_key: &str, dedup_key: &str) -> Result<Option<String>> {
        if take_failure(&self.fail_publishes) {
            return Err(anyhow!("simulated publish failure"));
        }

        let duplicate = {
            let mut state = self.state.lock().unwrap();
            state.published.push(Published {
                body: body.to_string(),
                group: group_key.to_string(),
                dedup: dedup_key.to_string(),
            });
            !state.dedup.insert(dedup_key.to_string())
        };
        if !duplicate {
            self.push(group_key, body);
        }
        Ok(Some(format!("pub-{dedup_key}")))
    }
}

/// A queue whose receive never returns.
pub struct StalledQueue;

#[async_trait]
impl MessageQueue for StalledQueue {
    async fn receive(&self, _max: i32, _wait: Duration) -> Result<Vec<ReceivedMessage>> {
        std::future::pending().await
    }

    async fn delete(&self, _receipt_handle: &str) -> Result<()> {
        Ok(())
    }

    async fn change_visibility(&self, _receipt_handle: &str, _timeout_secs: i32) -> Result<()> {
        Ok(())
    }
}

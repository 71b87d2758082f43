//! Fan-out of poll-created events to participant clients.
//!
//! The broker itself is an external collaborator; this module only shapes the
//! event payload and hands it off. The payload deliberately omits the correct
//! option: recipients are untrusted while the voting window runs.

use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, poll::Poll};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollCreatedEvent {
    pub poll_id: String,
    pub question: String,
    pub options: BTreeMap<String, String>,
    pub validity_seconds: u64,
}

impl From<&Poll> for PollCreatedEvent {
    fn from(poll: &Poll) -> Self {
        Self {
            poll_id: poll.poll_id.clone(),
            question: poll.question.clone(),
            options: poll.options.clone(),
            validity_seconds: poll.validity_seconds,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn poll_created(&self, target: &str, event: &PollCreatedEvent) -> Result<(), AppError>;
}

/// Publishes on the state store's pub/sub channel named by the caller's
/// broadcast target.
#[derive(Clone)]
pub struct RedisNotifier {
    conn: ConnectionManager,
}

impl RedisNotifier {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn poll_created(&self, target: &str, event: &PollCreatedEvent) -> Result<(), AppError> {
        let payload = serde_json::to_string(event).map_err(AppError::internal)?;

        let mut conn = self.conn.clone();
        let _: () = conn
            .publish(target, payload)
            .await
            .map_err(|e| AppError::Broadcast(e.to_string()))?;

        Ok(())
    }
}

/// Captures events instead of publishing them; what tests inject.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(String, PollCreatedEvent)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, PollCreatedEvent)> {
        self.events.lock().expect("Notifier mutex poisoned!").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn poll_created(&self, target: &str, event: &PollCreatedEvent) -> Result<(), AppError> {
        self.events
            .lock()
            .expect("Notifier mutex poisoned!")
            .push((target.to_string(), event.clone()));

        Ok(())
    }
}

//! Poll creation: validation, identifier assignment, initial state writes,
//! finalize scheduling, and the poll-created broadcast.

use std::{collections::BTreeMap, sync::Arc};

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    notifier::{Notifier, PollCreatedEvent},
    poll::{DEFAULT_VALIDITY_SECS, MAX_VALIDITY_SECS, Poll, require_non_empty},
    store::PollStore,
    utils::now_unix_secs,
};

/// Creation request. `poll_id` is generated when absent; `validity_seconds`
/// falls back to [`DEFAULT_VALIDITY_SECS`] when absent or zero and is
/// rejected above [`MAX_VALIDITY_SECS`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewPoll {
    pub poll_id: Option<String>,
    pub question: String,
    pub options: BTreeMap<String, String>,
    pub correct_option: String,
    pub validity_seconds: Option<u64>,
    pub broadcast_target: String,
}

#[derive(Clone)]
pub struct PollRegistry {
    store: Arc<dyn PollStore>,
    notifier: Arc<dyn Notifier>,
    grace_secs: u64,
    finalize_delay_secs: u64,
}

impl PollRegistry {
    pub fn new(
        store: Arc<dyn PollStore>,
        notifier: Arc<dyn Notifier>,
        grace_secs: u64,
        finalize_delay_secs: u64,
    ) -> Self {
        Self {
            store,
            notifier,
            grace_secs,
            finalize_delay_secs,
        }
    }

    pub async fn create(&self, new_poll: NewPoll) -> Result<Poll, AppError> {
        validate(&new_poll)?;

        let validity_seconds = match new_poll.validity_seconds {
            None | Some(0) => DEFAULT_VALIDITY_SECS,
            Some(validity) => validity,
        };
        let poll = Poll {
            poll_id: new_poll
                .poll_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            question: new_poll.question,
            options: new_poll.options,
            correct_option: new_poll.correct_option,
            created_at: now_unix_secs(),
            validity_seconds,
        };

        self.store
            .create_poll(&poll, validity_seconds.saturating_add(self.grace_secs))
            .await?;

        // Armed before the broadcast: a dead broker must not cost the poll
        // its finalization.
        self.store
            .arm_finalization(
                &poll.poll_id,
                poll.closes_at().saturating_add(self.finalize_delay_secs),
            )
            .await?;

        let event = PollCreatedEvent::from(&poll);
        if let Err(e) = self
            .notifier
            .poll_created(&new_poll.broadcast_target, &event)
            .await
        {
            warn!("Poll {} created but not announced: {e}", poll.poll_id);
        }

        info!(
            "Created poll {} open for {validity_seconds}s",
            poll.poll_id
        );

        Ok(poll)
    }
}

fn validate(new_poll: &NewPoll) -> Result<(), AppError> {
    require_non_empty(&new_poll.question, "question")?;
    require_non_empty(&new_poll.correct_option, "correct_option")?;
    require_non_empty(&new_poll.broadcast_target, "broadcast_target")?;

    if let Some(poll_id) = &new_poll.poll_id {
        require_non_empty(poll_id, "poll_id")?;
    }

    if new_poll.options.is_empty() {
        return Err(AppError::validation("At least one option is required"));
    }

    if !new_poll.options.contains_key(&new_poll.correct_option) {
        return Err(AppError::validation(
            "correct_option must be one of the options",
        ));
    }

    if new_poll
        .validity_seconds
        .is_some_and(|validity| validity > MAX_VALIDITY_SECS)
    {
        return Err(AppError::validation(format!(
            "validity_seconds must be at most {MAX_VALIDITY_SECS}"
        )));
    }

    Ok(())
}

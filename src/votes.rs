//! Vote ingestion with at-most-one-vote-per-participant semantics.

use std::sync::Arc;

use crate::{
    error::AppError,
    poll::{ParticipantRecord, VoteOutcome, require_non_empty},
    store::PollStore,
    utils::now_unix_secs,
};

#[derive(Clone)]
pub struct VoteRecorder {
    store: Arc<dyn PollStore>,
    grace_secs: u64,
}

impl VoteRecorder {
    pub fn new(store: Arc<dyn PollStore>, grace_secs: u64) -> Self {
        Self { store, grace_secs }
    }

    /// Apply one participant's vote.
    ///
    /// The answered-set insertion is the single synchronization point:
    /// whichever of any number of concurrent submissions wins it goes on to
    /// the tally/record/ranking writes, every other one stops at
    /// `AlreadyAnswered` with no state touched. The dedup check and the
    /// follow-up writes are not one transaction; a crash in between leaves
    /// the participant marked answered with no tally entry, a bounded and
    /// accepted window.
    pub async fn submit(
        &self,
        poll_id: &str,
        participant_id: &str,
        selected_option: &str,
        response_time: f64,
    ) -> Result<VoteOutcome, AppError> {
        require_non_empty(poll_id, "poll_id")?;
        require_non_empty(participant_id, "participant_id")?;
        require_non_empty(selected_option, "selected_option")?;

        let Some(poll) = self.store.fetch_poll(poll_id).await? else {
            return Ok(VoteOutcome::PollNotFound);
        };

        let retention_secs = poll.remaining_secs(now_unix_secs()).saturating_add(self.grace_secs);
        if !self
            .store
            .add_answered(poll_id, participant_id, retention_secs)
            .await?
        {
            return Ok(VoteOutcome::AlreadyAnswered);
        }

        let record = ParticipantRecord {
            selected_option: selected_option.to_string(),
            is_correct: selected_option == poll.correct_option,
            response_time,
        };
        self.store
            .record_vote(poll_id, participant_id, &record, retention_secs)
            .await?;

        Ok(VoteOutcome::Accepted)
    }
}

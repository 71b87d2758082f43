//! Leaderboard construction: the one-time (but idempotent) transition from a
//! live ranking to a persisted, ranked top-N snapshot.

use std::sync::Arc;

use tracing::info;

use crate::{
    error::AppError,
    poll::{LeaderboardEntry, LeaderboardSnapshot},
    store::PollStore,
    utils::now_unix_secs,
};

/// Only the ten fastest correct answers make the snapshot.
pub const LEADERBOARD_SIZE: usize = 10;

#[derive(Clone)]
pub struct LeaderboardBuilder {
    store: Arc<dyn PollStore>,
    snapshot_ttl_secs: u64,
}

impl LeaderboardBuilder {
    pub fn new(store: Arc<dyn PollStore>, snapshot_ttl_secs: u64) -> Self {
        Self {
            store,
            snapshot_ttl_secs,
        }
    }

    /// Compute and persist the ranked snapshot for a poll.
    ///
    /// Idempotent and safe to call repeatedly or concurrently with the
    /// scheduler: every invocation recomputes from the current ranking and
    /// replaces the previous snapshot wholesale. A missing poll or a poll
    /// with no correct answers yields an empty snapshot, not an error. Ranks
    /// are 1-based in ranking order; ties keep the ranking's stable order.
    pub async fn finalize(&self, poll_id: &str) -> Result<LeaderboardSnapshot, AppError> {
        let top = self.store.ranking_top(poll_id, LEADERBOARD_SIZE).await?;

        let entries: Vec<LeaderboardEntry> = top
            .into_iter()
            .zip(1u32..)
            .map(|((participant_id, response_time), rank)| LeaderboardEntry {
                participant_id,
                rank,
                response_time,
            })
            .collect();
        let snapshot = LeaderboardSnapshot {
            entries,
            finalized_at: now_unix_secs(),
        };

        self.store
            .store_snapshot(poll_id, &snapshot, self.snapshot_ttl_secs)
            .await?;

        info!(
            "Poll {poll_id} finalized with {} ranked entries",
            snapshot.entries.len()
        );

        Ok(snapshot)
    }

    pub async fn fetch(&self, poll_id: &str) -> Result<Option<LeaderboardSnapshot>, AppError> {
        self.store.fetch_snapshot(poll_id).await
    }
}

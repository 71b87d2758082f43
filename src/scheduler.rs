//! Time-triggered finalization.
//!
//! Instead of one in-process timer per poll, every created poll writes a due
//! entry into a shared delayed queue. A periodic sweep drains entries whose
//! time has come and finalizes each one behind an atomic claim, so the work
//! survives process restarts and never double-fires when several workers
//! sweep at once.

use std::{sync::Arc, time::Duration};

use tokio::time::interval;
use tracing::warn;

use crate::{
    error::AppError, leaderboard::LeaderboardBuilder, store::PollStore, utils::now_unix_secs,
};

/// Max due entries drained per tick. Anything beyond this waits for the next
/// tick rather than stalling the sweep.
const SWEEP_BATCH: usize = 64;

#[derive(Clone)]
pub struct FinalizationScheduler {
    store: Arc<dyn PollStore>,
    builder: LeaderboardBuilder,
    sweep_interval: Duration,
}

impl FinalizationScheduler {
    pub fn new(
        store: Arc<dyn PollStore>,
        builder: LeaderboardBuilder,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            store,
            builder,
            sweep_interval,
        }
    }

    /// Sweep forever. Meant to be spawned once at startup.
    pub async fn run(self) {
        let mut ticker = interval(self.sweep_interval);

        loop {
            ticker.tick().await;

            if let Err(e) = self.sweep_once(now_unix_secs()).await {
                warn!("Finalize sweep failed: {e}");
            }
        }
    }

    /// One pass over the due queue: finalize every poll whose due time is at
    /// or before `now`. Returns how many polls this worker finalized; entries
    /// claimed by a concurrent sweeper are skipped silently.
    pub async fn sweep_once(&self, now: u64) -> Result<usize, AppError> {
        let due = self.store.due_finalizations(now, SWEEP_BATCH).await?;

        let mut finalized = 0;
        for poll_id in due {
            if !self.store.claim_finalization(&poll_id).await? {
                continue;
            }

            // The claim is not re-armed on failure. The snapshot can still be
            // produced on demand through the builder.
            match self.builder.finalize(&poll_id).await {
                Ok(_) => finalized += 1,
                Err(e) => warn!("Error finalizing poll {poll_id}: {e}"),
            }
        }

        Ok(finalized)
    }
}

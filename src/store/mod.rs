//! # State Store
//!
//! Shared state, the single source of truth for every worker process that
//! serves this service. All poll state lives here so any number of
//! independent processes can ingest votes for the same poll.
//!
//! ## Requirements
//!
//! - Per-poll hash maps (metadata, tallies, participant records)
//! - Sets with atomic first-insertion reporting (vote deduplication)
//! - Score-sorted collections (response-time ranking, finalize queue)
//! - Expiring keys, so nothing outlives its retention window
//!
//! ## Key patterns (Redis backing)
//!
//! ```text
//! Poll:{id}:meta                 → poll metadata hash
//! Poll:{id}:votes                → option → count hash
//! Poll:{id}:users_answered       → set of participants who voted
//! Poll:{id}:user:{participant}   → participant record hash
//! Poll:{id}:leaderboard          → sorted set, score = response_time
//! Poll:{id}:final_leaderboard    → snapshot JSON
//! polls:due                      → sorted set, score = finalize-at seconds
//! ```
//!
//! Every key carries an explicit expiry: poll metadata and tallies live for
//! `validity + grace`, per-vote keys for the poll's remaining validity plus
//! grace, and snapshots for their own configured retention.
//!
//! ## Concurrency
//!
//! There is no cross-worker lock. [`PollStore::add_answered`] is the single
//! synchronization point for vote ingestion, and
//! [`PollStore::claim_finalization`] the single synchronization point for the
//! finalize sweep; both report whether this caller won the atomic
//! insert/remove. Everything else is an idempotent write gated by one of
//! those two checks.

mod memory;
mod redis;

pub use self::memory::MemoryPollStore;
pub use self::redis::{RedisPollStore, init_redis};

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{
    error::AppError,
    poll::{LeaderboardSnapshot, ParticipantRecord, Poll},
};

/// Capability handed to every component at construction, so tests can swap
/// the Redis backing for [`MemoryPollStore`].
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Write the poll record plus a zero-initialized tally, both expiring
    /// after `retention_secs`.
    async fn create_poll(&self, poll: &Poll, retention_secs: u64) -> Result<(), AppError>;

    /// `None` when the poll is absent, expired, or missing its correct
    /// option.
    async fn fetch_poll(&self, poll_id: &str) -> Result<Option<Poll>, AppError>;

    /// Atomically add a participant to the answered set, re-arming the set's
    /// expiry. Returns `true` iff this was the first insertion.
    async fn add_answered(
        &self,
        poll_id: &str,
        participant_id: &str,
        retention_secs: u64,
    ) -> Result<bool, AppError>;

    /// Apply one accepted vote: bump the tally, write the participant record
    /// (expiring after `retention_secs`), and insert into the ranking when
    /// the answer was correct. Only ever called after a winning
    /// [`add_answered`](PollStore::add_answered).
    async fn record_vote(
        &self,
        poll_id: &str,
        participant_id: &str,
        record: &ParticipantRecord,
        retention_secs: u64,
    ) -> Result<(), AppError>;

    async fn fetch_participant(
        &self,
        poll_id: &str,
        participant_id: &str,
    ) -> Result<Option<ParticipantRecord>, AppError>;

    async fn tally(&self, poll_id: &str) -> Result<BTreeMap<String, u64>, AppError>;

    /// Fastest `limit` correct answers, ascending by response time. Equal
    /// times follow the backing's own stable order: Redis sorted sets break
    /// them lexically by member, the in-memory store by arrival.
    async fn ranking_top(&self, poll_id: &str, limit: usize)
    -> Result<Vec<(String, f64)>, AppError>;

    async fn store_snapshot(
        &self,
        poll_id: &str,
        snapshot: &LeaderboardSnapshot,
        ttl_secs: u64,
    ) -> Result<(), AppError>;

    async fn fetch_snapshot(&self, poll_id: &str)
    -> Result<Option<LeaderboardSnapshot>, AppError>;

    /// Durably schedule finalization of `poll_id` at `due_at` (unix seconds).
    async fn arm_finalization(&self, poll_id: &str, due_at: u64) -> Result<(), AppError>;

    /// Polls whose finalization is due at or before `now`, oldest first.
    async fn due_finalizations(&self, now: u64, limit: usize) -> Result<Vec<String>, AppError>;

    /// Atomically take `poll_id` off the finalize queue. Exactly one caller
    /// gets `true` per armed entry, however many sweeps race for it.
    async fn claim_finalization(&self, poll_id: &str) -> Result<bool, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

//! In-memory [`PollStore`] with the same observable semantics as the Redis
//! backing: first-insertion reporting, ranked reads, and lazily enforced
//! expiries. This is what unit and integration tests inject instead of a
//! live Redis. One divergence: equal ranking scores keep arrival order here,
//! while Redis breaks them lexically by member.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;

use super::PollStore;
use crate::{
    error::AppError,
    poll::{LeaderboardSnapshot, ParticipantRecord, Poll},
    utils::now_unix_secs,
};

struct Expiring<T> {
    value: T,
    expires_at: u64,
}

impl<T> Expiring<T> {
    fn new(value: T, now: u64, ttl_secs: u64) -> Self {
        Self {
            value,
            expires_at: now + ttl_secs,
        }
    }

    fn live(&self, now: u64) -> Option<&T> {
        (now < self.expires_at).then_some(&self.value)
    }
}

#[derive(Default)]
struct Inner {
    polls: HashMap<String, Expiring<Poll>>,
    tallies: HashMap<String, Expiring<BTreeMap<String, u64>>>,
    answered: HashMap<String, Expiring<HashSet<String>>>,
    participants: HashMap<(String, String), Expiring<ParticipantRecord>>,
    rankings: HashMap<String, Expiring<Vec<(String, f64)>>>,
    snapshots: HashMap<String, Expiring<LeaderboardSnapshot>>,
    due: BTreeMap<String, u64>,
}

#[derive(Default)]
pub struct MemoryPollStore {
    inner: Mutex<Inner>,
}

impl MemoryPollStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("Store mutex poisoned!")
    }
}

#[async_trait]
impl PollStore for MemoryPollStore {
    async fn create_poll(&self, poll: &Poll, retention_secs: u64) -> Result<(), AppError> {
        let now = now_unix_secs();
        let zeroed: BTreeMap<String, u64> = poll.options.keys().map(|k| (k.clone(), 0)).collect();

        let mut inner = self.lock();
        inner.polls.insert(
            poll.poll_id.clone(),
            Expiring::new(poll.clone(), now, retention_secs),
        );
        inner.tallies.insert(
            poll.poll_id.clone(),
            Expiring::new(zeroed, now, retention_secs),
        );

        Ok(())
    }

    async fn fetch_poll(&self, poll_id: &str) -> Result<Option<Poll>, AppError> {
        let now = now_unix_secs();
        let inner = self.lock();

        Ok(inner
            .polls
            .get(poll_id)
            .and_then(|slot| slot.live(now))
            .cloned())
    }

    async fn add_answered(
        &self,
        poll_id: &str,
        participant_id: &str,
        retention_secs: u64,
    ) -> Result<bool, AppError> {
        let now = now_unix_secs();
        let mut inner = self.lock();

        let slot = inner
            .answered
            .entry(poll_id.to_string())
            .and_modify(|slot| {
                if slot.live(now).is_none() {
                    slot.value.clear();
                }
                slot.expires_at = now + retention_secs;
            })
            .or_insert_with(|| Expiring::new(HashSet::new(), now, retention_secs));

        Ok(slot.value.insert(participant_id.to_string()))
    }

    async fn record_vote(
        &self,
        poll_id: &str,
        participant_id: &str,
        record: &ParticipantRecord,
        retention_secs: u64,
    ) -> Result<(), AppError> {
        let now = now_unix_secs();
        let mut inner = self.lock();

        let tally = inner
            .tallies
            .entry(poll_id.to_string())
            .or_insert_with(|| Expiring::new(BTreeMap::new(), now, retention_secs));
        *tally
            .value
            .entry(record.selected_option.clone())
            .or_insert(0) += 1;

        inner.participants.insert(
            (poll_id.to_string(), participant_id.to_string()),
            Expiring::new(record.clone(), now, retention_secs),
        );

        if record.is_correct {
            let slot = inner
                .rankings
                .entry(poll_id.to_string())
                .and_modify(|slot| slot.expires_at = now + retention_secs)
                .or_insert_with(|| Expiring::new(Vec::new(), now, retention_secs));

            // Stable for equal scores: the earlier vote keeps the lower rank.
            let ranking = &mut slot.value;
            let pos = ranking
                .iter()
                .position(|(_, time)| *time > record.response_time)
                .unwrap_or(ranking.len());
            ranking.insert(pos, (participant_id.to_string(), record.response_time));
        }

        Ok(())
    }

    async fn fetch_participant(
        &self,
        poll_id: &str,
        participant_id: &str,
    ) -> Result<Option<ParticipantRecord>, AppError> {
        let now = now_unix_secs();
        let inner = self.lock();

        Ok(inner
            .participants
            .get(&(poll_id.to_string(), participant_id.to_string()))
            .and_then(|slot| slot.live(now))
            .cloned())
    }

    async fn tally(&self, poll_id: &str) -> Result<BTreeMap<String, u64>, AppError> {
        let now = now_unix_secs();
        let inner = self.lock();

        Ok(inner
            .tallies
            .get(poll_id)
            .and_then(|slot| slot.live(now))
            .cloned()
            .unwrap_or_default())
    }

    async fn ranking_top(
        &self,
        poll_id: &str,
        limit: usize,
    ) -> Result<Vec<(String, f64)>, AppError> {
        let now = now_unix_secs();
        let inner = self.lock();

        Ok(inner
            .rankings
            .get(poll_id)
            .and_then(|slot| slot.live(now))
            .map(|ranking| ranking.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn store_snapshot(
        &self,
        poll_id: &str,
        snapshot: &LeaderboardSnapshot,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        let now = now_unix_secs();
        let mut inner = self.lock();
        inner.snapshots.insert(
            poll_id.to_string(),
            Expiring::new(snapshot.clone(), now, ttl_secs),
        );

        Ok(())
    }

    async fn fetch_snapshot(
        &self,
        poll_id: &str,
    ) -> Result<Option<LeaderboardSnapshot>, AppError> {
        let now = now_unix_secs();
        let inner = self.lock();

        Ok(inner
            .snapshots
            .get(poll_id)
            .and_then(|slot| slot.live(now))
            .cloned())
    }

    async fn arm_finalization(&self, poll_id: &str, due_at: u64) -> Result<(), AppError> {
        let mut inner = self.lock();
        inner.due.insert(poll_id.to_string(), due_at);

        Ok(())
    }

    async fn due_finalizations(&self, now: u64, limit: usize) -> Result<Vec<String>, AppError> {
        let inner = self.lock();

        let mut due: Vec<(&String, &u64)> = inner
            .due
            .iter()
            .filter(|(_, due_at)| **due_at <= now)
            .collect();
        due.sort_by_key(|(_, due_at)| **due_at);

        Ok(due
            .into_iter()
            .take(limit)
            .map(|(poll_id, _)| poll_id.clone())
            .collect())
    }

    async fn claim_finalization(&self, poll_id: &str) -> Result<bool, AppError> {
        let mut inner = self.lock();

        Ok(inner.due.remove(poll_id).is_some())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

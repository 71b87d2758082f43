//! # Redis
//!
//! RAM database backing [`PollStore`] in production.
//!
//! Core purpose is to share poll state between worker processes: lookups of
//! poll metadata, atomic vote deduplication, atomic tally increments, and the
//! response-time ranking.
//!
//! ## Requirements
//!
//! - Fast lookups, small per-poll dataset
//! - Atomic `SADD` (one vote per participant) and `ZREM` (one finalize per
//!   poll) as the only cross-worker synchronization
//! - TTLs on every key so a poll's footprint disappears after its retention
//!
//! ## Implementation
//!
//! - One hash per poll for metadata, one for tallies (`HINCRBY` assumes 0
//!   when the field is missing)
//! - One set per poll for the answered participants
//! - One sorted set per poll for the correct-answer ranking, scored by
//!   response time
//! - A global sorted set of finalize deadlines, scored by due time, swept by
//!   the scheduler

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::warn;

use super::PollStore;
use crate::{
    error::AppError,
    poll::{LeaderboardSnapshot, ParticipantRecord, Poll},
};

pub async fn init_redis(redis_url: &str) -> ConnectionManager {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url).unwrap();

    client
        .get_connection_manager_with_config(config)
        .await
        .unwrap()
}

fn meta_key(poll_id: &str) -> String {
    format!("Poll:{poll_id}:meta")
}

fn votes_key(poll_id: &str) -> String {
    format!("Poll:{poll_id}:votes")
}

fn answered_key(poll_id: &str) -> String {
    format!("Poll:{poll_id}:users_answered")
}

fn participant_key(poll_id: &str, participant_id: &str) -> String {
    format!("Poll:{poll_id}:user:{participant_id}")
}

fn ranking_key(poll_id: &str) -> String {
    format!("Poll:{poll_id}:leaderboard")
}

fn snapshot_key(poll_id: &str) -> String {
    format!("Poll:{poll_id}:final_leaderboard")
}

const DUE_KEY: &str = "polls:due";

/// `EXPIRE` takes a signed count and treats negatives as delete-now.
fn expire_secs(retention_secs: u64) -> i64 {
    i64::try_from(retention_secs).unwrap_or(i64::MAX)
}

#[derive(Clone)]
pub struct RedisPollStore {
    conn: ConnectionManager,
}

impl RedisPollStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

fn poll_from_fields(poll_id: &str, mut fields: HashMap<String, String>) -> Option<Poll> {
    let correct_option = fields.remove("correct_option")?;
    let created_at = fields.get("created_at").and_then(|v| v.parse().ok())?;
    let validity_seconds = fields.get("validity_seconds").and_then(|v| v.parse().ok())?;

    let options = match fields.remove("options") {
        Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Malformed options for poll {poll_id}: {e}");
            BTreeMap::new()
        }),
        None => BTreeMap::new(),
    };

    Some(Poll {
        poll_id: poll_id.to_string(),
        question: fields.remove("question").unwrap_or_default(),
        options,
        correct_option,
        created_at,
        validity_seconds,
    })
}

fn participant_from_fields(mut fields: HashMap<String, String>) -> Option<ParticipantRecord> {
    let selected_option = fields.remove("selected_option")?;
    let is_correct = fields.get("is_correct").is_some_and(|v| v == "true");
    let response_time = fields
        .get("response_time")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0);

    Some(ParticipantRecord {
        selected_option,
        is_correct,
        response_time,
    })
}

#[async_trait]
impl PollStore for RedisPollStore {
    async fn create_poll(&self, poll: &Poll, retention_secs: u64) -> Result<(), AppError> {
        let options_json = serde_json::to_string(&poll.options).map_err(AppError::internal)?;
        let meta = [
            ("question", poll.question.clone()),
            ("options", options_json),
            ("correct_option", poll.correct_option.clone()),
            ("created_at", poll.created_at.to_string()),
            ("validity_seconds", poll.validity_seconds.to_string()),
        ];
        let zeroed: Vec<(String, u64)> = poll.options.keys().map(|k| (k.clone(), 0)).collect();

        let mut conn = self.conn.clone();
        redis::pipe()
            .hset_multiple(meta_key(&poll.poll_id), &meta)
            .ignore()
            .expire(meta_key(&poll.poll_id), expire_secs(retention_secs))
            .ignore()
            .hset_multiple(votes_key(&poll.poll_id), &zeroed)
            .ignore()
            .expire(votes_key(&poll.poll_id), expire_secs(retention_secs))
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn fetch_poll(&self, poll_id: &str) -> Result<Option<Poll>, AppError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(meta_key(poll_id)).await?;

        Ok(poll_from_fields(poll_id, fields))
    }

    async fn add_answered(
        &self,
        poll_id: &str,
        participant_id: &str,
        retention_secs: u64,
    ) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let (added,): (i64,) = redis::pipe()
            .sadd(answered_key(poll_id), participant_id)
            .expire(answered_key(poll_id), expire_secs(retention_secs))
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(added == 1)
    }

    async fn record_vote(
        &self,
        poll_id: &str,
        participant_id: &str,
        record: &ParticipantRecord,
        retention_secs: u64,
    ) -> Result<(), AppError> {
        let fields = [
            ("selected_option", record.selected_option.clone()),
            ("is_correct", record.is_correct.to_string()),
            ("response_time", record.response_time.to_string()),
        ];

        let mut pipe = redis::pipe();
        pipe.hincr(votes_key(poll_id), &record.selected_option, 1)
            .ignore()
            .hset_multiple(participant_key(poll_id, participant_id), &fields)
            .ignore()
            .expire(
                participant_key(poll_id, participant_id),
                expire_secs(retention_secs),
            )
            .ignore();

        if record.is_correct {
            pipe.zadd(ranking_key(poll_id), participant_id, record.response_time)
                .ignore()
                .expire(ranking_key(poll_id), expire_secs(retention_secs))
                .ignore();
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn).await?;

        Ok(())
    }

    async fn fetch_participant(
        &self,
        poll_id: &str,
        participant_id: &str,
    ) -> Result<Option<ParticipantRecord>, AppError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> =
            conn.hgetall(participant_key(poll_id, participant_id)).await?;

        Ok(participant_from_fields(fields))
    }

    async fn tally(&self, poll_id: &str) -> Result<BTreeMap<String, u64>, AppError> {
        let mut conn = self.conn.clone();
        let counts: BTreeMap<String, u64> = conn.hgetall(votes_key(poll_id)).await?;

        Ok(counts)
    }

    async fn ranking_top(
        &self,
        poll_id: &str,
        limit: usize,
    ) -> Result<Vec<(String, f64)>, AppError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let entries: Vec<(String, f64)> = conn
            .zrange_withscores(ranking_key(poll_id), 0, limit as isize - 1)
            .await?;

        Ok(entries)
    }

    async fn store_snapshot(
        &self,
        poll_id: &str,
        snapshot: &LeaderboardSnapshot,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        let json = serde_json::to_string(snapshot).map_err(AppError::internal)?;

        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(snapshot_key(poll_id), json, ttl_secs).await?;

        Ok(())
    }

    async fn fetch_snapshot(
        &self,
        poll_id: &str,
    ) -> Result<Option<LeaderboardSnapshot>, AppError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(snapshot_key(poll_id)).await?;

        Ok(match raw {
            Some(json) => Some(serde_json::from_str(&json).map_err(AppError::internal)?),
            None => None,
        })
    }

    async fn arm_finalization(&self, poll_id: &str, due_at: u64) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(DUE_KEY, poll_id, due_at).await?;

        Ok(())
    }

    async fn due_finalizations(&self, now: u64, limit: usize) -> Result<Vec<String>, AppError> {
        let mut conn = self.conn.clone();
        let due: Vec<String> = conn
            .zrangebyscore_limit(DUE_KEY, "-inf", now, 0, limit as isize)
            .await?;

        Ok(due)
    }

    async fn claim_finalization(&self, poll_id: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.zrem(DUE_KEY, poll_id).await?;

        Ok(removed == 1)
    }

    async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;

        Ok(())
    }
}

//! # Poll Model
//!
//! One poll is a single timed question with a single correct option.
//!
//! A poll record is written once at creation and never edited. Everything
//! else about its lifecycle is derived: the voting window is
//! `[created_at, created_at + validity_seconds)`, and the status is computed
//! from the clock and from whether a finalized leaderboard snapshot exists
//! for it.
//!
//! ## Status
//!
//! - `Open` while `now < created_at + validity_seconds`
//! - `Closed` once the window elapsed but no snapshot exists yet
//! - `Finalized` as soon as a snapshot exists (terminal; re-finalizing
//!   replaces the snapshot and stays `Finalized`)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Window length used when a creation request leaves the validity out.
pub const DEFAULT_VALIDITY_SECS: u64 = 60;

/// Longest accepted voting window, one week. Creation rejects anything
/// above it, which keeps every retention and deadline sum well inside
/// integer range.
pub const MAX_VALIDITY_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub poll_id: String,
    pub question: String,
    /// Option key (a small label like "1".."6") to display text.
    pub options: BTreeMap<String, String>,
    pub correct_option: String,
    /// Unix seconds.
    pub created_at: u64,
    pub validity_seconds: u64,
}

impl Poll {
    pub fn closes_at(&self) -> u64 {
        self.created_at.saturating_add(self.validity_seconds)
    }

    /// Seconds of voting window left, zero once the window elapsed.
    pub fn remaining_secs(&self, now: u64) -> u64 {
        self.closes_at().saturating_sub(now)
    }

    pub fn status(&self, now: u64, snapshot_exists: bool) -> PollStatus {
        if snapshot_exists {
            PollStatus::Finalized
        } else if now < self.closes_at() {
            PollStatus::Open
        } else {
            PollStatus::Closed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Open,
    Closed,
    Finalized,
}

/// What one participant answered on one poll. Written at most once; re-votes
/// are rejected before this record is ever touched again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub selected_option: String,
    pub is_correct: bool,
    /// Caller-supplied elapsed time, smaller is faster. Ranking fidelity
    /// depends on the client reporting this honestly.
    pub response_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Accepted,
    AlreadyAnswered,
    PollNotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub participant_id: String,
    /// 1-based position, fastest correct answer first.
    pub rank: u32,
    pub response_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub entries: Vec<LeaderboardEntry>,
    pub finalized_at: u64,
}

pub fn require_non_empty(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("Missing {field}")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll() -> Poll {
        Poll {
            poll_id: "p1".into(),
            question: "2+2?".into(),
            options: BTreeMap::from([("1".into(), "3".into()), ("2".into(), "4".into())]),
            correct_option: "2".into(),
            created_at: 1_000,
            validity_seconds: 60,
        }
    }

    #[test]
    fn open_while_window_running() {
        assert_eq!(poll().status(1_000, false), PollStatus::Open);
        assert_eq!(poll().status(1_059, false), PollStatus::Open);
    }

    #[test]
    fn closed_once_window_elapsed() {
        assert_eq!(poll().status(1_060, false), PollStatus::Closed);
        assert_eq!(poll().status(2_000, false), PollStatus::Closed);
    }

    #[test]
    fn finalized_wins_over_clock() {
        assert_eq!(poll().status(1_010, true), PollStatus::Finalized);
        assert_eq!(poll().status(2_000, true), PollStatus::Finalized);
    }

    #[test]
    fn remaining_clamps_to_zero() {
        assert_eq!(poll().remaining_secs(1_030), 30);
        assert_eq!(poll().remaining_secs(1_060), 0);
        assert_eq!(poll().remaining_secs(5_000), 0);
    }

    #[test]
    fn window_end_saturates_at_the_clock_ceiling() {
        let mut late = poll();
        late.created_at = u64::MAX - 10;
        late.validity_seconds = 100;

        assert_eq!(late.closes_at(), u64::MAX);
        assert_eq!(late.status(u64::MAX - 5, false), PollStatus::Open);
        assert_eq!(late.remaining_secs(u64::MAX - 5), 5);
    }

    #[test]
    fn non_empty_guard() {
        assert!(require_non_empty("u1", "participant_id").is_ok());
        assert!(require_non_empty("", "participant_id").is_err());
        assert!(require_non_empty("   ", "participant_id").is_err());
    }
}

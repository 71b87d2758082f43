use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    poll::{LeaderboardEntry, PollStatus, VoteOutcome},
    registry::NewPoll,
    state::AppState,
    utils::now_unix_secs,
};

#[derive(Serialize)]
pub struct CreatedPoll {
    pub poll_id: String,
}

pub async fn create_poll_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewPoll>,
) -> Result<impl IntoResponse, AppError> {
    let poll = state.registry.create(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedPoll {
            poll_id: poll.poll_id,
        }),
    ))
}

#[derive(Deserialize)]
pub struct VotePayload {
    pub participant_id: String,
    pub selected_option: String,
    pub response_time: f64,
}

#[derive(Serialize)]
pub struct VoteReply {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

pub async fn submit_vote_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
    Json(payload): Json<VotePayload>,
) -> Result<Json<VoteReply>, AppError> {
    let outcome = state
        .recorder
        .submit(
            &poll_id,
            &payload.participant_id,
            &payload.selected_option,
            payload.response_time,
        )
        .await?;

    match outcome {
        VoteOutcome::Accepted => Ok(Json(VoteReply {
            accepted: true,
            reason: None,
        })),
        VoteOutcome::AlreadyAnswered => Ok(Json(VoteReply {
            accepted: false,
            reason: Some("already_answered"),
        })),
        VoteOutcome::PollNotFound => Err(AppError::PollNotFound),
    }
}

#[derive(Deserialize, Default)]
pub struct PollQuery {
    pub participant_id: Option<String>,
}

/// Public view of a poll. The correct option stays server-side until clients
/// compare their answer against the leaderboard.
#[derive(Serialize)]
pub struct PollView {
    pub question: String,
    pub options: BTreeMap<String, String>,
    pub status: PollStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_answer: Option<String>,
}

pub async fn get_poll_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollView>, AppError> {
    let poll = state
        .store
        .fetch_poll(&poll_id)
        .await?
        .ok_or(AppError::PollNotFound)?;
    let snapshot_exists = state.store.fetch_snapshot(&poll_id).await?.is_some();

    let participant_answer = match &query.participant_id {
        Some(participant_id) => state
            .store
            .fetch_participant(&poll_id, participant_id)
            .await?
            .map(|record| record.selected_option),
        None => None,
    };

    let status = poll.status(now_unix_secs(), snapshot_exists);

    Ok(Json(PollView {
        question: poll.question,
        options: poll.options,
        status,
        participant_answer,
    }))
}

#[derive(Serialize)]
pub struct ResultsView {
    pub tally: BTreeMap<String, u64>,
}

pub async fn get_results_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
) -> Result<Json<ResultsView>, AppError> {
    if state.store.fetch_poll(&poll_id).await?.is_none() {
        return Err(AppError::PollNotFound);
    }

    let tally = state.store.tally(&poll_id).await?;

    Ok(Json(ResultsView { tally }))
}

#[derive(Serialize)]
pub struct LeaderboardView {
    pub entries: Vec<LeaderboardEntry>,
    pub finalized_at: u64,
}

pub async fn get_leaderboard_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
) -> Result<Json<LeaderboardView>, AppError> {
    let snapshot = state
        .builder
        .fetch(&poll_id)
        .await?
        .ok_or(AppError::LeaderboardNotReady)?;

    Ok(Json(LeaderboardView {
        entries: snapshot.entries,
        finalized_at: snapshot.finalized_at,
    }))
}

pub async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    state.store.ping().await?;

    Ok((StatusCode::OK, "OK"))
}

//! Full poll lifecycle over the in-memory store: create, vote, finalize,
//! read the leaderboard.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use pollboard::{
    leaderboard::LeaderboardBuilder,
    notifier::RecordingNotifier,
    poll::{PollStatus, VoteOutcome},
    registry::{NewPoll, PollRegistry},
    scheduler::FinalizationScheduler,
    store::{MemoryPollStore, PollStore},
    utils::now_unix_secs,
    votes::VoteRecorder,
};

struct Harness {
    store: Arc<MemoryPollStore>,
    notifier: Arc<RecordingNotifier>,
    registry: PollRegistry,
    recorder: VoteRecorder,
    builder: LeaderboardBuilder,
    scheduler: FinalizationScheduler,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryPollStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let builder = LeaderboardBuilder::new(store.clone(), 3_600);

    Harness {
        store: store.clone(),
        notifier: notifier.clone(),
        registry: PollRegistry::new(store.clone(), notifier, 120, 0),
        recorder: VoteRecorder::new(store.clone(), 120),
        builder: builder.clone(),
        scheduler: FinalizationScheduler::new(store, builder, Duration::from_secs(1)),
    }
}

fn quiz_poll(poll_id: &str, validity_seconds: u64) -> NewPoll {
    NewPoll {
        poll_id: Some(poll_id.into()),
        question: "2+2?".into(),
        options: BTreeMap::from([("1".into(), "3".into()), ("2".into(), "4".into())]),
        correct_option: "2".into(),
        validity_seconds: Some(validity_seconds),
        broadcast_target: "room-7".into(),
    }
}

#[tokio::test]
async fn create_vote_finalize_round() {
    let h = harness();

    let poll = h.registry.create(quiz_poll("p1", 60)).await.unwrap();
    assert_eq!(poll.poll_id, "p1");

    // The announcement went out without the answer.
    let events = h.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "room-7");
    assert_eq!(events[0].1.question, "2+2?");

    let outcome = h.recorder.submit("p1", "u1", "2", 5.2).await.unwrap();
    assert_eq!(outcome, VoteOutcome::Accepted);

    // Second attempt by the same participant bounces and changes nothing.
    let outcome = h.recorder.submit("p1", "u1", "1", 0.1).await.unwrap();
    assert_eq!(outcome, VoteOutcome::AlreadyAnswered);
    let tally = h.store.tally("p1").await.unwrap();
    assert_eq!(tally, BTreeMap::from([("1".into(), 0), ("2".into(), 1)]));

    let outcome = h.recorder.submit("p1", "u2", "2", 2.1).await.unwrap();
    assert_eq!(outcome, VoteOutcome::Accepted);

    let snapshot = h.builder.finalize("p1").await.unwrap();
    let ranked: Vec<(&str, u32, f64)> = snapshot
        .entries
        .iter()
        .map(|entry| (entry.participant_id.as_str(), entry.rank, entry.response_time))
        .collect();
    assert_eq!(ranked, vec![("u2", 1, 2.1), ("u1", 2, 5.2)]);

    let served = h.builder.fetch("p1").await.unwrap().unwrap();
    assert_eq!(served.entries, snapshot.entries);
}

#[tokio::test]
async fn sweep_finalizes_after_the_window_closes() {
    let h = harness();

    let poll = h.registry.create(quiz_poll("p1", 60)).await.unwrap();
    h.recorder.submit("p1", "u1", "2", 1.5).await.unwrap();

    // Window still open: nothing is due yet.
    assert_eq!(h.scheduler.sweep_once(poll.closes_at() - 1).await.unwrap(), 0);
    assert!(h.builder.fetch("p1").await.unwrap().is_none());

    assert_eq!(h.scheduler.sweep_once(poll.closes_at()).await.unwrap(), 1);
    let snapshot = h.builder.fetch("p1").await.unwrap().unwrap();
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.entries[0].participant_id, "u1");

    // The due entry is spent.
    assert_eq!(h.scheduler.sweep_once(poll.closes_at() + 60).await.unwrap(), 0);
}

#[tokio::test]
async fn status_moves_from_open_to_closed_to_finalized() {
    let h = harness();

    let poll = h.registry.create(quiz_poll("p1", 60)).await.unwrap();

    assert_eq!(poll.status(poll.created_at, false), PollStatus::Open);
    assert_eq!(poll.status(poll.closes_at() - 1, false), PollStatus::Open);
    assert_eq!(poll.status(poll.closes_at(), false), PollStatus::Closed);

    h.scheduler.sweep_once(poll.closes_at()).await.unwrap();
    let snapshot_exists = h.builder.fetch("p1").await.unwrap().is_some();
    assert_eq!(
        poll.status(poll.closes_at(), snapshot_exists),
        PollStatus::Finalized
    );

    // An early on-demand snapshot wins over the open window.
    assert_eq!(
        poll.status(poll.created_at, snapshot_exists),
        PollStatus::Finalized
    );
}

#[tokio::test]
async fn leaderboard_keeps_the_ten_fastest_correct_answers() {
    let h = harness();

    h.registry.create(quiz_poll("p1", 60)).await.unwrap();

    // Twelve correct answers and one wrong one.
    for i in 0..12 {
        let response_time = 20.0 - i as f64;
        h.recorder
            .submit("p1", &format!("u{i}"), "2", response_time)
            .await
            .unwrap();
    }
    h.recorder.submit("p1", "wrong", "1", 0.2).await.unwrap();

    let snapshot = h.builder.finalize("p1").await.unwrap();
    assert_eq!(snapshot.entries.len(), 10);

    // u11 answered in 9.0s, the fastest. u0 and u1 (20.0s, 19.0s) miss out.
    assert_eq!(snapshot.entries[0].participant_id, "u11");
    assert_eq!(snapshot.entries[0].rank, 1);
    assert_eq!(snapshot.entries[9].participant_id, "u2");
    assert_eq!(snapshot.entries[9].rank, 10);
    assert!(
        !snapshot
            .entries
            .iter()
            .any(|entry| entry.participant_id == "u0" || entry.participant_id == "wrong")
    );
}

#[tokio::test]
async fn concurrent_participants_each_count_once() {
    let h = harness();

    h.registry.create(quiz_poll("p1", 60)).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let recorder = h.recorder.clone();
        handles.push(tokio::spawn(async move {
            recorder
                .submit("p1", &format!("u{}", i % 10), "2", i as f64)
                .await
                .unwrap()
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() == VoteOutcome::Accepted {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 10);

    let tally = h.store.tally("p1").await.unwrap();
    assert_eq!(tally["2"], 10);
}

#[tokio::test]
async fn expired_poll_votes_are_rejected_once_keys_lapse() {
    let store = Arc::new(MemoryPollStore::new());
    let recorder = VoteRecorder::new(store.clone(), 0);

    let poll = pollboard::poll::Poll {
        poll_id: "p1".into(),
        question: "2+2?".into(),
        options: BTreeMap::from([("1".into(), "3".into()), ("2".into(), "4".into())]),
        correct_option: "2".into(),
        created_at: now_unix_secs(),
        validity_seconds: 60,
    };
    // Retention of zero mimics a poll whose keys have already expired.
    store.create_poll(&poll, 0).await.unwrap();

    let outcome = recorder.submit("p1", "u1", "2", 1.0).await.unwrap();
    assert_eq!(outcome, VoteOutcome::PollNotFound);
}

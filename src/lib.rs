//! Documentation of a timed multiple-choice poll service.
//!
//! Hosts create short-lived polls, participants get one vote each, and once a
//! poll's window closes the ten fastest correct answers are frozen into a
//! leaderboard.
//!
//!
//!
//! # General Flow
//! - Host POSTs a poll (question, options, answer, validity window)
//! - The poll is announced on a pub/sub channel so displays can render it
//! - Participants vote once; duplicates are rejected at the store, not here
//! - A background sweep finalizes each poll shortly after its window closes
//! - The frozen leaderboard is served until its key expires
//!
//!
//!
//! # Notes
//!
//! ## Redis
//! All poll state lives in Redis under `Poll:{id}:*` keys with explicit
//! expirations, so an idle instance converges to an empty keyspace without a
//! cleanup job.
//!
//! Vote deduplication rides on `SADD`: the first writer for a participant
//! gets 1 back, everyone else gets 0. No locks, no transactions.
//!
//! ## Finalization
//! Poll close times are kept in a `polls:due` sorted set instead of
//! per-process timers. A restart loses nothing: the next sweep picks up
//! whatever came due while the process was down. `ZREM` doubles as the claim
//! so two sweeping instances cannot finalize the same poll twice.
//!
//!
//!
//! # Setup
//!
//! Run a local Redis, then:
//! ```sh
//! cargo run
//! ```
//!
//! Every knob is an environment variable. See [`config::Config`].
use std::time::Duration;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod leaderboard;
pub mod notifier;
pub mod poll;
pub mod registry;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod utils;
pub mod votes;

use routes::{
    create_poll_handler, get_leaderboard_handler, get_poll_handler, get_results_handler,
    health_handler, submit_vote_handler,
};
use scheduler::FinalizationScheduler;
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting finalize sweep...");
    let scheduler = FinalizationScheduler::new(
        state.store.clone(),
        state.builder.clone(),
        Duration::from_secs(state.config.sweep_interval_secs),
    );
    tokio::spawn(scheduler.run());

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/polls", post(create_poll_handler))
        .route("/polls/{poll_id}", get(get_poll_handler))
        .route("/polls/{poll_id}/votes", post(submit_vote_handler))
        .route("/polls/{poll_id}/results", get(get_results_handler))
        .route("/polls/{poll_id}/leaderboard", get(get_leaderboard_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

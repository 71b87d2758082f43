use std::sync::Arc;

use crate::{
    config::Config,
    leaderboard::LeaderboardBuilder,
    notifier::{Notifier, RedisNotifier},
    registry::PollRegistry,
    store::{PollStore, RedisPollStore, init_redis},
    votes::VoteRecorder,
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn PollStore>,
    pub registry: PollRegistry,
    pub recorder: VoteRecorder,
    pub builder: LeaderboardBuilder,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let redis_connection = init_redis(&config.redis_url).await;
        let store: Arc<dyn PollStore> = Arc::new(RedisPollStore::new(redis_connection.clone()));
        let notifier: Arc<dyn Notifier> = Arc::new(RedisNotifier::new(redis_connection));

        Arc::new(Self::assemble(config, store, notifier))
    }

    /// Wire the components over any store and notifier pair. The server uses
    /// the Redis-backed ones; tests swap in the in-memory fakes.
    pub fn assemble(
        config: Config,
        store: Arc<dyn PollStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let retention_grace = config.retention_grace_secs();
        let registry = PollRegistry::new(
            store.clone(),
            notifier,
            retention_grace,
            config.finalize_delay_secs,
        );
        let recorder = VoteRecorder::new(store.clone(), retention_grace);
        let builder = LeaderboardBuilder::new(store.clone(), config.snapshot_ttl_secs);

        Self {
            config,
            store,
            registry,
            recorder,
            builder,
        }
    }
}

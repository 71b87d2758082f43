use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

/// Runtime knobs, all overridable through the environment. Every field has a
/// workable default so a bare `cargo run` against a local Redis just works.
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    /// Extra seconds poll keys outlive the voting window.
    pub grace_secs: u64,
    pub snapshot_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    /// Seconds past window close before the finalize sweep may claim a poll.
    /// Retention stretches by the same amount, see
    /// [`retention_grace_secs`](Config::retention_grace_secs).
    pub finalize_delay_secs: u64,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("POLL_PORT", "8080"),
            redis_url: try_load("POLL_REDIS_URL", "redis://127.0.0.1:6379"),
            grace_secs: try_load("POLL_GRACE_SECS", "120"),
            snapshot_ttl_secs: try_load("POLL_SNAPSHOT_TTL_SECS", "14400"),
            sweep_interval_secs: try_load("POLL_SWEEP_INTERVAL_SECS", "1"),
            finalize_delay_secs: try_load("POLL_FINALIZE_DELAY_SECS", "0"),
        }
    }

    /// Grace applied to key retention: the configured buffer plus the
    /// finalize delay. A poll's keys must outlive its due time, whatever the
    /// delay is set to, or the sweep would freeze an empty leaderboard.
    pub fn retention_grace_secs(&self) -> u64 {
        self.grace_secs.saturating_add(self.finalize_delay_secs)
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(grace_secs: u64, finalize_delay_secs: u64) -> Config {
        Config {
            port: 8080,
            redis_url: "redis://127.0.0.1:6379".into(),
            grace_secs,
            snapshot_ttl_secs: 14_400,
            sweep_interval_secs: 1,
            finalize_delay_secs,
        }
    }

    #[test]
    fn retention_grace_covers_the_finalize_delay() {
        assert_eq!(config(120, 0).retention_grace_secs(), 120);
        assert_eq!(config(120, 300).retention_grace_secs(), 420);
        assert_eq!(config(u64::MAX, 10).retention_grace_secs(), u64::MAX);
    }
}

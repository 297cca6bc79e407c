use std::time::Duration;

/// Sweep cadence loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Interval between finalize sweeps.
    pub finalize_interval_secs: u64,
    /// Interval between inactivity sweeps.
    pub inactivity_interval_secs: u64,
    /// Interval between reference price refreshes.
    pub price_refresh_interval_secs: u64,
    /// Time allowed for loops and event persistence to drain on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            finalize_interval_secs: 15,
            inactivity_interval_secs: 300,
            price_refresh_interval_secs: 1800,
            shutdown_timeout_secs: 30,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default |
    /// |-----------------------------------|---------|
    /// | `SWEEP_INTERVAL_SECS`             | `15`    |
    /// | `INACTIVITY_SWEEP_INTERVAL_SECS`  | `300`   |
    /// | `PRICE_REFRESH_INTERVAL_SECS`     | `1800`  |
    /// | `SHUTDOWN_TIMEOUT_SECS`           | `30`    |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            finalize_interval_secs: env_secs("SWEEP_INTERVAL_SECS", defaults.finalize_interval_secs),
            inactivity_interval_secs: env_secs(
                "INACTIVITY_SWEEP_INTERVAL_SECS",
                defaults.inactivity_interval_secs,
            ),
            price_refresh_interval_secs: env_secs(
                "PRICE_REFRESH_INTERVAL_SECS",
                defaults.price_refresh_interval_secs,
            ),
            shutdown_timeout_secs: env_secs("SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout_secs),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn env_secs(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid u64")),
        Err(_) => default,
    }
}

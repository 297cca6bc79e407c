use minebud_core::delta::WARMUP_WINDOW_SECS;
use minebud_core::operation::{DEFAULT_GRACE_PERIOD_SECS, INACTIVITY_THRESHOLD_SECS};

/// Default maximum age of a cached price before it is refetched: one day.
const DEFAULT_PRICE_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// Timing knobs for the lifecycle service.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Delay between an end request and finalization.
    pub grace_period_secs: i64,
    /// Idle time after which an active operation is ended.
    pub inactivity_threshold_secs: i64,
    /// Window during which deltas are withheld until enough captures exist.
    pub warmup_window_secs: i64,
    /// Cached prices older than this are refreshed after a capture.
    pub price_max_age_secs: i64,
}

impl LifecycleConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `GRACE_PERIOD_SECS`         | `5`     |
    /// | `INACTIVITY_THRESHOLD_SECS` | `7200`  |
    /// | `WARMUP_WINDOW_SECS`        | `120`   |
    /// | `PRICE_MAX_AGE_SECS`        | `86400` |
    pub fn from_env() -> Self {
        Self {
            grace_period_secs: env_i64("GRACE_PERIOD_SECS", DEFAULT_GRACE_PERIOD_SECS),
            inactivity_threshold_secs: env_i64(
                "INACTIVITY_THRESHOLD_SECS",
                INACTIVITY_THRESHOLD_SECS,
            ),
            warmup_window_secs: env_i64("WARMUP_WINDOW_SECS", WARMUP_WINDOW_SECS),
            price_max_age_secs: env_i64("PRICE_MAX_AGE_SECS", DEFAULT_PRICE_MAX_AGE_SECS),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            inactivity_threshold_secs: INACTIVITY_THRESHOLD_SECS,
            warmup_window_secs: WARMUP_WINDOW_SECS,
            price_max_age_secs: DEFAULT_PRICE_MAX_AGE_SECS,
        }
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid i64")),
        Err(_) => default,
    }
}

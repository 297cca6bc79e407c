/// Ledger API configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Market region searched for buy orders.
    pub region_id: i64,
    /// Station whose buy orders define the reference price.
    pub station_id: i64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Default ledger API base URL.
const DEFAULT_BASE_URL: &str = "https://esi.evetech.net/latest";
/// The Forge.
const DEFAULT_REGION_ID: i64 = 10000002;
/// Jita IV - Moon 4 - Caldari Navy Assembly Plant.
const DEFAULT_STATION_ID: i64 = 60003760;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

impl GatewayConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                          |
    /// |-----------------------|----------------------------------|
    /// | `LEDGER_BASE_URL`     | `https://esi.evetech.net/latest` |
    /// | `LEDGER_REGION_ID`    | `10000002`                       |
    /// | `LEDGER_STATION_ID`   | `60003760`                       |
    /// | `LEDGER_TIMEOUT_SECS` | `30`                             |
    pub fn from_env() -> Self {
        let base_url = std::env::var("LEDGER_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();

        let region_id: i64 = std::env::var("LEDGER_REGION_ID")
            .unwrap_or_else(|_| DEFAULT_REGION_ID.to_string())
            .parse()
            .expect("LEDGER_REGION_ID must be a valid i64");

        let station_id: i64 = std::env::var("LEDGER_STATION_ID")
            .unwrap_or_else(|_| DEFAULT_STATION_ID.to_string())
            .parse()
            .expect("LEDGER_STATION_ID must be a valid i64");

        let timeout_secs: u64 = std::env::var("LEDGER_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
            .parse()
            .expect("LEDGER_TIMEOUT_SECS must be a valid u64");

        Self {
            base_url,
            region_id,
            station_id,
            timeout_secs,
        }
    }

    /// Defaults pointed at an arbitrary base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            region_id: DEFAULT_REGION_ID,
            station_id: DEFAULT_STATION_ID,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

//! REST client for the ledger, market and type endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use minebud_core::delta::aggregate_readings;
use minebud_core::gateway::{GatewayError, LedgerAccount, LedgerGateway, LedgerReading};
use minebud_core::types::ResourceTypeId;

use crate::config::GatewayConfig;

/// Response header carrying the total page count of a paginated endpoint.
const PAGES_HEADER: &str = "x-pages";

/// Upper bound on pages fetched from one paginated endpoint.
const MAX_PAGES: u32 = 50;

/// One row of `GET /characters/{id}/mining/`.
#[derive(Debug, Clone, Deserialize)]
pub struct MiningLedgerEntry {
    pub type_id: ResourceTypeId,
    pub quantity: i64,
    #[serde(default)]
    pub solar_system_id: Option<i64>,
    #[serde(default)]
    pub date: Option<String>,
}

/// One row of `GET /markets/{region}/orders/`.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketOrder {
    pub location_id: i64,
    pub price: f64,
    #[serde(default)]
    pub is_buy_order: Option<bool>,
}

/// Subset of `GET /universe/types/{id}/`.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeInfo {
    pub name: String,
}

/// Errors from the HTTP layer, before they are folded into [`GatewayError`].
#[derive(Debug, thiserror::Error)]
pub enum LedgerApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("Ledger API error ({status}): {body}")]
    ApiError { status: u16, body: String },
}

impl From<LedgerApiError> for GatewayError {
    fn from(err: LedgerApiError) -> Self {
        match err {
            LedgerApiError::Request(e) if e.is_decode() => GatewayError::Decode(e.to_string()),
            LedgerApiError::Request(e) => GatewayError::Request(e.to_string()),
            LedgerApiError::ApiError { status, body } => GatewayError::Api { status, body },
        }
    }
}

/// HTTP client for the ledger API.
pub struct LedgerApi {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl LedgerApi {
    /// Build a client with the configured request timeout.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Fetch every page of the character's mining ledger.
    pub async fn mining_ledger(
        &self,
        character_id: i64,
        access_token: &str,
    ) -> Result<Vec<MiningLedgerEntry>, LedgerApiError> {
        let url = format!("{}/characters/{character_id}/mining/", self.config.base_url);
        self.all_pages(|| self.client.get(&url).bearer_auth(access_token))
            .await
    }

    /// Buy orders for a type across every page of the configured region.
    pub async fn buy_orders(&self, type_id: ResourceTypeId) -> Result<Vec<MarketOrder>, LedgerApiError> {
        let url = format!(
            "{}/markets/{}/orders/",
            self.config.base_url, self.config.region_id
        );
        let type_id = type_id.to_string();
        self.all_pages(|| {
            self.client
                .get(&url)
                .query(&[("order_type", "buy"), ("type_id", type_id.as_str())])
        })
        .await
    }

    pub async fn type_info(&self, type_id: ResourceTypeId) -> Result<TypeInfo, LedgerApiError> {
        let response = self
            .client
            .get(format!("{}/universe/types/{type_id}/", self.config.base_url))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Follow `x-pages` from page 1, up to [`MAX_PAGES`]. `request` builds
    /// the base request; the page number is appended per call.
    async fn all_pages<T, F>(&self, request: F) -> Result<Vec<T>, LedgerApiError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let response = request().query(&[("page", page)]).send().await?;
            let response = Self::ensure_success(response).await?;
            let pages = Self::page_count(&response);
            let batch: Vec<T> = response.json().await?;
            items.extend(batch);

            if page >= pages || page >= MAX_PAGES {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LedgerApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LedgerApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, LedgerApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    fn page_count(response: &reqwest::Response) -> u32 {
        response
            .headers()
            .get(PAGES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(1)
    }
}

/// Highest buy price among orders at `station_id`.
pub fn best_buy_at(orders: &[MarketOrder], station_id: i64) -> Option<f64> {
    orders
        .iter()
        .filter(|o| o.location_id == station_id && o.is_buy_order != Some(false))
        .map(|o| o.price)
        .fold(None, |best: Option<f64>, price| {
            Some(best.map_or(price, |b| b.max(price)))
        })
}

/// Collapse ledger entries (one per day and system) into one cumulative
/// reading per type.
pub fn readings_from_entries(entries: &[MiningLedgerEntry]) -> Vec<LedgerReading> {
    let raw: Vec<LedgerReading> = entries
        .iter()
        .map(|e| LedgerReading {
            resource_type_id: e.type_id,
            quantity: e.quantity,
        })
        .collect();
    aggregate_readings(&raw)
        .into_iter()
        .map(|(resource_type_id, quantity)| LedgerReading {
            resource_type_id,
            quantity,
        })
        .collect()
}

#[async_trait]
impl LedgerGateway for LedgerApi {
    async fn fetch_readings(
        &self,
        account: &LedgerAccount,
    ) -> Result<Vec<LedgerReading>, GatewayError> {
        let token = account
            .access_token
            .as_deref()
            .ok_or(GatewayError::MissingCredentials(account.external_id))?;
        let entries = self.mining_ledger(account.external_id, token).await?;
        tracing::debug!(
            external_id = account.external_id,
            entries = entries.len(),
            "Fetched mining ledger"
        );
        Ok(readings_from_entries(&entries))
    }

    async fn fetch_best_buy(&self, type_id: ResourceTypeId) -> Result<Option<f64>, GatewayError> {
        let orders = self.buy_orders(type_id).await?;
        Ok(best_buy_at(&orders, self.config.station_id))
    }

    async fn fetch_type_name(&self, type_id: ResourceTypeId) -> Result<String, GatewayError> {
        Ok(self.type_info(type_id).await?.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(location_id: i64, price: f64) -> MarketOrder {
        MarketOrder {
            location_id,
            price,
            is_buy_order: Some(true),
        }
    }

    #[test]
    fn test_best_buy_only_counts_reference_station() {
        let orders = [order(60003760, 10.0), order(60003760, 12.5), order(1, 99.0)];
        assert_eq!(best_buy_at(&orders, 60003760), Some(12.5));
    }

    #[test]
    fn test_best_buy_none_without_orders_at_station() {
        assert_eq!(best_buy_at(&[order(1, 5.0)], 60003760), None);
        assert_eq!(best_buy_at(&[], 60003760), None);
    }

    #[test]
    fn test_entries_summed_per_type() {
        let entries = [
            MiningLedgerEntry {
                type_id: 1230,
                quantity: 100,
                solar_system_id: Some(30000142),
                date: Some("2026-10-01".into()),
            },
            MiningLedgerEntry {
                type_id: 1230,
                quantity: 50,
                solar_system_id: Some(30000144),
                date: Some("2026-10-02".into()),
            },
            MiningLedgerEntry {
                type_id: 1228,
                quantity: 7,
                solar_system_id: None,
                date: None,
            },
        ];
        let readings = readings_from_entries(&entries);
        assert_eq!(
            readings,
            vec![
                LedgerReading { resource_type_id: 1228, quantity: 7 },
                LedgerReading { resource_type_id: 1230, quantity: 150 },
            ]
        );
    }
}

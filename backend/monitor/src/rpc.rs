//! toncenter v3 client: account states and DNS items.
//!
//! ## Resilience
//!
//! * Exponential back-off is applied on transport errors, rate-limit
//!   responses and 5xx statuses, up to [`MAX_BACKOFF_SECS`] seconds.
//! * A request is given up after [`MAX_ATTEMPTS`] tries; the poller retries
//!   on its next tick.

use std::time::Duration;

use base64::Engine;
use cron_protocol::Address;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{MonitorError, Result};

const MAX_BACKOFF_SECS: u64 = 60;
const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_ATTEMPTS: u32 = 5;
/// Addresses per `/accountStates` request.
const ACCOUNTS_PER_REQUEST: usize = 100;
const PAGE_LIMIT: &str = "1000";

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AccountStatesResponse {
    #[serde(default)]
    pub accounts: Vec<AccountState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountState {
    /// Raw form, e.g. `0:83DF…`
    pub address: String,
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Base64 representation hash of the code cell
    #[serde(default)]
    pub code_hash: Option<String>,
    #[serde(default)]
    pub data_boc: Option<String>,
}

impl AccountState {
    pub fn parsed_address(&self) -> Option<Address> {
        self.address.parse().ok()
    }

    pub fn balance_nano(&self) -> u128 {
        self.balance
            .as_deref()
            .and_then(|b| b.parse().ok())
            .unwrap_or(0)
    }

    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("active")
    }

    /// Active, carrying data, and running the code whose hash is `code_hash`.
    pub fn runs_code(&self, code_hash: &str) -> bool {
        self.is_active()
            && self.data_boc.is_some()
            && self
                .code_hash
                .as_deref()
                .is_some_and(|h| same_hash(h, code_hash))
    }
}

#[derive(Debug, Deserialize)]
pub struct NftItemsResponse {
    #[serde(default)]
    pub nft_items: Vec<NftItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NftItem {
    pub address: String,
    #[serde(default)]
    pub content: Option<Value>,
}

impl NftItem {
    /// Domain name as resolved by the indexer, e.g. `example.ton`.
    pub fn domain_name(&self) -> Option<&str> {
        self.content.as_ref()?.get("domain")?.as_str()
    }
}

/// Compare base64 hashes regardless of alphabet and padding.
fn same_hash(a: &str, b: &str) -> bool {
    match (decode_hash(a), decode_hash(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn decode_hash(text: &str) -> Option<Vec<u8>> {
    let engine = base64::engine::general_purpose::STANDARD_NO_PAD;
    let normalized: String = text
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    engine.decode(normalized).ok()
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TonCenterClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TonCenterClient {
    pub fn new(client: Client, base_url: &str, api_key: Option<String>) -> Self {
        TonCenterClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Account states with `data_boc` for every address.
    ///
    /// Accounts the indexer has never seen are simply missing from the result.
    pub async fn fetch_account_states(&self, addresses: &[Address]) -> Result<Vec<AccountState>> {
        let mut accounts = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(ACCOUNTS_PER_REQUEST) {
            let joined = chunk
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let page: AccountStatesResponse = self
                .get_json(
                    "accountStates",
                    &[
                        ("address", joined.as_str()),
                        ("include_boc", "true"),
                        ("limit", PAGE_LIMIT),
                    ],
                )
                .await?;
            accounts.extend(page.accounts);
        }
        debug!(
            "Fetched {} account states for {} addresses",
            accounts.len(),
            addresses.len()
        );
        Ok(accounts)
    }

    /// DNS items of `collection` currently held by `owner`.
    pub async fn fetch_domains_by_owner(
        &self,
        collection: &Address,
        owner: &Address,
    ) -> Result<Vec<NftItem>> {
        let collection = collection.to_string();
        let owner = owner.to_string();
        let page: NftItemsResponse = self
            .get_json(
                "nft/items",
                &[
                    ("collection_address", collection.as_str()),
                    ("owner_address", owner.as_str()),
                    ("limit", PAGE_LIMIT),
                ],
            )
            .await?;
        debug!("Fetched {} DNS items for {owner}", page.nft_items.len());
        Ok(page.nft_items)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{path}", self.base_url);
        let mut backoff = INITIAL_BACKOFF_SECS;
        let mut attempt = 1;

        loop {
            let mut request = self.client.get(&url).query(query);
            if let Some(key) = &self.api_key {
                request = request.header("X-API-Key", key);
            }

            let retry_reason = match request.send().await {
                Err(e) => format!("request failed: {e}"),
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        "rate-limited".to_string()
                    } else if status.is_server_error() {
                        format!("server error {status}")
                    } else if !status.is_success() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(MonitorError::Api(format!("{path}: {status} {body}")));
                    } else {
                        return Ok(resp.json().await?);
                    }
                }
            };

            if attempt >= MAX_ATTEMPTS {
                return Err(MonitorError::Api(format!(
                    "{path}: giving up after {attempt} attempts ({retry_reason})"
                )));
            }
            warn!("toncenter {path} {retry_reason} (will retry in {backoff}s)");
            tokio::time::sleep(Duration::from_secs(backoff)).await;
            backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
            attempt += 1;
        }
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

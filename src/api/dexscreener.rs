use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::TokenSource;
use crate::models::{PairSnapshot, TokensResponse};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; hot-pairs-bot)";

#[derive(Debug, Clone)]
pub struct DexScreenerClient {
    base_url: String,
    client: Client,
}

impl DexScreenerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .build()
                .context("Failed to create HTTP client for DexScreener")?,
        })
    }

    /// Fetches every pair the API knows for `token_address`.
    /// Transport errors, non-success statuses and unparseable bodies all yield `None`.
    pub async fn fetch_raw(&self, token_address: &str) -> Option<TokensResponse> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, token_address.trim());
        debug!("Fetching pairs from DexScreener for {}: {}", token_address, url);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("DexScreener request failed for {}: {}", token_address, e);
                return None;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("DexScreener API error for token {}: {} - {}", token_address, status, error_text);
            return None;
        }

        match response.json::<TokensResponse>().await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Failed to parse DexScreener response for {}: {:?}; ignoring", token_address, e);
                None
            }
        }
    }

    /// Highest-liquidity pair for `token_address` on any chain whose id contains `chain_id`.
    pub async fn fetch_best(&self, chain_id: &str, token_address: &str) -> Option<PairSnapshot> {
        let raw = self.fetch_raw(token_address).await?;
        select_best_pair(raw.into_pairs(), Some(chain_id))
    }
}

#[async_trait]
impl TokenSource for DexScreenerClient {
    async fn fetch_pair(&self, address: &str, chain_hint: Option<&str>) -> Option<PairSnapshot> {
        let raw = self.fetch_raw(address).await?;
        select_best_pair(raw.into_pairs(), chain_hint)
    }
}

/// Keeps pairs on `chain` (all pairs when `None`) and returns the one with the most USD
/// liquidity. Missing liquidity counts as zero; on a tie the earlier pair wins.
pub fn select_best_pair(pairs: Vec<PairSnapshot>, chain: Option<&str>) -> Option<PairSnapshot> {
    pairs
        .into_iter()
        .filter(|p| chain.map_or(true, |c| p.is_on_chain(c)))
        .fold(None, |best: Option<PairSnapshot>, pair| match best {
            Some(current)
                if current.liquidity_usd().unwrap_or(0.0) >= pair.liquidity_usd().unwrap_or(0.0) =>
            {
                Some(current)
            }
            _ => Some(pair),
        })
}

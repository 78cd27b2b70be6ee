use async_trait::async_trait;

use crate::models::PairSnapshot;

pub mod dexscreener;

/// Where the token monitor and order activation get fresh pair data from.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Current best pair for `address`, restricted to `chain_hint` when given.
    /// `None` covers every failure: network, status, empty pair list.
    async fn fetch_pair(&self, address: &str, chain_hint: Option<&str>) -> Option<PairSnapshot>;
}

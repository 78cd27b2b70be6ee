use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

/// Body of `GET /latest/dex/tokens/{address}`.
/// DexScreener answers `"pairs": null` for unknown tokens. A pair that cannot
/// be read is dropped on its own; the rest of the list is kept.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TokensResponse {
    #[serde(default, deserialize_with = "lenient_pairs")]
    pub pairs: Option<Vec<PairSnapshot>>,
}

impl TokensResponse {
    pub fn into_pairs(self) -> Vec<PairSnapshot> {
        self.pairs.unwrap_or_default()
    }
}

/// One market for a token as reported by the quote API, captured verbatim.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PairSnapshot {
    #[serde(default, deserialize_with = "lenient")]
    pub chain_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub dex_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub pair_address: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub base_token: Option<BaseToken>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub price_change: Option<PriceChange>,
    #[serde(default, deserialize_with = "lenient")]
    pub volume: Option<Volume>,
    #[serde(default, deserialize_with = "lenient")]
    pub liquidity: Option<Liquidity>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fdv: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub info: Option<PairInfo>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct BaseToken {
    #[serde(default, deserialize_with = "lenient")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub symbol: Option<String>,
}

/// Percent changes over the trailing windows.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct PriceChange {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h6: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h24: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Volume {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h24: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Liquidity {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub usd: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PairInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub websites: Vec<Website>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub socials: Vec<Social>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Website {
    #[serde(default, deserialize_with = "lenient")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Social {
    #[serde(default, rename = "type", alias = "platform", deserialize_with = "lenient")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
}

impl PairSnapshot {
    pub fn symbol(&self) -> &str {
        self.base_token
            .as_ref()
            .and_then(|t| t.symbol.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn name(&self) -> &str {
        self.base_token
            .as_ref()
            .and_then(|t| t.name.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn token_address(&self) -> &str {
        self.base_token
            .as_ref()
            .and_then(|t| t.address.as_deref())
            .unwrap_or("N/A")
    }

    pub fn chain(&self) -> &str {
        self.chain_id.as_deref().unwrap_or("Unknown")
    }

    pub fn change_h1(&self) -> Option<f64> {
        self.price_change.as_ref().and_then(|c| c.h1)
    }

    pub fn change_h6(&self) -> Option<f64> {
        self.price_change.as_ref().and_then(|c| c.h6)
    }

    pub fn change_h24(&self) -> Option<f64> {
        self.price_change.as_ref().and_then(|c| c.h24)
    }

    pub fn volume_h24(&self) -> Option<f64> {
        self.volume.as_ref().and_then(|v| v.h24)
    }

    pub fn liquidity_usd(&self) -> Option<f64> {
        self.liquidity.as_ref().and_then(|l| l.usd)
    }

    pub fn image_url(&self) -> Option<&str> {
        self.info
            .as_ref()
            .and_then(|i| i.image_url.as_deref())
            .filter(|u| !u.is_empty())
    }

    /// Does this pair trade on `chain_id`? Case-insensitive substring match.
    pub fn is_on_chain(&self, chain_id: &str) -> bool {
        self.chain_id
            .as_deref()
            .map(|c| c.to_lowercase().contains(&chain_id.to_lowercase()))
            .unwrap_or(false)
    }
}

/// Any value of the wrong shape is treated as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// `null` or a non-array is an empty list; unreadable elements are skipped.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Ok(items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

fn lenient_pairs<'de, D>(deserializer: D) -> Result<Option<Vec<PairSnapshot>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Ok(Some(
            items
                .into_iter()
                .filter_map(|v| match serde_json::from_value::<PairSnapshot>(v) {
                    Ok(pair) => Some(pair),
                    Err(e) => {
                        debug!("Dropping unreadable pair: {}", e);
                        None
                    }
                })
                .collect(),
        )),
        Some(Value::Null) | None => Ok(None),
        Some(other) => {
            debug!("Ignoring pairs field of unexpected type: {}", other);
            Ok(None)
        }
    }
}

/// Accept a JSON number or a numeric string; anything else is treated as absent.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
    .filter(|n| n.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "schemaVersion": "1.0.0",
        "pairs": [{
            "chainId": "solana",
            "dexId": "raydium",
            "url": "https://dexscreener.com/solana/pair1",
            "pairAddress": "pair1",
            "baseToken": {"address": "Mint111", "name": "Test Token", "symbol": "TEST"},
            "priceUsd": "0.00001234",
            "priceChange": {"h1": 12.5, "h6": -3, "h24": "7.25"},
            "volume": {"h24": 1500.5},
            "liquidity": {"usd": 42000},
            "marketCap": 1200000,
            "fdv": 1300000,
            "info": {
                "imageUrl": "https://cdn.example/logo.png",
                "websites": [{"label": "Website", "url": "https://test.example"}],
                "socials": [{"type": "twitter", "url": "https://x.com/test"}]
            }
        }]
    }"#;

    #[test]
    fn test_parses_upstream_field_names() {
        let response: TokensResponse = serde_json::from_str(SAMPLE).unwrap();
        let pairs = response.into_pairs();
        assert_eq!(pairs.len(), 1);

        let pair = &pairs[0];
        assert_eq!(pair.symbol(), "TEST");
        assert_eq!(pair.chain(), "solana");
        assert_eq!(pair.price_usd, Some(0.00001234));
        assert_eq!(pair.change_h1(), Some(12.5));
        assert_eq!(pair.change_h6(), Some(-3.0));
        assert_eq!(pair.change_h24(), Some(7.25));
        assert_eq!(pair.volume_h24(), Some(1500.5));
        assert_eq!(pair.liquidity_usd(), Some(42000.0));
        assert_eq!(pair.image_url(), Some("https://cdn.example/logo.png"));
        assert_eq!(pair.info.as_ref().unwrap().socials[0].kind.as_deref(), Some("twitter"));
    }

    #[test]
    fn test_null_pairs_is_empty() {
        let response: TokensResponse =
            serde_json::from_str(r#"{"schemaVersion":"1.0.0","pairs":null}"#).unwrap();
        assert!(response.into_pairs().is_empty());
    }

    #[test]
    fn test_garbage_numbers_become_absent() {
        let pair: PairSnapshot = serde_json::from_str(
            r#"{"priceUsd": "n/a", "priceChange": {"h1": true}, "volume": {}, "marketCap": null}"#,
        )
        .unwrap();
        assert_eq!(pair.price_usd, None);
        assert_eq!(pair.change_h1(), None);
        assert_eq!(pair.volume_h24(), None);
        assert_eq!(pair.market_cap, None);
        assert_eq!(pair.symbol(), "Unknown");
        assert_eq!(pair.token_address(), "N/A");
    }

    #[test]
    fn test_null_link_lists_are_empty() {
        let pair: PairSnapshot = serde_json::from_str(
            r#"{"chainId": "solana", "info": {"imageUrl": "https://cdn.example/a.png", "websites": null, "socials": null}}"#,
        )
        .unwrap();
        let info = pair.info.as_ref().unwrap();
        assert!(info.websites.is_empty());
        assert!(info.socials.is_empty());
        assert_eq!(pair.image_url(), Some("https://cdn.example/a.png"));
    }

    #[test]
    fn test_wrongly_typed_fields_become_absent() {
        let pair: PairSnapshot = serde_json::from_str(
            r#"{
                "chainId": 56,
                "baseToken": {"symbol": 123, "name": "Kept", "address": ["x"]},
                "priceChange": "up",
                "info": {"websites": {"url": "https://a.example"}, "socials": [42, {"type": "telegram", "url": "https://t.me/ok"}]}
            }"#,
        )
        .unwrap();
        assert_eq!(pair.chain_id, None);
        assert_eq!(pair.symbol(), "Unknown");
        assert_eq!(pair.name(), "Kept");
        assert_eq!(pair.token_address(), "N/A");
        assert_eq!(pair.change_h1(), None);
        let info = pair.info.as_ref().unwrap();
        assert!(info.websites.is_empty());
        assert_eq!(info.socials.len(), 1);
        assert_eq!(info.socials[0].url.as_deref(), Some("https://t.me/ok"));
    }

    #[test]
    fn test_one_bad_pair_keeps_the_others() {
        let response: TokensResponse = serde_json::from_str(
            r#"{"pairs": [
                {"chainId": "solana", "pairAddress": "good", "baseToken": {"symbol": "GOOD"}},
                {"chainId": "solana", "pairAddress": "odd", "baseToken": {"symbol": 123}},
                "not a pair",
                {"chainId": "solana", "pairAddress": "nulls", "info": {"websites": null, "socials": null}}
            ]}"#,
        )
        .unwrap();
        let pairs = response.into_pairs();
        let addresses: Vec<_> = pairs.iter().filter_map(|p| p.pair_address.as_deref()).collect();
        assert_eq!(addresses, vec!["good", "odd", "nulls"]);
        assert_eq!(pairs[0].symbol(), "GOOD");
        assert_eq!(pairs[1].symbol(), "Unknown");

        let odd: TokensResponse = serde_json::from_str(r#"{"pairs": {"oops": true}}"#).unwrap();
        assert!(odd.into_pairs().is_empty());
    }

    #[test]
    fn test_chain_match_is_case_insensitive_substring() {
        let pair = PairSnapshot {
            chain_id: Some("Solana".to_string()),
            ..Default::default()
        };
        assert!(pair.is_on_chain("solana"));
        assert!(pair.is_on_chain("SOL"));
        assert!(!pair.is_on_chain("bsc"));
        assert!(!PairSnapshot::default().is_on_chain("solana"));
    }
}

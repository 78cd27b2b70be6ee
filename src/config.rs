use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::HotPairsError;
use crate::models::Package;
use crate::tracking::{AlertRules, BuyAlertPolicy, MonitorConfig};

pub const DEFAULT_DEXSCREENER_URL: &str = "https://api.dexscreener.com";
const DEFAULT_MARKET_FILE: &str = "config/market.toml";
const DEFAULT_FOOTER: &str = "\n\n🌐 Hot Pairs Bot • Premium Visibility";

/// How a submitted transaction id turns into an activation.
#[derive(Clone, Debug, PartialEq)]
pub enum VerificationMode {
    /// An admin presses Activate on the review ticket.
    Manual,
    /// The order activates on its own after the delay.
    Timer(Duration),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub admin_ids: Vec<i64>,
    pub broadcast_chat_id: i64,
    pub support_handle: String,
    pub post_footer: String,

    pub dexscreener_base_url: String,
    pub http_timeout_secs: u64,

    pub monitor: MonitorConfig,
    pub verification: VerificationMode,
    pub market: MarketTables,
}

impl Config {
    pub fn load() -> Result<Self> {
        let admin_ids = parse_id_list(
            &env::var("TELEGRAM_ADMIN_IDS").context("TELEGRAM_ADMIN_IDS not set in environment")?,
        )
        .context("Failed to parse TELEGRAM_ADMIN_IDS as comma separated integers")?;

        let buy_alert_policy = match env::var("BUY_ALERT_POLICY")
            .unwrap_or_else(|_| "minimum".to_string())
            .to_lowercase()
            .as_str()
        {
            "always" => BuyAlertPolicy::Always,
            "minimum" => BuyAlertPolicy::MinimumUsd(
                env::var("MIN_BUY_USD")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .context("Failed to parse MIN_BUY_USD")?,
            ),
            other => {
                return Err(HotPairsError::ConfigError(format!(
                    "BUY_ALERT_POLICY must be 'always' or 'minimum', got '{}'",
                    other
                ))
                .into())
            }
        };

        let monitor = MonitorConfig {
            poll_interval: Duration::from_secs(
                env::var("POLL_INTERVAL_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            ),
            max_concurrent_fetches: env::var("MAX_CONCURRENT_FETCHES")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .unwrap_or(8),
            rules: AlertRules {
                pump_threshold_pct: env::var("PUMP_THRESHOLD_PCT")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .context("Failed to parse PUMP_THRESHOLD_PCT")?,
                dump_threshold_pct: env::var("DUMP_THRESHOLD_PCT")
                    .unwrap_or_else(|_| "-10".to_string())
                    .parse()
                    .context("Failed to parse DUMP_THRESHOLD_PCT")?,
                buy_alert_policy,
            },
        };
        validate_monitor(&monitor)?;

        let verification = match env::var("VERIFICATION_MODE")
            .unwrap_or_else(|_| "manual".to_string())
            .to_lowercase()
            .as_str()
        {
            "timer" => VerificationMode::Timer(Duration::from_secs(
                env::var("VERIFICATION_DELAY_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            )),
            _ => VerificationMode::Manual,
        };

        let market_file =
            env::var("HOTPAIRS_MARKET_FILE").unwrap_or_else(|_| DEFAULT_MARKET_FILE.to_string());

        Ok(Self {
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .context("TELEGRAM_BOT_TOKEN not set in environment")?,
            admin_ids,
            broadcast_chat_id: env::var("BROADCAST_CHAT_ID")
                .context("BROADCAST_CHAT_ID not set in environment")?
                .trim()
                .parse()
                .context("Failed to parse BROADCAST_CHAT_ID as integer")?,
            support_handle: env::var("SUPPORT_HANDLE")
                .unwrap_or_else(|_| "@HotPairs_Support".to_string()),
            post_footer: env::var("POST_FOOTER").unwrap_or_else(|_| DEFAULT_FOOTER.to_string()),

            dexscreener_base_url: env::var("DEXSCREENER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_DEXSCREENER_URL.to_string()),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            monitor,
            verification,
            market: MarketTables::load(&market_file)?,
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

fn validate_monitor(monitor: &MonitorConfig) -> Result<(), HotPairsError> {
    if monitor.poll_interval.is_zero() {
        return Err(HotPairsError::ConfigError(
            "POLL_INTERVAL_SECS must be at least 1".to_string(),
        ));
    }
    if monitor.rules.dump_threshold_pct >= monitor.rules.pump_threshold_pct {
        return Err(HotPairsError::ConfigError(
            "DUMP_THRESHOLD_PCT must be below PUMP_THRESHOLD_PCT".to_string(),
        ));
    }
    Ok(())
}

fn parse_id_list(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().with_context(|| format!("invalid id '{}'", s)))
        .collect()
}

// --- Market tables ---

/// A network customers can buy a placement on.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct NetworkConfig {
    /// Key used in callback data, e.g. `solana`
    pub key: String,
    /// Chain identifier as reported by the quote API
    pub chain_id: String,
    pub display_name: String,
    pub emoji: String,
    /// Asset the placement is paid in, e.g. `SOL`
    pub payment_unit: String,
    /// Wallet payments are sent to; empty disables the network at checkout
    #[serde(default)]
    pub wallet: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MarketTables {
    pub networks: Vec<NetworkConfig>,
    /// USD price of one payment unit. Keys compare case-insensitively.
    pub unit_prices_usd: HashMap<String, f64>,
    pub packages: Vec<Package>,
}

impl Default for MarketTables {
    fn default() -> Self {
        let network = |key: &str, name: &str, emoji: &str, unit: &str| NetworkConfig {
            key: key.to_string(),
            chain_id: key.to_string(),
            display_name: name.to_string(),
            emoji: emoji.to_string(),
            payment_unit: unit.to_string(),
            wallet: String::new(),
        };
        let package = |label: &str, usd: f64| Package {
            label: label.to_string(),
            usd,
        };

        Self {
            networks: vec![
                network("solana", "Solana", "💜", "SOL"),
                network("ethereum", "Ethereum", "💠", "ETH"),
                network("bsc", "BSC", "🟡", "BNB"),
                network("base", "Base", "🧊", "ETH"),
            ],
            unit_prices_usd: HashMap::from([
                ("SOL".to_string(), 135.0),
                ("ETH".to_string(), 3150.0),
                ("BNB".to_string(), 900.0),
            ]),
            packages: vec![
                package("6h", 2000.0),
                package("12h", 4000.0),
                package("24h", 6000.0),
            ],
        }
    }
}

impl MarketTables {
    /// Load from a TOML file, or fall back to the built-in tables when it is missing.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!("Market file {} not found, using built-in tables", path);
            return Ok(Self::default());
        }

        let tables: MarketTables = config::Config::builder()
            .add_source(config::File::from(Path::new(path)))
            .build()
            .with_context(|| format!("Failed to read market file {}", path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse market file {}", path))?;

        tables.validate()?;
        info!(
            "Market tables loaded from {}: {} networks, {} packages",
            path,
            tables.networks.len(),
            tables.packages.len()
        );
        Ok(tables)
    }

    pub fn validate(&self) -> Result<(), HotPairsError> {
        if self.networks.is_empty() {
            return Err(HotPairsError::ConfigError("no networks configured".to_string()));
        }
        if self.packages.is_empty() {
            return Err(HotPairsError::ConfigError("no packages configured".to_string()));
        }
        for net in &self.networks {
            if self.unit_price(&net.payment_unit).is_none() {
                return Err(HotPairsError::ConfigError(format!(
                    "network {} is paid in {} which has no unit price",
                    net.key, net.payment_unit
                )));
            }
            if net.wallet.trim().is_empty() {
                warn!("No payment wallet configured for network {}", net.key);
            }
        }
        Ok(())
    }

    pub fn network(&self, key: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.key.eq_ignore_ascii_case(key))
    }

    pub fn package(&self, label: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.label == label)
    }

    pub fn unit_price(&self, unit: &str) -> Option<f64> {
        self.unit_prices_usd
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(unit))
            .map(|(_, v)| *v)
    }
}

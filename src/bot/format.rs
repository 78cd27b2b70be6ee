//! Rendering of pair data into Telegram HTML posts.
//!
//! Everything here is pure: the same snapshot always produces the same text.

use std::collections::HashMap;
use teloxide::utils::html::escape;

use crate::bot::notification::LinkButton;
use crate::config::MarketTables;
use crate::models::PairSnapshot;

/// Direction tag attached to a formatted percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    pub fn emoji(&self) -> &'static str {
        match self {
            Trend::Up => "🟢",
            Trend::Down => "🔴",
            Trend::Neutral => "⚪",
        }
    }
}

/// `$1.23B`, `$4.56M`, `$7.89K` or `$12.34`; absent values render as `N/A`.
pub fn format_number(value: Option<f64>) -> String {
    match value {
        Some(n) if n >= 1e9 => format!("${:.2}B", n / 1e9),
        Some(n) if n >= 1e6 => format!("${:.2}M", n / 1e6),
        Some(n) if n >= 1e3 => format!("${:.2}K", n / 1e3),
        Some(n) => format!("${:.2}", n),
        None => "N/A".to_string(),
    }
}

pub fn format_percentage(value: Option<f64>) -> (String, Trend) {
    match value {
        Some(p) if p > 0.0 => (format!("+{:.2}%", p), Trend::Up),
        Some(p) if p < 0.0 => (format!("{:.2}%", p), Trend::Down),
        // -0.0 lands here too and must not print a sign
        Some(_) => ("0.00%".to_string(), Trend::Neutral),
        None => ("N/A".to_string(), Trend::Neutral),
    }
}

/// Sub-cent prices get more decimals so memecoin prices stay readable.
pub fn format_price(value: Option<f64>) -> String {
    match value {
        Some(p) if p < 0.000001 => format!("${:.10}", p),
        Some(p) if p < 0.01 => format!("${:.8}", p),
        Some(p) => format!("${:.6}", p),
        None => "N/A".to_string(),
    }
}

/// Two decimals with thousands separators, e.g. `$1,234.56`.
pub fn format_usd_delta(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocialLinks {
    pub website: Option<String>,
    pub telegram: Option<String>,
    pub twitter: Option<String>,
}

/// First website, first Telegram social and first Twitter/X social of the pair.
pub fn social_links(pair: &PairSnapshot) -> SocialLinks {
    let mut links = SocialLinks::default();
    let Some(info) = pair.info.as_ref() else {
        return links;
    };

    links.website = info
        .websites
        .iter()
        .filter_map(|w| w.url.clone())
        .find(|u| !u.is_empty());

    for social in &info.socials {
        let Some(url) = social.url.as_deref().filter(|u| !u.is_empty()) else {
            continue;
        };
        let haystack = format!(
            "{} {}",
            social.kind.as_deref().unwrap_or_default(),
            url
        )
        .to_lowercase();

        if links.telegram.is_none() && (haystack.contains("telegram") || haystack.contains("t.me")) {
            links.telegram = Some(url.to_string());
        } else if links.twitter.is_none() && (haystack.contains("twitter") || haystack.contains("x.com")) {
            links.twitter = Some(url.to_string());
        }
    }

    links
}

/// Chart link: the pair's own URL, else built from chain and pair address.
pub fn chart_url(pair: &PairSnapshot) -> Option<String> {
    if let Some(url) = pair.url.as_deref().filter(|u| !u.is_empty()) {
        return Some(url.to_string());
    }
    match (pair.chain_id.as_deref(), pair.pair_address.as_deref()) {
        (Some(chain), Some(address)) if !chain.is_empty() && !address.is_empty() => {
            Some(format!("https://dexscreener.com/{}/{}", chain, address))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormattedPair {
    pub text: String,
    pub logo_url: Option<String>,
    pub chart_url: Option<String>,
    pub links: SocialLinks,
}

impl FormattedPair {
    /// Chart first, then whichever social links the token has.
    pub fn buttons(&self) -> Vec<LinkButton> {
        let mut buttons = Vec::new();
        if let Some(url) = &self.chart_url {
            buttons.push(LinkButton::new("📊 View Chart", url));
        }
        if let Some(url) = &self.links.website {
            buttons.push(LinkButton::new("🌐 Website", url));
        }
        if let Some(url) = &self.links.telegram {
            buttons.push(LinkButton::new("💬 Telegram", url));
        }
        if let Some(url) = &self.links.twitter {
            buttons.push(LinkButton::new("🐦 Twitter", url));
        }
        buttons
    }
}

/// Presentation settings shared by channel posts and monitor alerts.
#[derive(Debug, Clone, Default)]
pub struct PostStyle {
    chain_names: HashMap<String, String>,
    footer: String,
}

impl PostStyle {
    pub fn new(market: &MarketTables, footer: &str) -> Self {
        Self {
            chain_names: market
                .networks
                .iter()
                .map(|n| (n.chain_id.to_lowercase(), n.display_name.clone()))
                .collect(),
            footer: footer.to_string(),
        }
    }

    pub fn chain_name(&self, chain_id: &str) -> String {
        self.chain_names
            .get(&chain_id.to_lowercase())
            .cloned()
            .unwrap_or_else(|| chain_id.to_uppercase())
    }

    pub fn render(&self, pair: &PairSnapshot) -> FormattedPair {
        let line = |label: &str, value: Option<f64>| {
            let (text, trend) = format_percentage(value);
            format!("📈 <b>{}:</b> {} {}\n", label, trend.emoji(), text)
        };

        let text = format!(
            "╔══════════════════════════╗\n\
             \u{20}    <b>🔥 HOT PAIRS PLACEMENT</b>\n\
             ╚══════════════════════════╝\n\n\
             💎 <b>{}</b> • {}\n\
             ⛓️ <b>Chain:</b> {}\n\n\
             💵 <b>Price:</b> {}\n\
             {}{}{}\n\
             💎 <b>Market Cap:</b> {}\n\
             🏷️ <b>FDV:</b> {}\n\
             🌊 <b>Liquidity:</b> {}\n\
             📊 <b>24h Volume:</b> {}\n\n\
             📝 <b>CA:</b> <code>{}</code>\n\
             {}",
            escape(pair.symbol()),
            escape(pair.name()),
            escape(&self.chain_name(pair.chain())),
            format_price(pair.price_usd),
            line("1H", pair.change_h1()),
            line("6H", pair.change_h6()),
            line("24H", pair.change_h24()),
            format_number(pair.market_cap),
            format_number(pair.fdv),
            format_number(pair.liquidity_usd()),
            format_number(pair.volume_h24()),
            escape(pair.token_address()),
            self.footer,
        );

        FormattedPair {
            text,
            logo_url: pair.image_url().map(str::to_string),
            chart_url: chart_url(pair),
            links: social_links(pair),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pair::{BaseToken, PairInfo, Social, Website};

    #[test]
    fn test_format_number_boundaries() {
        assert_eq!(format_number(Some(999.0)), "$999.00");
        assert_eq!(format_number(Some(1_000.0)), "$1.00K");
        assert_eq!(format_number(Some(999_999.0)), "$1000.00K");
        assert_eq!(format_number(Some(1_000_000.0)), "$1.00M");
        assert_eq!(format_number(Some(1_000_000_000.0)), "$1.00B");
        assert_eq!(format_number(Some(2_500_000_000.0)), "$2.50B");
        assert_eq!(format_number(Some(0.0)), "$0.00");
        assert_eq!(format_number(None), "N/A");
    }

    #[test]
    fn test_format_percentage_tags() {
        assert_eq!(format_percentage(Some(12.345)), ("+12.35%".to_string(), Trend::Up));
        assert_eq!(format_percentage(Some(-3.5)), ("-3.50%".to_string(), Trend::Down));
        assert_eq!(format_percentage(Some(0.0)), ("0.00%".to_string(), Trend::Neutral));
        assert_eq!(format_percentage(Some(-0.0)), ("0.00%".to_string(), Trend::Neutral));
        assert_eq!(format_percentage(None).1, Trend::Neutral);

        for p in [-50.0, -0.01, 0.0, 0.01, 50.0] {
            let (_, trend) = format_percentage(Some(p));
            assert_eq!(trend == Trend::Up, p > 0.0);
            assert_eq!(trend == Trend::Down, p < 0.0);
            assert_eq!(trend == Trend::Neutral, p == 0.0);
        }
    }

    #[test]
    fn test_format_price_precision() {
        assert_eq!(format_price(Some(0.0000001234)), "$0.0000001234");
        assert_eq!(format_price(Some(0.00123)), "$0.00123000");
        assert_eq!(format_price(Some(1.5)), "$1.500000");
        assert_eq!(format_price(None), "N/A");
    }

    #[test]
    fn test_format_usd_delta() {
        assert_eq!(format_usd_delta(600.0), "$600.00");
        assert_eq!(format_usd_delta(700.0), "$700.00");
        assert_eq!(format_usd_delta(1234.567), "$1,234.57");
        assert_eq!(format_usd_delta(1_000_000.0), "$1,000,000.00");
        assert_eq!(format_usd_delta(-2500.0), "-$2,500.00");
    }

    #[test]
    fn test_social_links_first_match_per_category() {
        let pair = PairSnapshot {
            info: Some(PairInfo {
                image_url: None,
                websites: vec![
                    Website { label: Some("Website".into()), url: Some("https://first.example".into()) },
                    Website { label: Some("Docs".into()), url: Some("https://second.example".into()) },
                ],
                socials: vec![
                    Social { kind: Some("twitter".into()), url: Some("https://x.com/one".into()) },
                    Social { kind: Some("telegram".into()), url: Some("https://t.me/one".into()) },
                    Social { kind: None, url: Some("https://twitter.com/two".into()) },
                    Social { kind: None, url: Some("https://t.me/two".into()) },
                ],
            }),
            ..Default::default()
        };

        let links = social_links(&pair);
        assert_eq!(links.website.as_deref(), Some("https://first.example"));
        assert_eq!(links.twitter.as_deref(), Some("https://x.com/one"));
        assert_eq!(links.telegram.as_deref(), Some("https://t.me/one"));
        assert_eq!(social_links(&PairSnapshot::default()), SocialLinks::default());
    }

    #[test]
    fn test_render_without_logo_or_chart() {
        let style = PostStyle::new(&MarketTables::default(), "");
        let rendered = style.render(&PairSnapshot::default());
        assert!(rendered.logo_url.is_none());
        assert!(rendered.chart_url.is_none());
        assert!(rendered.buttons().is_empty());
        assert!(rendered.text.contains("<b>Unknown</b> • Unknown"));
        assert!(rendered.text.contains("<b>Market Cap:</b> N/A"));
    }

    #[test]
    fn test_render_full_pair() {
        let style = PostStyle::new(&MarketTables::default(), "\n\nfooter");
        let pair = PairSnapshot {
            chain_id: Some("bsc".into()),
            pair_address: Some("0xpair".into()),
            base_token: Some(BaseToken {
                address: Some("0xABC".into()),
                name: Some("Cats & Dogs".into()),
                symbol: Some("C<D".into()),
            }),
            price_usd: Some(0.5),
            market_cap: Some(1_500_000.0),
            info: Some(PairInfo {
                image_url: Some("https://cdn.example/c.png".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let rendered = style.render(&pair);
        assert!(rendered.text.contains("<b>C&lt;D</b> • Cats &amp; Dogs"));
        assert!(rendered.text.contains("<b>Chain:</b> BSC"));
        assert!(rendered.text.contains("<b>Price:</b> $0.500000"));
        assert!(rendered.text.contains("<b>Market Cap:</b> $1.50M"));
        assert!(rendered.text.contains("<code>0xABC</code>"));
        assert!(rendered.text.ends_with("footer"));
        assert_eq!(rendered.logo_url.as_deref(), Some("https://cdn.example/c.png"));
        assert_eq!(rendered.chart_url.as_deref(), Some("https://dexscreener.com/bsc/0xpair"));
        assert_eq!(rendered.buttons().len(), 1);
    }
}

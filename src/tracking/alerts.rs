//! Alert rules for tracked tokens.
//!
//! Every poll compares exactly two readings of a token: the stored one and the
//! fresh one. Pump/dump alerts are edge triggered through [`AlertState`], so a
//! token that stays pumped is announced once and re-arms only after its 1h
//! change falls back inside the thresholds. Buy alerts fire on 24h volume
//! growth, gated by the configured [`BuyAlertPolicy`].

use crate::bot::format::format_usd_delta;
use crate::models::PairSnapshot;

/// Which 1h-change zone a token was in at its last reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertState {
    #[default]
    Normal,
    Pumped,
    Dumped,
}

/// How volume growth turns into buy alerts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuyAlertPolicy {
    /// Any increase of 24h volume is announced.
    Always,
    /// Only increases of at least this many USD are announced.
    MinimumUsd(f64),
}

impl BuyAlertPolicy {
    pub fn should_alert(&self, delta_usd: f64) -> bool {
        match self {
            BuyAlertPolicy::Always => delta_usd > 0.0,
            BuyAlertPolicy::MinimumUsd(min) => delta_usd > 0.0 && delta_usd >= *min,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertRules {
    pub pump_threshold_pct: f64,
    pub dump_threshold_pct: f64,
    pub buy_alert_policy: BuyAlertPolicy,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            pump_threshold_pct: 10.0,
            dump_threshold_pct: -10.0,
            buy_alert_policy: BuyAlertPolicy::MinimumUsd(500.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertKind {
    Pump { change_h1: f64 },
    Dump { change_h1: f64 },
    Buy { delta_usd: f64 },
}

impl AlertKind {
    pub fn headline(&self, rules: &AlertRules) -> String {
        match self {
            AlertKind::Pump { .. } => format!("🚀 BIG PUMP ALERT ({}%+)", rules.pump_threshold_pct),
            AlertKind::Dump { .. } => {
                format!("📉 BIG DUMP ALERT ({}%+)", rules.dump_threshold_pct.abs())
            }
            AlertKind::Buy { delta_usd } => format!("💰 BUY DETECTED ({})", format_usd_delta(*delta_usd)),
        }
    }
}

impl AlertState {
    /// Zone of a 1h change. A missing reading counts as 0%.
    pub fn classify(change_h1: Option<f64>, rules: &AlertRules) -> Self {
        let change = change_h1.unwrap_or(0.0);
        if change >= rules.pump_threshold_pct {
            AlertState::Pumped
        } else if change <= rules.dump_threshold_pct {
            AlertState::Dumped
        } else {
            AlertState::Normal
        }
    }

    /// Alert raised by moving from `self` to `next`, if any.
    ///
    /// | from \ to | Normal | Pumped | Dumped |
    /// |-----------|--------|--------|--------|
    /// | Normal    | -      | pump   | dump   |
    /// | Pumped    | -      | -      | dump   |
    /// | Dumped    | -      | pump   | -      |
    pub fn transition(self, next: AlertState, change_h1: f64) -> Option<AlertKind> {
        match (self, next) {
            (AlertState::Pumped, AlertState::Pumped) | (AlertState::Dumped, AlertState::Dumped) => None,
            (_, AlertState::Pumped) => Some(AlertKind::Pump { change_h1 }),
            (_, AlertState::Dumped) => Some(AlertKind::Dump { change_h1 }),
            (_, AlertState::Normal) => None,
        }
    }
}

/// Outcome of comparing a fresh reading against the stored one.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub alerts: Vec<AlertKind>,
    pub state: AlertState,
    pub volume_h24: f64,
}

pub fn evaluate(
    previous_state: AlertState,
    previous_volume: f64,
    current: &PairSnapshot,
    rules: &AlertRules,
) -> Evaluation {
    let mut alerts = Vec::new();

    let state = AlertState::classify(current.change_h1(), rules);
    if let Some(alert) = previous_state.transition(state, current.change_h1().unwrap_or(0.0)) {
        alerts.push(alert);
    }

    // A reading without volume says nothing about buys; keep the old baseline
    let volume_h24 = match current.volume_h24() {
        Some(volume) => {
            let delta = volume - previous_volume;
            if volume > previous_volume && rules.buy_alert_policy.should_alert(delta) {
                alerts.push(AlertKind::Buy { delta_usd: delta });
            }
            volume
        }
        None => previous_volume,
    };

    Evaluation {
        alerts,
        state,
        volume_h24,
    }
}

// src/tracking/token_monitor.rs
//
// Polls DexScreener for every activated token and posts pump, dump and buy
// alerts to the broadcast channel. The registry is owned by the monitor task;
// everything else talks to it through a MonitorHandle.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::TokenSource;
use crate::bot::format::PostStyle;
use crate::bot::notification::MessageSink;
use crate::error::HotPairsError;
use crate::models::PairSnapshot;
use crate::tracking::alerts::{evaluate, AlertKind, AlertRules, AlertState};

// ============================================================================
// CONFIGURATION
// ============================================================================

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for the token monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between polls of the whole registry
    pub poll_interval: Duration,
    /// Upper bound on in-flight fetches during one poll
    pub max_concurrent_fetches: usize,
    pub rules: AlertRules,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_concurrent_fetches: 8,
            rules: AlertRules::default(),
        }
    }
}

// ============================================================================
// TRACKED TOKEN STATE
// ============================================================================

#[derive(Debug, Clone)]
pub struct TrackedToken {
    pub address: String,
    /// Chain the token was sold on, narrows pair selection
    pub chain_hint: Option<String>,
    pub last_pair: PairSnapshot,
    pub last_volume_h24: f64,
    pub alert_state: AlertState,
    pub tracked_since: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Added,
    AlreadyTracked,
    NotFound,
}

/// An alert raised during a poll and whether the sink accepted it.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedAlert {
    pub address: String,
    pub kind: AlertKind,
    pub delivered: bool,
}

enum MonitorCommand {
    Register {
        address: String,
        chain_hint: Option<String>,
        reply: oneshot::Sender<RegisterOutcome>,
    },
    Tracked {
        reply: oneshot::Sender<Vec<TrackedToken>>,
    },
}

// ============================================================================
// TOKEN MONITOR
// ============================================================================

pub struct TokenMonitor {
    config: MonitorConfig,
    source: Arc<dyn TokenSource>,
    sink: Arc<dyn MessageSink>,
    style: PostStyle,
    broadcast_chat_id: i64,
    /// Tracked tokens: address -> latest state
    registry: HashMap<String, TrackedToken>,
}

impl TokenMonitor {
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn TokenSource>,
        sink: Arc<dyn MessageSink>,
        style: PostStyle,
        broadcast_chat_id: i64,
    ) -> Self {
        Self {
            config,
            source,
            sink,
            style,
            broadcast_chat_id,
            registry: HashMap::new(),
        }
    }

    /// Start tracking `address`. A known address is left untouched.
    pub async fn register(&mut self, address: &str, chain_hint: Option<&str>) -> RegisterOutcome {
        let address = address.trim();
        if self.registry.contains_key(address) {
            debug!("Token {} already tracked", address);
            return RegisterOutcome::AlreadyTracked;
        }

        let Some(pair) = self.source.fetch_pair(address, chain_hint).await else {
            warn!("No pair data for {}, not tracking it", address);
            return RegisterOutcome::NotFound;
        };

        let tracked = TrackedToken {
            address: address.to_string(),
            chain_hint: chain_hint.map(str::to_string),
            last_volume_h24: pair.volume_h24().unwrap_or(0.0),
            alert_state: AlertState::classify(pair.change_h1(), &self.config.rules),
            last_pair: pair,
            tracked_since: Utc::now(),
        };

        info!(
            "📝 Started monitoring {} ({}) - 24h volume baseline {:.2}",
            tracked.last_pair.symbol(),
            address,
            tracked.last_volume_h24
        );
        self.registry.insert(address.to_string(), tracked);
        RegisterOutcome::Added
    }

    /// Poll every tracked token once and post the alerts it raises.
    pub async fn tick(&mut self) -> Vec<DispatchedAlert> {
        if self.registry.is_empty() {
            return Vec::new();
        }

        let targets: Vec<(String, Option<String>)> = self
            .registry
            .values()
            .map(|t| (t.address.clone(), t.chain_hint.clone()))
            .collect();
        debug!("Polling {} tracked tokens...", targets.len());

        let source = self.source.clone();
        let mut readings: Vec<(String, Option<PairSnapshot>)> = stream::iter(targets)
            .map(|(address, chain_hint)| {
                let source = source.clone();
                async move {
                    let pair = source.fetch_pair(&address, chain_hint.as_deref()).await;
                    (address, pair)
                }
            })
            .buffer_unordered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;
        readings.sort_by(|a, b| a.0.cmp(&b.0));

        let mut pending = Vec::new();
        let mut skipped = 0;
        for (address, reading) in readings {
            let (Some(pair), Some(tracked)) = (reading, self.registry.get_mut(&address)) else {
                skipped += 1;
                continue;
            };

            let eval = evaluate(tracked.alert_state, tracked.last_volume_h24, &pair, &self.config.rules);
            tracked.alert_state = eval.state;
            tracked.last_volume_h24 = eval.volume_h24;
            tracked.last_pair = pair.clone();

            for kind in eval.alerts {
                pending.push((address.clone(), pair.clone(), kind));
            }
        }
        if skipped > 0 {
            debug!("Skipped {} tokens with no fresh data this poll", skipped);
        }

        let mut dispatched = Vec::with_capacity(pending.len());
        for (address, pair, kind) in pending {
            info!("🔔 {} for {} ({})", kind.headline(&self.config.rules), pair.symbol(), address);
            let delivered = self.post_alert(&pair, &kind).await;
            dispatched.push(DispatchedAlert {
                address,
                kind,
                delivered,
            });
        }
        dispatched
    }

    /// Post with the token logo when there is one, falling back to plain text.
    async fn post_alert(&self, pair: &PairSnapshot, kind: &AlertKind) -> bool {
        let formatted = self.style.render(pair);
        let text = format!("<b>{}</b>\n\n{}", kind.headline(&self.config.rules), formatted.text);
        let buttons = formatted.buttons();

        if let Some(logo) = &formatted.logo_url {
            match self
                .sink
                .send_image(self.broadcast_chat_id, logo, &text, &buttons)
                .await
            {
                Ok(()) => return true,
                Err(e) => warn!("Failed to post alert image for {}: {}; sending text", pair.symbol(), e),
            }
        }

        match self.sink.send_text(self.broadcast_chat_id, &text, &buttons).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to post alert for {}: {}", pair.symbol(), e);
                false
            }
        }
    }

    /// Every tracked token, ordered by address.
    pub fn tracked(&self) -> Vec<TrackedToken> {
        let mut tokens: Vec<TrackedToken> = self.registry.values().cloned().collect();
        tokens.sort_by(|a, b| a.address.cmp(&b.address));
        tokens
    }

    /// Move the monitor onto its own task.
    pub fn spawn(self) -> (MonitorHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (shutdown_tx, _) = broadcast::channel(1);
        let shutdown_rx = shutdown_tx.subscribe();

        let task = tokio::spawn(self.run(command_rx, shutdown_rx));
        (
            MonitorHandle {
                commands: command_tx,
                shutdown_tx,
            },
            task,
        )
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<MonitorCommand>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!(
            "👀 Token monitor running: poll every {:?}, pump {}%, dump {}%, buys {:?}",
            self.config.poll_interval,
            self.config.rules.pump_threshold_pct,
            self.config.rules.dump_threshold_pct,
            self.config.rules.buy_alert_policy
        );

        // interval() panics on a zero period
        let mut poll_timer = interval(self.config.poll_interval.max(MIN_POLL_INTERVAL));
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Token monitor received shutdown signal");
                    break;
                }

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("All monitor handles dropped, stopping token monitor");
                        break;
                    }
                },

                _ = poll_timer.tick() => {
                    for alert in self.tick().await.iter().filter(|a| !a.delivered) {
                        warn!("Alert {:?} for {} was not delivered", alert.kind, alert.address);
                    }
                }
            }
        }

        info!("Token monitor stopped with {} tracked tokens", self.registry.len());
    }

    async fn handle_command(&mut self, command: MonitorCommand) {
        match command {
            MonitorCommand::Register {
                address,
                chain_hint,
                reply,
            } => {
                let outcome = self.register(&address, chain_hint.as_deref()).await;
                let _ = reply.send(outcome);
            }
            MonitorCommand::Tracked { reply } => {
                let _ = reply.send(self.tracked());
            }
        }
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// Cheap, clonable access to a running [`TokenMonitor`].
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    shutdown_tx: broadcast::Sender<()>,
}

impl MonitorHandle {
    pub async fn register(
        &self,
        address: &str,
        chain_hint: Option<&str>,
    ) -> Result<RegisterOutcome, HotPairsError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(MonitorCommand::Register {
                address: address.to_string(),
                chain_hint: chain_hint.map(str::to_string),
                reply,
            })
            .await
            .map_err(|_| HotPairsError::MonitorUnavailable("monitor task stopped".to_string()))?;

        response
            .await
            .map_err(|_| HotPairsError::MonitorUnavailable("no reply to registration".to_string()))
    }

    pub async fn tracked(&self) -> Result<Vec<TrackedToken>, HotPairsError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(MonitorCommand::Tracked { reply })
            .await
            .map_err(|_| HotPairsError::MonitorUnavailable("monitor task stopped".to_string()))?;

        response
            .await
            .map_err(|_| HotPairsError::MonitorUnavailable("no reply to tracked query".to_string()))
    }

    pub fn shutdown(&self) {
        info!("Stopping token monitor...");
        let _ = self.shutdown_tx.send(());
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bot::notification::LinkButton;
    use crate::config::MarketTables;
    use crate::models::pair::{BaseToken, PairInfo, PriceChange, Volume};
    use crate::tracking::alerts::BuyAlertPolicy;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves scripted readings per address; an exhausted script reads as "no data".
    #[derive(Default)]
    pub(crate) struct ScriptedSource {
        readings: Mutex<HashMap<String, VecDeque<Option<PairSnapshot>>>>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        pub(crate) fn push(&self, address: &str, reading: Option<PairSnapshot>) {
            self.readings
                .lock()
                .unwrap()
                .entry(address.to_string())
                .or_default()
                .push_back(reading);
        }
    }

    #[async_trait]
    impl TokenSource for ScriptedSource {
        async fn fetch_pair(&self, address: &str, _chain_hint: Option<&str>) -> Option<PairSnapshot> {
            self.calls.lock().unwrap().push(address.to_string());
            self.readings
                .lock()
                .unwrap()
                .get_mut(address)
                .and_then(|q| q.pop_front())
                .flatten()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Sent {
        Text { target: i64, text: String },
        Image { target: i64, image_url: String, caption: String },
    }

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) sent: Mutex<Vec<Sent>>,
        pub(crate) fail_images: bool,
        pub(crate) fail_all: bool,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send_text(&self, target: i64, text: &str, _buttons: &[LinkButton]) -> Result<(), HotPairsError> {
            if self.fail_all {
                return Err(HotPairsError::DeliveryError("chat not found".to_string()));
            }
            self.sent.lock().unwrap().push(Sent::Text {
                target,
                text: text.to_string(),
            });
            Ok(())
        }

        async fn send_image(
            &self,
            target: i64,
            image_url: &str,
            caption: &str,
            _buttons: &[LinkButton],
        ) -> Result<(), HotPairsError> {
            if self.fail_images || self.fail_all {
                return Err(HotPairsError::DeliveryError("wrong file identifier".to_string()));
            }
            self.sent.lock().unwrap().push(Sent::Image {
                target,
                image_url: image_url.to_string(),
                caption: caption.to_string(),
            });
            Ok(())
        }
    }

    pub(crate) fn addresses(tokens: Vec<TrackedToken>) -> Vec<String> {
        tokens.into_iter().map(|t| t.address).collect()
    }

    fn entry(monitor: &TokenMonitor, address: &str) -> TrackedToken {
        monitor.registry.get(address).cloned().unwrap()
    }

    pub(crate) fn reading(address: &str, h1: f64, volume: f64) -> PairSnapshot {
        PairSnapshot {
            chain_id: Some("solana".to_string()),
            pair_address: Some(format!("{}-pair", address)),
            base_token: Some(BaseToken {
                address: Some(address.to_string()),
                name: Some("Test Token".to_string()),
                symbol: Some("TEST".to_string()),
            }),
            price_change: Some(PriceChange {
                h1: Some(h1),
                h6: None,
                h24: None,
            }),
            volume: Some(Volume { h24: Some(volume) }),
            ..Default::default()
        }
    }

    const CHANNEL: i64 = -100_123;

    fn monitor(
        rules: AlertRules,
        source: Arc<ScriptedSource>,
        sink: Arc<RecordingSink>,
    ) -> TokenMonitor {
        TokenMonitor::new(
            MonitorConfig {
                poll_interval: Duration::from_millis(20),
                max_concurrent_fetches: 4,
                rules,
            },
            source,
            sink,
            PostStyle::new(&MarketTables::default(), ""),
            CHANNEL,
        )
    }

    #[test]
    fn test_monitor_config_default() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_concurrent_fetches, 8);
        assert_eq!(config.rules.pump_threshold_pct, 10.0);
        assert_eq!(config.rules.dump_threshold_pct, -10.0);
    }

    #[tokio::test]
    async fn test_register_then_pump_and_buy() {
        let source = Arc::new(ScriptedSource::default());
        let sink = Arc::new(RecordingSink::default());
        source.push("0xABC", Some(reading("0xABC", 3.0, 1000.0)));
        source.push("0xABC", Some(reading("0xABC", 14.0, 1700.0)));

        let mut monitor = monitor(AlertRules::default(), source.clone(), sink.clone());
        assert_eq!(monitor.register("0xABC", None).await, RegisterOutcome::Added);
        assert!(sink.sent.lock().unwrap().is_empty());

        let alerts = monitor.tick().await;
        let kinds: Vec<AlertKind> = alerts.iter().map(|a| a.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                AlertKind::Pump { change_h1: 14.0 },
                AlertKind::Buy { delta_usd: 700.0 },
            ]
        );
        assert!(alerts.iter().all(|a| a.delivered));

        let sent = sink.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        match &sent[1] {
            Sent::Text { target, text } => {
                assert_eq!(*target, CHANNEL);
                assert!(text.starts_with("<b>💰 BUY DETECTED ($700.00)</b>"));
            }
            other => panic!("unexpected delivery {:?}", other),
        }

        let tracked = entry(&monitor, "0xABC");
        assert_eq!(tracked.last_pair.change_h1(), Some(14.0));
        assert_eq!(tracked.last_volume_h24, 1700.0);
        assert_eq!(tracked.alert_state, AlertState::Pumped);
    }

    #[tokio::test]
    async fn test_register_twice_keeps_baseline() {
        let source = Arc::new(ScriptedSource::default());
        let sink = Arc::new(RecordingSink::default());
        source.push("0xABC", Some(reading("0xABC", 1.0, 1000.0)));
        source.push("0xABC", Some(reading("0xABC", 1.0, 5000.0)));

        let mut monitor = monitor(AlertRules::default(), source.clone(), sink);
        assert_eq!(monitor.register("0xABC", None).await, RegisterOutcome::Added);
        assert_eq!(monitor.register(" 0xABC ", None).await, RegisterOutcome::AlreadyTracked);

        assert_eq!(addresses(monitor.tracked()), vec!["0xABC".to_string()]);
        assert_eq!(entry(&monitor, "0xABC").last_volume_h24, 1000.0);
        assert_eq!(source.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_unknown_token() {
        let source = Arc::new(ScriptedSource::default());
        let mut monitor = monitor(AlertRules::default(), source, Arc::new(RecordingSink::default()));
        assert_eq!(monitor.register("0xNONE", None).await, RegisterOutcome::NotFound);
        assert!(monitor.tracked().is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_snapshot_and_others_continue() {
        let source = Arc::new(ScriptedSource::default());
        let sink = Arc::new(RecordingSink::default());
        source.push("0xA", Some(reading("0xA", 1.0, 1000.0)));
        source.push("0xB", Some(reading("0xB", 1.0, 1000.0)));
        source.push("0xA", None);
        source.push("0xB", Some(reading("0xB", 20.0, 1000.0)));

        let mut monitor = monitor(AlertRules::default(), source, sink.clone());
        monitor.register("0xA", None).await;
        monitor.register("0xB", None).await;

        let alerts = monitor.tick().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].address, "0xB");

        let a = entry(&monitor, "0xA");
        assert_eq!(a.last_pair.change_h1(), Some(1.0));
        assert_eq!(a.last_volume_h24, 1000.0);
        assert_eq!(monitor.tracked().len(), 2);
    }

    #[tokio::test]
    async fn test_gated_buy_below_minimum_is_silent() {
        let source = Arc::new(ScriptedSource::default());
        let sink = Arc::new(RecordingSink::default());
        source.push("0xA", Some(reading("0xA", 0.0, 1000.0)));
        source.push("0xA", Some(reading("0xA", 0.0, 1300.0)));
        source.push("0xA", Some(reading("0xA", 0.0, 1900.0)));

        let rules = AlertRules {
            buy_alert_policy: BuyAlertPolicy::MinimumUsd(500.0),
            ..Default::default()
        };
        let mut monitor = monitor(rules, source, sink);
        monitor.register("0xA", None).await;

        assert!(monitor.tick().await.is_empty());
        assert_eq!(entry(&monitor, "0xA").last_volume_h24, 1300.0);

        let alerts = monitor.tick().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Buy { delta_usd: 600.0 });
    }

    #[tokio::test]
    async fn test_image_failure_falls_back_to_text() {
        let source = Arc::new(ScriptedSource::default());
        let sink = Arc::new(RecordingSink {
            fail_images: true,
            ..Default::default()
        });
        let with_logo = |h1: f64| PairSnapshot {
            info: Some(PairInfo {
                image_url: Some("https://cdn.example/logo.png".to_string()),
                ..Default::default()
            }),
            ..reading("0xA", h1, 0.0)
        };
        source.push("0xA", Some(with_logo(0.0)));
        source.push("0xA", Some(with_logo(-30.0)));

        let mut monitor = monitor(AlertRules::default(), source, sink.clone());
        monitor.register("0xA", None).await;
        let alerts = monitor.tick().await;

        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].delivered);
        let sent = sink.sent.lock().unwrap();
        assert!(matches!(&sent[0], Sent::Text { text, .. } if text.contains("BIG DUMP ALERT")));
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_stop_the_poll() {
        let source = Arc::new(ScriptedSource::default());
        let sink = Arc::new(RecordingSink {
            fail_all: true,
            ..Default::default()
        });
        source.push("0xA", Some(reading("0xA", 0.0, 0.0)));
        source.push("0xA", Some(reading("0xA", 50.0, 10_000.0)));

        let mut monitor = monitor(AlertRules::default(), source, sink);
        monitor.register("0xA", None).await;
        let alerts = monitor.tick().await;

        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| !a.delivered));
        assert_eq!(entry(&monitor, "0xA").alert_state, AlertState::Pumped);
    }

    #[tokio::test]
    async fn test_zero_poll_interval_keeps_the_task_alive() {
        let source = Arc::new(ScriptedSource::default());
        source.push("0xA", Some(reading("0xA", 1.0, 1000.0)));

        let mut zero = monitor(AlertRules::default(), source, Arc::new(RecordingSink::default()));
        zero.config.poll_interval = Duration::ZERO;
        let (handle, task) = zero.spawn();

        assert_eq!(handle.register("0xA", None).await.unwrap(), RegisterOutcome::Added);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(addresses(handle.tracked().await.unwrap()), vec!["0xA".to_string()]);

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_handle_registers_and_shuts_down() {
        let source = Arc::new(ScriptedSource::default());
        let sink = Arc::new(RecordingSink::default());
        source.push("0xABC", Some(reading("0xABC", 3.0, 1000.0)));
        source.push("0xABC", Some(reading("0xABC", 14.0, 1700.0)));

        let (handle, task) = monitor(AlertRules::default(), source, sink.clone()).spawn();
        assert_eq!(handle.register("0xABC", Some("solana")).await.unwrap(), RegisterOutcome::Added);
        assert_eq!(handle.register("0xABC", None).await.unwrap(), RegisterOutcome::AlreadyTracked);
        assert_eq!(addresses(handle.tracked().await.unwrap()), vec!["0xABC".to_string()]);

        // Let a few polls run so the second reading is consumed
        for _ in 0..50 {
            if sink.sent.lock().unwrap().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(sink.sent.lock().unwrap().len(), 2);

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("monitor did not stop")
            .unwrap();

        assert!(matches!(
            handle.register("0xDEF", None).await,
            Err(HotPairsError::MonitorUnavailable(_))
        ));
    }
}

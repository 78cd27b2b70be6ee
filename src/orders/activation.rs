use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::TokenSource;
use crate::bot::format::PostStyle;
use crate::bot::notification::MessageSink;
use crate::config::MarketTables;
use crate::error::HotPairsError;
use crate::orders::review::ReviewTicket;
use crate::tracking::{MonitorHandle, RegisterOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct ActivationReport {
    pub symbol: String,
    pub outcome: RegisterOutcome,
    pub broadcast_delivered: bool,
    pub customer_notified: bool,
}

/// Turns reviewed orders into live placements.
#[derive(Clone)]
pub struct OrderDesk {
    source: Arc<dyn TokenSource>,
    sink: Arc<dyn MessageSink>,
    monitor: MonitorHandle,
    style: PostStyle,
    market: MarketTables,
    broadcast_chat_id: i64,
    /// Orders activated or mid-activation; a second click on the same ticket is refused
    claimed: Arc<Mutex<HashSet<Uuid>>>,
}

impl OrderDesk {
    pub fn new(
        source: Arc<dyn TokenSource>,
        sink: Arc<dyn MessageSink>,
        monitor: MonitorHandle,
        style: PostStyle,
        market: MarketTables,
        broadcast_chat_id: i64,
    ) -> Self {
        Self {
            source,
            sink,
            monitor,
            style,
            market,
            broadcast_chat_id,
            claimed: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn claim(&self, order_id: Uuid) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(order_id)
    }

    fn release(&self, order_id: Uuid) {
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&order_id);
    }

    /// Start monitoring the token, post it to the broadcast channel and tell the customer.
    /// Only lookup and registration failures are errors; delivery problems are reported
    /// in the returned [`ActivationReport`]. Each order activates at most once; a failed
    /// attempt can be retried.
    pub async fn activate(&self, ticket: &ReviewTicket) -> Result<ActivationReport, HotPairsError> {
        if !self.claim(ticket.order_id) {
            warn!("Order {} already claimed, ignoring repeated activation", ticket.order_id);
            return Err(HotPairsError::OrderAlreadyClaimed(ticket.order_id.to_string()));
        }

        let result = self.run_activation(ticket).await;
        if result.is_err() {
            self.release(ticket.order_id);
        }
        result
    }

    async fn run_activation(&self, ticket: &ReviewTicket) -> Result<ActivationReport, HotPairsError> {
        let network = self
            .market
            .network(&ticket.network)
            .ok_or_else(|| HotPairsError::UnknownNetwork(ticket.network.clone()))?;

        let pair = self
            .source
            .fetch_pair(&ticket.contract_address, Some(&network.chain_id))
            .await
            .ok_or_else(|| HotPairsError::TokenNotFound(ticket.contract_address.clone()))?;

        let outcome = self
            .monitor
            .register(&ticket.contract_address, Some(&network.chain_id))
            .await?;
        info!(
            "✅ Activated order {} for {} ({}): {:?}",
            ticket.order_id,
            pair.symbol(),
            ticket.contract_address,
            outcome
        );

        let formatted = self.style.render(&pair);
        let buttons = formatted.buttons();
        let mut broadcast_delivered = false;
        if let Some(logo) = &formatted.logo_url {
            match self
                .sink
                .send_image(self.broadcast_chat_id, logo, &formatted.text, &buttons)
                .await
            {
                Ok(()) => broadcast_delivered = true,
                Err(e) => warn!("Failed to post logo for {}: {}; sending text", pair.symbol(), e),
            }
        }
        if !broadcast_delivered {
            match self
                .sink
                .send_text(self.broadcast_chat_id, &formatted.text, &buttons)
                .await
            {
                Ok(()) => broadcast_delivered = true,
                Err(e) => error!("Failed to post to channel: {}", e),
            }
        }

        let notice = if broadcast_delivered {
            "✅ <b>Payment Verified!</b>\nYour token is now live on Hot Pairs! 🚀"
        } else {
            "✅ <b>Payment Verified!</b>\nDeployment active."
        };
        let customer_notified = self.notify_customer(ticket, notice).await;

        Ok(ActivationReport {
            symbol: pair.symbol().to_string(),
            outcome,
            broadcast_delivered,
            customer_notified,
        })
    }

    pub async fn reject(&self, ticket: &ReviewTicket) -> bool {
        info!("❌ Rejected order {} ({})", ticket.order_id, ticket.contract_address);
        self.notify_customer(
            ticket,
            "❌ <b>Payment could not be verified.</b>\nPlease contact support with your transaction id.",
        )
        .await
    }

    async fn notify_customer(&self, ticket: &ReviewTicket, text: &str) -> bool {
        match self.sink.send_text(ticket.customer_chat_id, text, &[]).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to notify customer {}: {}", ticket.customer_chat_id, e);
                false
            }
        }
    }
}

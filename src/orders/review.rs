use teloxide::utils::html::escape;
use uuid::Uuid;

use crate::error::HotPairsError;
use crate::models::Session;

const TITLE: &str = "🧾 NEW HOT PAIRS ORDER";

/// An order waiting for an admin. It travels inside the admin message itself,
/// so Activate/Reject can be handled without any stored order state.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewTicket {
    pub order_id: Uuid,
    pub customer_chat_id: i64,
    pub network: String,
    pub package: String,
    pub amount: String,
    pub contract_address: String,
    pub tx_id: String,
}

impl ReviewTicket {
    pub fn from_session(session: &Session, customer_chat_id: i64, tx_id: &str) -> Self {
        Self {
            order_id: Uuid::new_v4(),
            customer_chat_id,
            network: session.network.clone(),
            package: session.duration.clone(),
            amount: format!(
                "{} {} (${})",
                session.crypto_amount, session.payment_unit, session.usd_price
            ),
            contract_address: session.contract_address.clone(),
            tx_id: tx_id.trim().to_string(),
        }
    }

    /// HTML body of the admin review message.
    pub fn render(&self) -> String {
        format!(
            "<b>{}</b>\n\n\
             Order: {}\n\
             Customer: {}\n\
             Network: {}\n\
             Package: {}\n\
             Amount: {}\n\
             CA: <code>{}</code>\n\
             TX: <code>{}</code>",
            TITLE,
            self.order_id,
            self.customer_chat_id,
            escape(&self.network),
            escape(&self.package),
            escape(&self.amount),
            escape(&self.contract_address),
            escape(&self.tx_id),
        )
    }

    /// Read a ticket back from the plain text Telegram reports for a review message.
    pub fn parse(text: &str) -> Result<Self, HotPairsError> {
        if !text.contains(TITLE) {
            return Err(HotPairsError::ReviewParseError(
                "message is not an order ticket".to_string(),
            ));
        }

        let field = |name: &str| -> Option<String> {
            text.lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(key, _)| key.trim() == name)
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &str| {
            field(name).ok_or_else(|| HotPairsError::ReviewParseError(format!("missing {}", name)))
        };

        let order_id = required("Order")?;
        let customer = required("Customer")?;

        Ok(Self {
            order_id: Uuid::parse_str(&order_id)
                .map_err(|e| HotPairsError::ReviewParseError(format!("bad order id {}: {}", order_id, e)))?,
            customer_chat_id: customer
                .parse()
                .map_err(|_| HotPairsError::ReviewParseError(format!("bad customer id {}", customer)))?,
            network: required("Network")?,
            package: field("Package").unwrap_or_default(),
            amount: field("Amount").unwrap_or_default(),
            contract_address: required("CA")?,
            tx_id: field("TX").unwrap_or_default(),
        })
    }
}

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::config::MarketTables;
use crate::models::session::Quote;

pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("🔥 Get on Hot Pairs", "get_hot_pairs")],
        vec![InlineKeyboardButton::callback("🛠️ Support", "support")],
    ])
}

/// Two networks per row, then Back.
pub fn network_menu(market: &MarketTables) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = market
        .networks
        .chunks(2)
        .map(|chunk| {
            chunk
                .iter()
                .map(|n| {
                    InlineKeyboardButton::callback(
                        format!("{} {}", n.emoji, n.display_name),
                        format!("net_{}", n.key),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("🔙 Back", "start")]);
    InlineKeyboardMarkup::new(rows)
}

/// One package per row with its USD and crypto price.
pub fn duration_menu(quotes: &[Quote]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = quotes
        .iter()
        .map(|q| {
            vec![InlineKeyboardButton::callback(
                format!(
                    "{} - ${} ({} {})",
                    q.duration, q.usd_price, q.crypto_amount, q.payment_unit
                ),
                format!("dur_{}", q.duration),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("🔙 Back", "get_hot_pairs")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn confirmation_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Proceed to Payment", "confirm_order"),
        InlineKeyboardButton::callback("❌ Cancel", "cancel_order"),
    ]])
}

pub fn payment_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Paid", "paid"),
        InlineKeyboardButton::callback("❌ Cancel", "cancel_order"),
    ]])
}

/// Buttons under the admin review ticket
pub fn review_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Activate", "review_activate"),
        InlineKeyboardButton::callback("❌ Reject", "review_reject"),
    ]])
}

pub fn back_to_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback("🔙 Main Menu", "start")]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::pricing::quote;

    #[test]
    fn test_network_menu_rows() {
        let kb = network_menu(&MarketTables::default());
        // four networks in two rows plus Back
        assert_eq!(kb.inline_keyboard.len(), 3);
        assert_eq!(kb.inline_keyboard[0][0].text, "💜 Solana");
    }

    #[test]
    fn test_duration_menu_labels() {
        let market = MarketTables::default();
        let quotes: Vec<Quote> = market
            .packages
            .iter()
            .map(|p| quote(&market, "solana", &p.label).unwrap())
            .collect();
        let kb = duration_menu(&quotes);
        assert_eq!(kb.inline_keyboard.len(), 4);
        assert_eq!(kb.inline_keyboard[0][0].text, "6h - $2000 (14.8148 SOL)");
    }
}

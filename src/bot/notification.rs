use async_trait::async_trait;
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode};
use tracing::{error, info, warn};

use crate::error::HotPairsError;

/// A URL button under a post.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

impl LinkButton {
    pub fn new(label: &str, url: &str) -> Self {
        Self {
            label: label.to_string(),
            url: url.to_string(),
        }
    }
}

/// Outbound messaging used by the token monitor and order activation.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_text(&self, target: i64, text: &str, buttons: &[LinkButton]) -> Result<(), HotPairsError>;

    async fn send_image(
        &self,
        target: i64,
        image_url: &str,
        caption: &str,
        buttons: &[LinkButton],
    ) -> Result<(), HotPairsError>;
}

/// Handles sending posts to the broadcast channel and notices to admins
pub struct NotificationManager {
    bot: Bot,
    admin_ids: Vec<i64>,
}

impl NotificationManager {
    pub fn new(bot: Bot, admin_ids: Vec<i64>) -> Self {
        Self { bot, admin_ids }
    }

    /// Send an HTML message to every admin. Returns how many deliveries succeeded.
    pub async fn notify_admins(&self, text: &str, keyboard: Option<InlineKeyboardMarkup>) -> usize {
        let mut delivered = 0;
        for &admin_id in &self.admin_ids {
            let mut request = self
                .bot
                .send_message(ChatId(admin_id), text)
                .parse_mode(ParseMode::Html);
            if let Some(kb) = keyboard.clone() {
                request = request.reply_markup(kb);
            }

            match request.await {
                Ok(_) => {
                    info!("Notification sent to admin {}", admin_id);
                    delivered += 1;
                }
                Err(e) => {
                    error!("Failed to send notification to admin {}: {}", admin_id, e);
                }
            }
        }
        delivered
    }
}

#[async_trait]
impl MessageSink for NotificationManager {
    async fn send_text(&self, target: i64, text: &str, buttons: &[LinkButton]) -> Result<(), HotPairsError> {
        let mut request = self
            .bot
            .send_message(ChatId(target), text)
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true);
        if let Some(kb) = link_keyboard(buttons) {
            request = request.reply_markup(kb);
        }

        request
            .await
            .map(|_| ())
            .map_err(|e| HotPairsError::DeliveryError(e.to_string()))
    }

    async fn send_image(
        &self,
        target: i64,
        image_url: &str,
        caption: &str,
        buttons: &[LinkButton],
    ) -> Result<(), HotPairsError> {
        let url = Url::parse(image_url)
            .map_err(|e| HotPairsError::DeliveryError(format!("bad image url {}: {}", image_url, e)))?;

        let mut request = self
            .bot
            .send_photo(ChatId(target), InputFile::url(url))
            .caption(caption)
            .parse_mode(ParseMode::Html);
        if let Some(kb) = link_keyboard(buttons) {
            request = request.reply_markup(kb);
        }

        request
            .await
            .map(|_| ())
            .map_err(|e| HotPairsError::DeliveryError(e.to_string()))
    }
}

/// One button per row; buttons with unparseable URLs are dropped.
pub fn link_keyboard(buttons: &[LinkButton]) -> Option<InlineKeyboardMarkup> {
    let rows: Vec<Vec<InlineKeyboardButton>> = buttons
        .iter()
        .filter_map(|b| match Url::parse(&b.url) {
            Ok(url) => Some(vec![InlineKeyboardButton::url(b.label.clone(), url)]),
            Err(e) => {
                warn!("Skipping button {} with invalid url {}: {}", b.label, b.url, e);
                None
            }
        })
        .collect();

    if rows.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::new(rows))
    }
}

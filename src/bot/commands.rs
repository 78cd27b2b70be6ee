use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};
use teloxide::utils::command::BotCommands;
use teloxide::utils::html::escape;
use tracing::{error, info, warn};

use crate::bot::format::format_percentage;
use crate::bot::{keyboards, BotState, HandlerResult, HotPairsDialogue, State};
use crate::config::VerificationMode;
use crate::error::HotPairsError;
use crate::models::session::{Quote, Session};
use crate::orders::pricing::quote;
use crate::orders::ReviewTicket;
use crate::tracking::RegisterOutcome;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot & show main menu")]
    Start,
    #[command(description = "Show this help message")]
    Help,
    #[command(description = "Contact support")]
    Support,
    #[command(description = "Admin: track a token, /track <address> [chain]")]
    Track { args: String },
    #[command(description = "Admin: list tracked tokens")]
    Tracked,
}

const WELCOME: &str = "╔══════════════════════════╗\n  \
                       <b>🌟 HOT PAIRS BOT 🌟</b>\n\
                       ╚══════════════════════════╝\n\n\
                       Select a service below:";
const STEP_EXPIRED: &str = "⚠️ This step has expired. Use /start to begin again.";

// --- Authorization Check ---

fn is_admin(state: &BotState, user_id: Option<i64>) -> bool {
    user_id.map(|id| state.config.is_admin(id)).unwrap_or(false)
}

// --- Command Handler ---

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: HotPairsDialogue,
    state: Arc<BotState>,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    let user_id = msg.from().map(|user| user.id.0 as i64);

    info!("Received command: {:?} from user: {:?}", cmd, user_id);

    match cmd {
        Command::Start => {
            dialogue.reset().await?;
            bot.send_message(chat_id, WELCOME)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::main_menu())
                .await?;
        }
        Command::Help => {
            bot.send_message(chat_id, Command::descriptions().to_string()).await?;
        }
        Command::Support => {
            send_support(&bot, chat_id, &state).await?;
        }
        Command::Track { args } => {
            if !is_admin(&state, user_id) {
                warn!("Unauthorized /track attempt by user: {:?}", user_id);
                bot.send_message(chat_id, "⚠️ You are not authorized to use this command.").await?;
                return Ok(());
            }

            let mut parts = args.split_whitespace();
            let Some(address) = parts.next() else {
                bot.send_message(chat_id, "Usage: /track <address> [chain]").await?;
                return Ok(());
            };
            let chain = parts.next();

            let reply = match state.monitor.register(address, chain).await {
                Ok(RegisterOutcome::Added) => format!("👀 Now tracking <code>{}</code>", escape(address)),
                Ok(RegisterOutcome::AlreadyTracked) => {
                    format!("ℹ️ <code>{}</code> is already tracked", escape(address))
                }
                Ok(RegisterOutcome::NotFound) => {
                    format!("❌ No pair data found for <code>{}</code>", escape(address))
                }
                Err(e) => {
                    error!("Failed to register {}: {}", address, e);
                    format!("❌ {}", escape(&e.to_string()))
                }
            };
            bot.send_message(chat_id, reply).parse_mode(ParseMode::Html).await?;
        }
        Command::Tracked => {
            if !is_admin(&state, user_id) {
                warn!("Unauthorized /tracked attempt by user: {:?}", user_id);
                bot.send_message(chat_id, "⚠️ You are not authorized to use this command.").await?;
                return Ok(());
            }

            let reply = match state.monitor.tracked().await {
                Ok(tokens) if tokens.is_empty() => "✅ No tokens tracked yet.".to_string(),
                Ok(tokens) => format!(
                    "👀 <b>Tracked tokens ({})</b>\n\n{}",
                    tokens.len(),
                    tokens
                        .iter()
                        .map(|t| format!(
                            "• <b>{}</b> <code>{}</code>\n   {:?}, 1h {}, since {}",
                            escape(t.last_pair.symbol()),
                            escape(&t.address),
                            t.alert_state,
                            format_percentage(t.last_pair.change_h1()).0,
                            t.tracked_since.format("%Y-%m-%d %H:%M UTC")
                        ))
                        .collect::<Vec<_>>()
                        .join("\n")
                ),
                Err(e) => format!("❌ {}", escape(&e.to_string())),
            };
            bot.send_message(chat_id, reply).parse_mode(ParseMode::Html).await?;
        }
    }

    Ok(())
}

// --- Conversation Steps ---

pub async fn receive_contract_address(
    bot: Bot,
    msg: Message,
    dialogue: HotPairsDialogue,
    quote: Quote,
    state: Arc<BotState>,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    let Some(ca) = msg.text().map(str::trim).filter(|t| !t.is_empty()) else {
        bot.send_message(chat_id, "Please send the contract address as text.").await?;
        return Ok(());
    };

    let Some(chain_id) = state
        .config
        .market
        .network(&quote.network)
        .map(|n| n.chain_id.clone())
    else {
        error!("Quote references unknown network {}", quote.network);
        dialogue.reset().await?;
        bot.send_message(chat_id, STEP_EXPIRED).await?;
        return Ok(());
    };

    let Some(pair) = state.dex_client.fetch_best(&chain_id, ca).await else {
        bot.send_message(chat_id, "❌ Token not found. Check CA and network.").await?;
        return Ok(());
    };

    info!("Token found for {} on {}: {}", ca, chain_id, pair.symbol());
    let formatted = state.style.render(&pair);
    bot.send_message(
        chat_id,
        format!("🔍 <b>Token Found!</b>\n\n{}\n\nProceed to payment?", formatted.text),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(keyboards::confirmation_menu())
    .await?;

    dialogue
        .update(State::AwaitingConfirmation {
            session: quote.with_token(ca.to_string(), pair),
        })
        .await?;
    Ok(())
}

pub async fn receive_transaction_id(
    bot: Bot,
    msg: Message,
    dialogue: HotPairsDialogue,
    session: Session,
    state: Arc<BotState>,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    let Some(tx_id) = msg.text().map(str::trim).filter(|t| !t.is_empty()) else {
        bot.send_message(chat_id, "Please send your transaction hash as text.").await?;
        return Ok(());
    };

    let ticket = ReviewTicket::from_session(&session, chat_id.0, tx_id);
    dialogue.exit().await?;
    info!(
        "🧾 Order {} submitted by {} for {} ({}) on {}",
        ticket.order_id,
        chat_id,
        session.pair.symbol(),
        ticket.contract_address,
        ticket.network
    );

    bot.send_message(chat_id, "⏳ <b>Verifying Payment...</b>\nThis takes 1-5 minutes.")
        .parse_mode(ParseMode::Html)
        .await?;

    match &state.config.verification {
        VerificationMode::Manual => {
            let delivered = state
                .notification_manager
                .notify_admins(&ticket.render(), Some(keyboards::review_menu()))
                .await;
            if delivered == 0 {
                error!("Order {} could not be delivered to any admin", ticket.order_id);
                bot.send_message(
                    chat_id,
                    format!(
                        "⚠️ We could not reach the review team. Please contact {}.",
                        escape(&state.config.support_handle)
                    ),
                )
                .await?;
            }
        }
        VerificationMode::Timer(delay) => {
            state.notification_manager.notify_admins(&ticket.render(), None).await;

            let delay = *delay;
            let orders = state.orders.clone();
            let notifier = state.notification_manager.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                match orders.activate(&ticket).await {
                    Ok(report) => info!("Order {} auto-activated: {:?}", ticket.order_id, report),
                    Err(e) => {
                        error!("Auto-activation of order {} failed: {}", ticket.order_id, e);
                        notifier
                            .notify_admins(
                                &format!(
                                    "❌ Auto-activation failed for order {}: {}",
                                    ticket.order_id,
                                    escape(&e.to_string())
                                ),
                                None,
                            )
                            .await;
                    }
                }
            });
        }
    }

    Ok(())
}

pub async fn unexpected_message(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "Please use the buttons above, or /start to open the menu.")
        .await?;
    Ok(())
}

// --- Callback Query Handler ---

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    dialogue: HotPairsDialogue,
    state: Arc<BotState>,
) -> HandlerResult {
    let user_id = q.from.id.0 as i64;
    let (Some(data), Some(msg)) = (q.data.clone(), q.message.clone()) else {
        warn!("Received callback query with no data or message.");
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    info!("Received callback query with data: {} from user: {}", data, user_id);

    // This variable will store the text for the answer_callback_query notification
    let mut notification_text: Option<String> = None;
    let current = dialogue.get().await?.unwrap_or_default();

    match data.as_str() {
        "start" => {
            dialogue.reset().await?;
            edit(&bot, &msg, WELCOME, keyboards::main_menu()).await?;
        }
        "get_hot_pairs" => {
            dialogue.update(State::AwaitingNetwork).await?;
            edit(
                &bot,
                &msg,
                "🔥 <b>Hot Pairs</b>\nSelect network:",
                keyboards::network_menu(&state.config.market),
            )
            .await?;
        }
        "support" => {
            send_support(&bot, msg.chat.id, &state).await?;
        }
        "cancel_order" => {
            dialogue.reset().await?;
            edit(&bot, &msg, "❌ Order cancelled.", keyboards::back_to_menu()).await?;
        }
        "confirm_order" => match current {
            State::AwaitingConfirmation { session } => {
                clear_keyboard(&bot, &msg).await;
                confirm_order(&bot, msg.chat.id, &dialogue, &state, session).await?;
            }
            _ => notification_text = Some(STEP_EXPIRED.to_string()),
        },
        "paid" => match current {
            State::AwaitingPayment { session } => {
                clear_keyboard(&bot, &msg).await;
                dialogue.update(State::AwaitingTransactionId { session }).await?;
                bot.send_message(msg.chat.id, "Please send your <b>Transaction Hash / ID</b>:")
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            _ => notification_text = Some(STEP_EXPIRED.to_string()),
        },
        "review_activate" | "review_reject" => {
            notification_text = review_order(&bot, &msg, user_id, data == "review_activate", &state).await?;
        }
        other => {
            if let Some(network) = other.strip_prefix("net_") {
                notification_text = select_network(&bot, &msg, &dialogue, &state, network).await?;
            } else if let Some(duration) = other.strip_prefix("dur_") {
                notification_text = match current {
                    State::AwaitingDuration { network } => {
                        select_duration(&bot, &msg, &dialogue, &state, &network, duration).await?
                    }
                    _ => Some(STEP_EXPIRED.to_string()),
                };
            } else {
                warn!("Unhandled callback data: {}", data);
                notification_text = Some("⚠️ Action not implemented yet.".to_string());
            }
        }
    }

    // Answer the callback query to remove the "loading" state
    if let Some(text) = notification_text {
        bot.answer_callback_query(q.id).text(text).show_alert(false).await?;
    } else {
        bot.answer_callback_query(q.id).await?;
    }

    Ok(())
}

async fn select_network(
    bot: &Bot,
    msg: &Message,
    dialogue: &HotPairsDialogue,
    state: &BotState,
    key: &str,
) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
    let market = &state.config.market;
    let Some(network) = market.network(key) else {
        warn!("Unknown network selected: {}", key);
        return Ok(Some("⚠️ Unknown network.".to_string()));
    };

    let quotes = match market
        .packages
        .iter()
        .map(|p| quote(market, &network.key, &p.label))
        .collect::<Result<Vec<Quote>, _>>()
    {
        Ok(quotes) => quotes,
        Err(e) => {
            error!("Failed to price packages for {}: {}", network.key, e);
            return Ok(Some(format!("❌ {}", e)));
        }
    };

    dialogue
        .update(State::AwaitingDuration {
            network: network.key.clone(),
        })
        .await?;
    edit(
        bot,
        msg,
        &format!("⏰ Select duration for {}:", escape(&network.display_name.to_uppercase())),
        keyboards::duration_menu(&quotes),
    )
    .await?;
    Ok(None)
}

async fn select_duration(
    bot: &Bot,
    msg: &Message,
    dialogue: &HotPairsDialogue,
    state: &BotState,
    network: &str,
    duration: &str,
) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
    let selected = match quote(&state.config.market, network, duration) {
        Ok(q) => q,
        Err(e) => {
            warn!("Failed to quote {} on {}: {}", duration, network, e);
            return Ok(Some(format!("❌ {}", e)));
        }
    };

    let text = format!(
        "✅ Selected {} for {}.\n\nPlease send the <b>Contract Address (CA)</b>:",
        escape(&selected.duration),
        escape(&network.to_uppercase())
    );
    dialogue
        .update(State::AwaitingContractAddress { quote: selected })
        .await?;
    edit(bot, msg, &text, keyboards::back_to_menu()).await?;
    Ok(None)
}

async fn confirm_order(
    bot: &Bot,
    chat_id: ChatId,
    dialogue: &HotPairsDialogue,
    state: &BotState,
    session: Session,
) -> HandlerResult {
    let wallet = state
        .config
        .market
        .network(&session.network)
        .map(|n| n.wallet.trim().to_string())
        .unwrap_or_default();

    if wallet.is_empty() {
        error!("No payment wallet configured for {}", session.network);
        dialogue.reset().await?;
        bot.send_message(
            chat_id,
            format!(
                "⚠️ Payments on {} are not available right now. Please contact {}.",
                escape(&session.network.to_uppercase()),
                escape(&state.config.support_handle)
            ),
        )
        .await?;
        return Ok(());
    }

    let pay_msg = format!(
        "💳 <b>PAYMENT DETAILS</b>\n\n\
         🔥 <b>Service:</b> Hot Pairs ({})\n\
         💰 <b>Amount:</b> {} {} (${} USD)\n\
         🏦 <b>Wallet:</b>\n<code>{}</code>\n\n\
         Send payment and click Paid.",
        escape(&session.duration),
        session.crypto_amount,
        escape(&session.payment_unit),
        session.usd_price,
        escape(&wallet)
    );
    bot.send_message(chat_id, pay_msg)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::payment_menu())
        .await?;

    dialogue.update(State::AwaitingPayment { session }).await?;
    Ok(())
}

async fn review_order(
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    activate: bool,
    state: &BotState,
) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
    if !state.config.is_admin(user_id) {
        warn!("Unauthorized review attempt by user: {}", user_id);
        return Ok(Some("⚠️ You are not authorized for this action.".to_string()));
    }

    let ticket = match msg.text().map(ReviewTicket::parse) {
        Some(Ok(ticket)) => ticket,
        Some(Err(e)) => {
            warn!("Admin {} pressed review on an unreadable ticket: {}", user_id, e);
            bot.send_message(msg.chat.id, format!("❌ {}", escape(&e.to_string())))
                .reply_to_message_id(msg.id)
                .await?;
            return Ok(Some("❌ Could not read order".to_string()));
        }
        None => {
            bot.send_message(msg.chat.id, "❌ Could not read review ticket: message has no text")
                .reply_to_message_id(msg.id)
                .await?;
            return Ok(Some("❌ Could not read order".to_string()));
        }
    };

    // Drop the buttons first so a second click cannot activate twice
    clear_keyboard(bot, msg).await;

    if !activate {
        let notified = state.orders.reject(&ticket).await;
        bot.send_message(
            msg.chat.id,
            format!(
                "❌ Order {} rejected{}",
                ticket.order_id,
                if notified { "" } else { " (customer could not be notified)" }
            ),
        )
        .reply_to_message_id(msg.id)
        .await?;
        return Ok(Some("Order rejected".to_string()));
    }

    match state.orders.activate(&ticket).await {
        Ok(report) => {
            let outcome = match report.outcome {
                RegisterOutcome::Added => "monitoring started",
                RegisterOutcome::AlreadyTracked => "already monitored",
                RegisterOutcome::NotFound => "monitor found no data",
            };
            bot.send_message(
                msg.chat.id,
                format!(
                    "✅ Order {} activated: <b>{}</b>, {}{}{}",
                    ticket.order_id,
                    escape(&report.symbol),
                    outcome,
                    if report.broadcast_delivered { "" } else { ", channel post failed" },
                    if report.customer_notified { "" } else { ", customer not notified" },
                ),
            )
            .parse_mode(ParseMode::Html)
            .reply_to_message_id(msg.id)
            .await?;
            Ok(Some("✅ Activated".to_string()))
        }
        Err(HotPairsError::OrderAlreadyClaimed(_)) => {
            info!("Admin {} clicked Activate on claimed order {}", user_id, ticket.order_id);
            Ok(Some("ℹ️ This order is already activated".to_string()))
        }
        Err(e) => {
            error!("Activation of order {} failed: {}", ticket.order_id, e);
            bot.send_message(
                msg.chat.id,
                format!("❌ Activation failed for order {}: {}", ticket.order_id, escape(&e.to_string())),
            )
            .reply_to_message_id(msg.id)
            .await?;
            // Put the buttons back so the admin can retry
            bot.edit_message_reply_markup(msg.chat.id, msg.id)
                .reply_markup(keyboards::review_menu())
                .await?;
            Ok(Some("❌ Activation failed".to_string()))
        }
    }
}

// --- Helpers ---

async fn send_support(bot: &Bot, chat_id: ChatId, state: &BotState) -> HandlerResult {
    bot.send_message(
        chat_id,
        format!("🛠 <b>Support:</b> {}", escape(&state.config.support_handle)),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

async fn edit(bot: &Bot, msg: &Message, text: &str, keyboard: InlineKeyboardMarkup) -> HandlerResult {
    bot.edit_message_text(msg.chat.id, msg.id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn clear_keyboard(bot: &Bot, msg: &Message) {
    if let Err(e) = bot.edit_message_reply_markup(msg.chat.id, msg.id).await {
        warn!("Failed to clear keyboard on message {}: {}", msg.id, e);
    }
}

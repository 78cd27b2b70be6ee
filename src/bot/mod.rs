use anyhow::Result;
use std::sync::Arc;
use teloxide::dispatching::dialogue::{self, InMemStorage};
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::api::dexscreener::DexScreenerClient;
use crate::config::Config;
use crate::models::session::{Quote, Session};
use crate::orders::OrderDesk;
use crate::tracking::MonitorHandle;

pub mod commands;
pub mod format;
pub mod keyboards;
pub mod notification;

use commands::Command;
use format::PostStyle;
use notification::NotificationManager;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
pub type HotPairsDialogue = Dialogue<State, InMemStorage<State>>;

/// Shared services handed to every handler
#[derive(Clone)]
pub struct BotState {
    pub config: Arc<Config>,
    pub dex_client: Arc<DexScreenerClient>,
    pub monitor: MonitorHandle,
    pub orders: OrderDesk,
    pub notification_manager: Arc<NotificationManager>,
    pub style: PostStyle,
}

/// Where a customer is in the ordering conversation.
#[derive(Clone, Debug, Default)]
pub enum State {
    #[default]
    Start,
    AwaitingNetwork,
    AwaitingDuration {
        network: String,
    },
    AwaitingContractAddress {
        quote: Quote,
    },
    AwaitingConfirmation {
        session: Session,
    },
    AwaitingPayment {
        session: Session,
    },
    AwaitingTransactionId {
        session: Session,
    },
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>().endpoint(commands::command_handler);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(case![State::AwaitingContractAddress { quote }].endpoint(commands::receive_contract_address))
        .branch(case![State::AwaitingTransactionId { session }].endpoint(commands::receive_transaction_id))
        .branch(dptree::endpoint(commands::unexpected_message));

    let callback_query_handler = Update::filter_callback_query().endpoint(commands::callback_handler);

    dialogue::enter::<Update, InMemStorage<State>, State, _>()
        .branch(message_handler)
        .branch(callback_query_handler)
}

pub async fn start_bot(bot: Bot, state: Arc<BotState>) -> Result<()> {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    info!("Dispatcher starting, waiting for updates...");
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![InMemStorage::<State>::new(), state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Dispatcher stopped");
    Ok(())
}

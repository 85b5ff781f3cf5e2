//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, warn};

use super::dialogue_manager::DialogueManager;
use super::message_handler::{deliver, report_error, sender_from_user};

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    manager: Arc<DialogueManager>,
) -> Result<()> {
    let sender = sender_from_user(&q.from);
    let data = q.data.as_deref().unwrap_or_default();
    debug!(user_id = sender.id, data = %data, "Received callback query from user");

    // Private chats share the user's id
    let chat_id = q
        .message
        .as_ref()
        .map(|msg| msg.chat().id)
        .unwrap_or(ChatId(sender.id));

    // Stop the button's loading state before any reply is delivered
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id = sender.id, error = %e, "Failed to answer callback query");
    }

    match manager.handle_callback(&sender, data).await {
        Ok(outcome) => {
            if outcome.strip_source_keyboard {
                if let Some(msg) = &q.message {
                    if let Err(e) = bot.edit_message_reply_markup(chat_id, msg.id()).await {
                        warn!(user_id = sender.id, error = %e, "Failed to remove inline keyboard");
                    }
                }
            }
            deliver(&bot, chat_id, &outcome.replies, sender.lang()).await?;
        }
        Err(e) => report_error(&bot, chat_id, &sender, &e).await?,
    }

    Ok(())
}

//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, error};

use crate::dialogue::display_name;
use crate::errors::DialogueError;
use crate::localization::t_lang;

use super::dialogue_manager::{error_reply, DialogueManager, Sender};
use super::ui_builder::{to_reply_markup, Reply};

/// Identity and language of the Telegram user behind an update
pub fn sender_from_user(user: &teloxide::types::User) -> Sender {
    Sender {
        id: user.id.0 as i64,
        name: display_name(&user.first_name, user.username.as_deref()),
        language_code: user.language_code.clone(),
    }
}

/// Send replies in order, attaching each reply's keyboard
pub async fn deliver(
    bot: &Bot,
    chat_id: ChatId,
    replies: &[Reply],
    language_code: Option<&str>,
) -> Result<()> {
    for reply in replies {
        let mut request = bot.send_message(chat_id, &reply.text);
        if let Some(markup) = to_reply_markup(&reply.keyboard, language_code) {
            request = request.reply_markup(markup);
        }
        request.await?;
    }
    Ok(())
}

/// Log an error that escaped the dialogue handlers and tell the user
pub async fn report_error(
    bot: &Bot,
    chat_id: ChatId,
    sender: &Sender,
    err: &DialogueError,
) -> Result<()> {
    match err {
        // Already logged where it was raised
        DialogueError::Unauthorized { .. } => {}
        _ => error!(user_id = sender.id, error = %err, "Failed to handle update"),
    }

    deliver(bot, chat_id, &[error_reply(err, sender.lang())], sender.lang()).await
}

pub async fn message_handler(bot: Bot, msg: Message, manager: Arc<DialogueManager>) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without sender");
        return Ok(());
    };
    let sender = sender_from_user(from);

    let Some(text) = msg.text() else {
        debug!(user_id = sender.id, "Received unsupported message type from user");
        bot.send_message(msg.chat.id, t_lang("unsupported-message", sender.lang()))
            .await?;
        return Ok(());
    };

    debug!(user_id = sender.id, message_length = text.len(), "Received text message from user");

    match manager.handle_text(&sender, text).await {
        Ok(outcome) => deliver(&bot, msg.chat.id, &outcome.replies, sender.lang()).await,
        Err(e) => report_error(&bot, msg.chat.id, &sender, &e).await,
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::ChatAction;

use super::{keyboards::main_keyboard, BotState};
use crate::text::{split_message, TELEGRAM_MESSAGE_LIMIT};

/// Full completion round trip for one user message.
///
/// The user turn is recorded before the API call; if the call fails no
/// assistant turn is appended, so the windows stay as the original left
/// them (the unanswered turn remains the trailing user message).
pub async fn respond(bot: &Bot, chat_id: ChatId, state: &Arc<BotState>, text: &str) -> Result<()> {
    state.memory.append_user_message(chat_id.0, text)?;

    let system_prompt = {
        let catalog = state.catalog();
        let mode = state.memory.state(chat_id.0)?.mode;
        catalog.system_prompt(mode.as_deref()).to_string()
    };
    let messages = state.memory.api_messages(chat_id.0, &system_prompt)?;

    // Cosmetic "typing..." while the request is in flight.
    let typing = tokio::spawn(keep_typing(bot.clone(), chat_id));
    let reply = state.llm.chat(&messages).await;
    typing.abort();

    let reply = match reply {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!("OpenAI request failed for chat {chat_id}: {e:#}");
            let reason: String = e.to_string().chars().take(300).collect();
            bot.send_message(
                chat_id,
                format!(
                    "⚠️ The OpenAI request failed.\n\n\
                     Reason: {reason}\n\n\
                     Check the API key and limits, then try again or write a shorter message."
                ),
            )
            .reply_markup(main_keyboard())
            .await?;
            return Ok(());
        }
    };

    if let Some(usage) = reply.usage {
        tracing::info!(
            "OpenAI usage for chat {chat_id}: input={}, output={}",
            usage.input_tokens,
            usage.output_tokens
        );
        state
            .memory
            .add_tokens(chat_id.0, usage.input_tokens, usage.output_tokens)?;
    }

    if reply.content.is_empty() {
        bot.send_message(chat_id, "The model returned an empty reply.")
            .reply_markup(main_keyboard())
            .await?;
        return Ok(());
    }

    state.memory.append_assistant_message(chat_id.0, &reply.content)?;

    let chunks = split_message(&reply.content, TELEGRAM_MESSAGE_LIMIT);
    let last = chunks.len().saturating_sub(1);
    for (i, chunk) in chunks.iter().enumerate() {
        // Only the final chunk re-attaches the keyboard.
        if i == last {
            bot.send_message(chat_id, chunk)
                .reply_markup(main_keyboard())
                .await?;
        } else {
            bot.send_message(chat_id, chunk).await?;
        }
    }
    Ok(())
}

/// Resend the Typing action every few seconds until aborted.
/// Telegram shows the indicator for ~5 s per action.
async fn keep_typing(bot: Bot, chat_id: ChatId) {
    loop {
        if bot
            .send_chat_action(chat_id, ChatAction::Typing)
            .await
            .is_err()
        {
            break;
        }
        tokio::time::sleep(Duration::from_secs(4)).await;
    }
}

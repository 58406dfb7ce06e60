use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile};

use super::{
    keyboards::{
        background_keyboard, format_keyboard, image_menu_keyboard, main_keyboard,
        quality_keyboard, size_keyboard,
    },
    BotState,
};
use crate::llm::{
    ImageBackground, ImageFormat, ImageOutput, ImageQuality, ImageSettings, ImageSize,
};

/// Enter the image settings menu for a chat.
pub async fn open_menu(bot: &Bot, chat_id: ChatId, state: &Arc<BotState>) -> Result<()> {
    state.enter_image_menu(chat_id);
    let text = format!(
        "Image generation settings:\n\n{}\n\nPick a parameter, or press \"Describe image\" to generate.",
        settings_text(state.image_settings(chat_id))
    );
    bot.send_message(chat_id, text)
        .reply_markup(image_menu_keyboard())
        .await?;
    Ok(())
}

/// Menu buttons, active only while the chat is in the image menu.
/// Returns false when `text` is none of them so routing can continue.
pub async fn handle_menu_button(
    bot: &Bot,
    chat_id: ChatId,
    state: &Arc<BotState>,
    text: &str,
) -> Result<bool> {
    match text {
        "Quality" => {
            bot.send_message(chat_id, "Choose quality:")
                .reply_markup(quality_keyboard())
                .await?;
        }
        "Size" => {
            bot.send_message(chat_id, "Choose size:")
                .reply_markup(size_keyboard())
                .await?;
        }
        "Background" => {
            bot.send_message(chat_id, "Choose background:")
                .reply_markup(background_keyboard())
                .await?;
        }
        "Format" => {
            bot.send_message(chat_id, "Choose file format:")
                .reply_markup(format_keyboard())
                .await?;
        }
        "Describe image" => {
            state.await_image_prompt(chat_id);
            bot.send_message(chat_id, "Send the image description in your next message:")
                .reply_markup(main_keyboard())
                .await?;
        }
        "Back" => {
            state.leave_image_menu(chat_id);
            super::cmd_start(bot, chat_id, state).await?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// `img_q:` / `img_s:` / `img_bg:` / `img_fmt:` inline selections.
pub async fn handle_callback(
    bot: &Bot,
    q: &CallbackQuery,
    chat_id: ChatId,
    state: &Arc<BotState>,
    data: &str,
) -> Result<()> {
    let ack = if let Some(v) = data.strip_prefix("img_q:") {
        ImageQuality::parse(v).map(|quality| {
            state.update_image_settings(chat_id, |s| s.quality = quality);
            format!("Quality: {v}")
        })
    } else if let Some(v) = data.strip_prefix("img_s:") {
        ImageSize::parse(v).map(|size| {
            state.update_image_settings(chat_id, |s| s.size = size);
            format!("Size: {v}")
        })
    } else if let Some(v) = data.strip_prefix("img_bg:") {
        ImageBackground::parse(v).map(|background| {
            state.update_image_settings(chat_id, |s| s.background = background);
            format!("Background: {v}")
        })
    } else if let Some(v) = data.strip_prefix("img_fmt:") {
        ImageFormat::parse(v).map(|format| {
            state.update_image_settings(chat_id, |s| s.format = format);
            format!("Format: {v}")
        })
    } else {
        None
    };

    let Some(ack) = ack else {
        bot.answer_callback_query(&q.id)
            .text("Unknown option.")
            .await?;
        return Ok(());
    };

    bot.answer_callback_query(&q.id).text(&ack).await?;
    let text = format!(
        "Settings updated.\n\n{}",
        settings_text(state.image_settings(chat_id))
    );
    bot.send_message(chat_id, text)
        .reply_markup(image_menu_keyboard())
        .await?;
    Ok(())
}

/// `/image <description>` — generate without going through the menu.
pub async fn cmd_image(
    bot: &Bot,
    chat_id: ChatId,
    state: &Arc<BotState>,
    prompt: &str,
) -> Result<()> {
    if prompt.is_empty() {
        bot.send_message(chat_id, "Add a description after the command: /image a cat on the moon")
            .reply_markup(main_keyboard())
            .await?;
        return Ok(());
    }
    request_image(bot, chat_id, state, prompt).await
}

/// Generate an image for `prompt` and deliver it to the chat.
pub async fn request_image(
    bot: &Bot,
    chat_id: ChatId,
    state: &Arc<BotState>,
    prompt: &str,
) -> Result<()> {
    let settings = state.image_settings(chat_id);
    let _ = bot
        .send_chat_action(chat_id, ChatAction::UploadPhoto)
        .await;

    match state.llm.generate_image(prompt, settings).await {
        Ok(ImageOutput::Bytes(bytes)) => {
            let file = InputFile::memory(bytes)
                .file_name(format!("image.{}", settings.format.as_str()));
            bot.send_photo(chat_id, file)
                .reply_markup(main_keyboard())
                .await?;
        }
        Ok(ImageOutput::Url(url)) => {
            let url = reqwest::Url::parse(&url)?;
            bot.send_photo(chat_id, InputFile::url(url))
                .reply_markup(main_keyboard())
                .await?;
        }
        Err(e) => {
            tracing::error!("Image generation failed for chat {chat_id}: {e:#}");
            bot.send_message(
                chat_id,
                "⚠️ Could not generate the image. Check the API key and limits, or try another description.",
            )
            .reply_markup(main_keyboard())
            .await?;
        }
    }
    Ok(())
}

fn settings_text(settings: ImageSettings) -> String {
    format!(
        "Quality: {}\nSize: {}\nBackground: {}\nFormat: {}",
        settings.quality.as_str(),
        settings.size.label(),
        settings.background.as_str(),
        settings.format.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_text_shows_size_label() {
        let text = settings_text(ImageSettings::default());
        assert!(text.contains("Quality: low"));
        assert!(text.contains("Size: Portrait 1024×1536"));
        assert!(text.contains("Background: auto"));
        assert!(text.contains("Format: png"));
    }
}

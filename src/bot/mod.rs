mod chat;
mod image;
mod keyboards;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::Result;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::dptree;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;

use crate::config::OpenAiConfig;
use crate::llm::{ImageSettings, OpenAiClient};
use crate::memory::MemoryStore;
use crate::prompts::PromptCatalog;

use keyboards::main_keyboard;

/// Everything the handlers share, owned by the application root.
pub struct BotState {
    catalog: RwLock<PromptCatalog>,
    prompts_path: PathBuf,
    pub memory: MemoryStore,
    pub llm: OpenAiClient,
    cost_per_1m_input: f64,
    cost_per_1m_output: f64,
    menus: Mutex<MenuState>,
}

/// Transient per-chat menu state. Process-local on purpose: losing it on
/// restart only drops a half-open menu, not conversation history.
#[derive(Default)]
struct MenuState {
    in_image_menu: HashSet<ChatId>,
    awaiting_image_prompt: HashSet<ChatId>,
    image_settings: HashMap<ChatId, ImageSettings>,
}

impl BotState {
    pub fn new(
        catalog: PromptCatalog,
        prompts_path: PathBuf,
        memory: MemoryStore,
        llm: OpenAiClient,
        openai: &OpenAiConfig,
    ) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            prompts_path,
            memory,
            llm,
            cost_per_1m_input: openai.cost_per_1m_input,
            cost_per_1m_output: openai.cost_per_1m_output,
            menus: Mutex::new(MenuState::default()),
        }
    }

    fn catalog(&self) -> std::sync::RwLockReadGuard<'_, PromptCatalog> {
        self.catalog.read().expect("catalog lock poisoned")
    }

    /// Re-read the prompt catalog from disk, swapping it in for all chats.
    fn reload_catalog(&self) -> Result<usize> {
        let fresh = PromptCatalog::load(&self.prompts_path)?;
        let count = fresh.modes().count();
        *self.catalog.write().expect("catalog lock poisoned") = fresh;
        Ok(count)
    }

    fn enter_image_menu(&self, chat_id: ChatId) {
        let mut menus = self.menus.lock().expect("menu lock poisoned");
        menus.in_image_menu.insert(chat_id);
        menus.image_settings.entry(chat_id).or_default();
    }

    fn leave_image_menu(&self, chat_id: ChatId) {
        self.menus
            .lock()
            .expect("menu lock poisoned")
            .in_image_menu
            .remove(&chat_id);
    }

    fn in_image_menu(&self, chat_id: ChatId) -> bool {
        self.menus
            .lock()
            .expect("menu lock poisoned")
            .in_image_menu
            .contains(&chat_id)
    }

    fn await_image_prompt(&self, chat_id: ChatId) {
        let mut menus = self.menus.lock().expect("menu lock poisoned");
        menus.in_image_menu.remove(&chat_id);
        menus.awaiting_image_prompt.insert(chat_id);
    }

    /// Clears and reports the "next message is an image description" flag.
    fn take_awaiting_image_prompt(&self, chat_id: ChatId) -> bool {
        self.menus
            .lock()
            .expect("menu lock poisoned")
            .awaiting_image_prompt
            .remove(&chat_id)
    }

    fn image_settings(&self, chat_id: ChatId) -> ImageSettings {
        let mut menus = self.menus.lock().expect("menu lock poisoned");
        *menus.image_settings.entry(chat_id).or_default()
    }

    fn update_image_settings(&self, chat_id: ChatId, f: impl FnOnce(&mut ImageSettings)) {
        let mut menus = self.menus.lock().expect("menu lock poisoned");
        f(menus.image_settings.entry(chat_id).or_default());
    }
}

/// Run the long-polling dispatcher until ctrl-c.
pub async fn run(token: &str, state: Arc<BotState>) -> Result<()> {
    let bot = Bot::new(token);

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_endpoint))
        .branch(Update::filter_callback_query().endpoint(callback_endpoint));

    tracing::info!("Bot starting (long polling)");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            tracing::debug!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in update handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    tracing::info!("Dispatcher stopped");
    Ok(())
}

async fn message_endpoint(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    if let Err(e) = handle_message(&bot, &msg, &state).await {
        tracing::error!("Failed to handle message in chat {chat_id}: {e:#}");
        let _ = bot
            .send_message(
                chat_id,
                "⚠️ Something went wrong. Try Restart or send the message again later.",
            )
            .reply_markup(main_keyboard())
            .await;
    }
    Ok(())
}

async fn handle_message(bot: &Bot, msg: &Message, state: &Arc<BotState>) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }
    let chat_id = msg.chat.id;

    match text {
        "/start" | "Restart" => cmd_start(bot, chat_id, state).await,
        "/mode" | "Mode" => cmd_mode(bot, chat_id, state).await,
        "/reset" | "Clear history" => cmd_reset(bot, chat_id, state).await,
        "/stats" | "Stats" => cmd_stats(bot, chat_id, state).await,
        "/reset_stats" | "Reset stats" => cmd_reset_stats(bot, chat_id, state).await,
        "/reload" => cmd_reload(bot, chat_id, state).await,
        "Image" => image::open_menu(bot, chat_id, state).await,
        t if t == "/image" || t.starts_with("/image ") => {
            let prompt = t.strip_prefix("/image").unwrap_or_default().trim();
            image::cmd_image(bot, chat_id, state, prompt).await
        }
        other => route_text(bot, chat_id, state, other).await,
    }
}

/// Plain text: image-menu buttons, a pending image description, a bare
/// mode key, or — the common case — a question for the model.
async fn route_text(bot: &Bot, chat_id: ChatId, state: &Arc<BotState>, text: &str) -> Result<()> {
    if state.in_image_menu(chat_id) && image::handle_menu_button(bot, chat_id, state, text).await? {
        return Ok(());
    }

    if state.take_awaiting_image_prompt(chat_id) {
        return image::request_image(bot, chat_id, state, text).await;
    }

    let mode_key = mode_key_from_text(&state.catalog(), text);
    if let Some(key) = mode_key {
        state.memory.set_mode(chat_id.0, &key)?;
        let name = state.catalog().display_name(&key).to_string();
        bot.send_message(chat_id, format!("Mode changed to: {name}"))
            .reply_markup(main_keyboard())
            .await?;
        return Ok(());
    }

    chat::respond(bot, chat_id, state, text).await
}

/// Treat a short message that exactly matches a catalog key as a mode switch.
fn mode_key_from_text(catalog: &PromptCatalog, text: &str) -> Option<String> {
    if text.is_empty() || text.len() > 50 {
        return None;
    }
    let key = text.trim().to_lowercase();
    catalog.contains(&key).then_some(key)
}

async fn cmd_start(bot: &Bot, chat_id: ChatId, state: &Arc<BotState>) -> Result<()> {
    let current_mode = {
        let catalog = state.catalog();
        let mode = state.memory.state(chat_id.0)?.mode;
        catalog
            .display_name(mode.as_deref().unwrap_or(catalog.default_mode()))
            .to_string()
    };
    let text = format!(
        "Hi! I'm a chat bot backed by OpenAI.\n\n\
         Current mode: {current_mode}\n\n\
         Use the buttons below or the commands:\n\
         • Mode — switch the assistant persona\n\
         • Clear history — start the conversation over\n\n\
         Just send a message and I'll answer with context."
    );
    bot.send_message(chat_id, text)
        .reply_markup(main_keyboard())
        .await?;
    Ok(())
}

async fn cmd_mode(bot: &Bot, chat_id: ChatId, state: &Arc<BotState>) -> Result<()> {
    let (text, keyboard) = {
        let catalog = state.catalog();
        let mut entries: Vec<_> = catalog.modes().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut lines = vec!["Pick an assistant mode:".to_string(), String::new()];
        for (_, mode) in &entries {
            lines.push(format!("• {} — {}", mode.name, mode.description));
        }
        (lines.join("\n"), keyboards::mode_keyboard(&catalog))
    };
    bot.send_message(chat_id, text)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn cmd_reset(bot: &Bot, chat_id: ChatId, state: &Arc<BotState>) -> Result<()> {
    state.memory.reset_history(chat_id.0)?;
    bot.send_message(chat_id, "Conversation history cleared.")
        .reply_markup(main_keyboard())
        .await?;
    Ok(())
}

async fn cmd_stats(bot: &Bot, chat_id: ChatId, state: &Arc<BotState>) -> Result<()> {
    let (input, output) = state.memory.stats(chat_id.0)?;
    let cost = (input as f64 / 1_000_000.0 * state.cost_per_1m_input)
        + (output as f64 / 1_000_000.0 * state.cost_per_1m_output);
    let text = format!(
        "📊 OpenAI usage for this chat\n\n\
         Input tokens: {input}\n\
         Output tokens: {output}\n\n\
         Estimated cost at ${:.2}/${:.2} per 1M: ${cost:.4}",
        state.cost_per_1m_input, state.cost_per_1m_output,
    );
    bot.send_message(chat_id, text)
        .reply_markup(main_keyboard())
        .await?;
    Ok(())
}

async fn cmd_reset_stats(bot: &Bot, chat_id: ChatId, state: &Arc<BotState>) -> Result<()> {
    state.memory.reset_stats(chat_id.0)?;
    bot.send_message(chat_id, "Token statistics reset.")
        .reply_markup(main_keyboard())
        .await?;
    Ok(())
}

async fn cmd_reload(bot: &Bot, chat_id: ChatId, state: &Arc<BotState>) -> Result<()> {
    match state.reload_catalog() {
        Ok(count) => {
            tracing::info!("Prompt catalog reloaded ({count} modes)");
            bot.send_message(chat_id, format!("Prompts reloaded: {count} modes."))
                .reply_markup(main_keyboard())
                .await?;
        }
        Err(e) => {
            tracing::error!("Prompt reload failed: {e:#}");
            bot.send_message(chat_id, format!("Reload failed: {e}"))
                .reply_markup(main_keyboard())
                .await?;
        }
    }
    Ok(())
}

async fn callback_endpoint(bot: Bot, q: CallbackQuery, state: Arc<BotState>) -> ResponseResult<()> {
    if let Err(e) = handle_callback(&bot, &q, &state).await {
        tracing::error!("Failed to handle callback from {}: {e:#}", q.from.id);
    }
    Ok(())
}

async fn handle_callback(bot: &Bot, q: &CallbackQuery, state: &Arc<BotState>) -> Result<()> {
    let Some(data) = q.data.as_deref() else {
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    };
    let Some(chat_id) = q.message.as_ref().map(|m| m.chat().id) else {
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    };

    if let Some(key) = data.strip_prefix("mode:") {
        return select_mode(bot, q, chat_id, state, key).await;
    }
    if data.starts_with("img_") {
        return image::handle_callback(bot, q, chat_id, state, data).await;
    }

    bot.answer_callback_query(&q.id).await?;
    Ok(())
}

async fn select_mode(
    bot: &Bot,
    q: &CallbackQuery,
    chat_id: ChatId,
    state: &Arc<BotState>,
    key: &str,
) -> Result<()> {
    if !state.catalog().contains(key) {
        bot.answer_callback_query(&q.id).text("Unknown mode.").await?;
        return Ok(());
    }
    state.memory.set_mode(chat_id.0, key)?;
    let name = state.catalog().display_name(key).to_string();
    bot.answer_callback_query(&q.id).await?;
    bot.send_message(chat_id, format!("Mode changed to: {name}"))
        .reply_markup(main_keyboard())
        .await?;
    Ok(())
}

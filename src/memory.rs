use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::Message;

/// Per-chat conversation state.
///
/// `mode: None` means "use the catalog default". Token counters are
/// cumulative and survive `/reset`; only `/reset_stats` zeroes them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatState {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub user_messages: Vec<String>,
    #[serde(default)]
    pub assistant_messages: Vec<String>,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// File-backed store of chat state, one JSON document for all chats.
///
/// The whole document is held in memory and rewritten after every
/// mutation; the mutex serializes read-modify-persist across handlers.
pub struct MemoryStore {
    path: PathBuf,
    max_user_messages: usize,
    max_assistant_messages: usize,
    chats: Mutex<HashMap<String, ChatState>>,
}

fn chat_key(chat_id: i64) -> String {
    chat_id.to_string()
}

impl MemoryStore {
    /// Open the store, reading `path` if it exists.
    ///
    /// A missing or unparsable document is treated as an empty store:
    /// corruption is non-fatal by policy, it only costs history.
    pub fn open(path: PathBuf, max_user_messages: usize, max_assistant_messages: usize) -> Self {
        let chats = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(chats) => chats,
                Err(e) => {
                    tracing::warn!(
                        "Memory file {} is unparsable ({e}), starting empty",
                        path.display()
                    );
                    HashMap::new()
                }
            },
            Err(e) => {
                tracing::debug!("Memory file {} not read ({e}), starting empty", path.display());
                HashMap::new()
            }
        };
        Self {
            path,
            max_user_messages,
            max_assistant_messages,
            chats: Mutex::new(chats),
        }
    }

    /// Chat state, created with defaults (and persisted) on first access.
    pub fn state(&self, chat_id: i64) -> Result<ChatState> {
        let mut chats = self.chats.lock().expect("memory lock poisoned");
        let key = chat_key(chat_id);
        if let Some(state) = chats.get(&key) {
            return Ok(state.clone());
        }
        let state = ChatState::default();
        chats.insert(key, state.clone());
        self.persist(&chats)?;
        Ok(state)
    }

    pub fn set_mode(&self, chat_id: i64, mode: &str) -> Result<()> {
        self.mutate(chat_id, |state| state.mode = Some(mode.to_string()))
    }

    /// Append a user turn, truncating to the newest `max_user_messages`.
    pub fn append_user_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let max = self.max_user_messages;
        self.mutate(chat_id, |state| {
            state.user_messages.push(text.to_string());
            truncate_front(&mut state.user_messages, max);
        })
    }

    /// Append an assistant turn, truncating to the newest `max_assistant_messages`.
    pub fn append_assistant_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let max = self.max_assistant_messages;
        self.mutate(chat_id, |state| {
            state.assistant_messages.push(text.to_string());
            truncate_front(&mut state.assistant_messages, max);
        })
    }

    /// Assemble the message sequence for a completion request.
    ///
    /// One system entry, then the earliest `n = min(user, assistant)`
    /// turns paired positionally, then the most recent user message when
    /// the user window is longer (the just-submitted, unanswered turn).
    /// Pairing is by index: if appends ever stop alternating the windows
    /// drift and old turns pair with new ones.
    pub fn api_messages(&self, chat_id: i64, system_prompt: &str) -> Result<Vec<Message>> {
        let state = self.state(chat_id)?;
        let mut messages = vec![Message::system(system_prompt)];
        let n = state.user_messages.len().min(state.assistant_messages.len());
        for i in 0..n {
            messages.push(Message::user(&state.user_messages[i]));
            messages.push(Message::assistant(&state.assistant_messages[i]));
        }
        if state.user_messages.len() > n {
            messages.push(Message::user(
                state.user_messages.last().expect("user window is non-empty"),
            ));
        }
        Ok(messages)
    }

    /// Clear both message windows; mode and token counters stay.
    /// No-op for a chat the store has never seen.
    pub fn reset_history(&self, chat_id: i64) -> Result<()> {
        let mut chats = self.chats.lock().expect("memory lock poisoned");
        if let Some(state) = chats.get_mut(&chat_key(chat_id)) {
            state.user_messages.clear();
            state.assistant_messages.clear();
            self.persist(&chats)?;
        }
        Ok(())
    }

    /// Add to the cumulative token counters.
    pub fn add_tokens(&self, chat_id: i64, input: u64, output: u64) -> Result<()> {
        self.mutate(chat_id, |state| {
            state.input_tokens += input;
            state.output_tokens += output;
        })
    }

    pub fn reset_stats(&self, chat_id: i64) -> Result<()> {
        self.mutate(chat_id, |state| {
            state.input_tokens = 0;
            state.output_tokens = 0;
        })
    }

    /// Cumulative (input, output) token counters for a chat.
    pub fn stats(&self, chat_id: i64) -> Result<(u64, u64)> {
        let state = self.state(chat_id)?;
        Ok((state.input_tokens, state.output_tokens))
    }

    /// (chat count, total input tokens, total output tokens) across the store.
    pub fn totals(&self) -> (usize, u64, u64) {
        let chats = self.chats.lock().expect("memory lock poisoned");
        let (input, output) = chats
            .values()
            .fold((0, 0), |(i, o), s| (i + s.input_tokens, o + s.output_tokens));
        (chats.len(), input, output)
    }

    fn mutate(&self, chat_id: i64, f: impl FnOnce(&mut ChatState)) -> Result<()> {
        let mut chats = self.chats.lock().expect("memory lock poisoned");
        let state = chats.entry(chat_key(chat_id)).or_default();
        f(state);
        self.persist(&chats)
    }

    fn persist(&self, chats: &HashMap<String, ChatState>) -> Result<()> {
        let json = serde_json::to_string_pretty(chats)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)
            .with_context(|| format!("Failed to write memory: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace memory: {}", self.path.display()))?;
        Ok(())
    }
}

fn truncate_front(messages: &mut Vec<String>, max: usize) {
    if messages.len() > max {
        messages.drain(..messages.len() - max);
    }
}

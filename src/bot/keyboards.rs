use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
};

use crate::llm::{ImageBackground, ImageFormat, ImageQuality, ImageSize};
use crate::prompts::PromptCatalog;

/// Main reply keyboard mirroring the bot commands.
pub fn main_keyboard() -> KeyboardMarkup {
    let mut kb = KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("Restart"), KeyboardButton::new("Mode")],
        vec![
            KeyboardButton::new("Clear history"),
            KeyboardButton::new("Stats"),
        ],
        vec![
            KeyboardButton::new("Reset stats"),
            KeyboardButton::new("Image"),
        ],
    ]);
    kb.resize_keyboard = true;
    kb
}

/// Reply keyboard shown while a chat is in the image settings menu.
pub fn image_menu_keyboard() -> KeyboardMarkup {
    let mut kb = KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("Quality"), KeyboardButton::new("Size")],
        vec![
            KeyboardButton::new("Background"),
            KeyboardButton::new("Format"),
        ],
        vec![
            KeyboardButton::new("Describe image"),
            KeyboardButton::new("Back"),
        ],
    ]);
    kb.resize_keyboard = true;
    kb
}

pub fn quality_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(ImageQuality::ALL.map(|q| {
        vec![InlineKeyboardButton::callback(
            q.as_str(),
            format!("img_q:{}", q.as_str()),
        )]
    }))
}

pub fn size_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(ImageSize::ALL.map(|s| {
        vec![InlineKeyboardButton::callback(
            s.label(),
            format!("img_s:{}", s.as_str()),
        )]
    }))
}

pub fn background_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(ImageBackground::ALL.map(|b| {
        vec![InlineKeyboardButton::callback(
            b.as_str(),
            format!("img_bg:{}", b.as_str()),
        )]
    }))
}

pub fn format_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(ImageFormat::ALL.map(|f| {
        vec![InlineKeyboardButton::callback(
            f.as_str(),
            format!("img_fmt:{}", f.as_str()),
        )]
    }))
}

/// One inline button per catalog mode, keyed for the `mode:` callback.
pub fn mode_keyboard(catalog: &PromptCatalog) -> InlineKeyboardMarkup {
    let mut entries: Vec<_> = catalog.modes().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    InlineKeyboardMarkup::new(entries.into_iter().map(|(key, mode)| {
        vec![InlineKeyboardButton::callback(
            mode.name.clone(),
            format!("mode:{key}"),
        )]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_data(kb: &InlineKeyboardMarkup) -> Vec<String> {
        kb.inline_keyboard
            .iter()
            .flatten()
            .map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(d) => d.clone(),
                other => panic!("unexpected button kind: {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_main_keyboard_resizes() {
        let kb = main_keyboard();
        assert!(kb.resize_keyboard);
        assert_eq!(kb.keyboard.len(), 3);
    }

    #[test]
    fn test_quality_callback_data() {
        assert_eq!(
            callback_data(&quality_keyboard()),
            vec!["img_q:low", "img_q:medium", "img_q:high", "img_q:auto"]
        );
    }

    #[test]
    fn test_size_labels_differ_from_data() {
        let kb = size_keyboard();
        assert_eq!(kb.inline_keyboard[0][0].text, "Square 1024×1024");
        assert_eq!(callback_data(&kb)[0], "img_s:1024x1024");
    }

    #[test]
    fn test_mode_keyboard_sorted_by_key() {
        let catalog: PromptCatalog = serde_json::from_str(
            r#"{
                "default_prompt": "b",
                "prompts": {
                    "b": {"name": "Bee", "system_prompt": "s"},
                    "a": {"name": "Ay", "system_prompt": "s"}
                }
            }"#,
        )
        .unwrap();
        let kb = mode_keyboard(&catalog);
        assert_eq!(callback_data(&kb), vec!["mode:a", "mode:b"]);
        assert_eq!(kb.inline_keyboard[0][0].text, "Ay");
    }
}

//! Inline keyboards and the bot command menu.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;

use crate::texts;

/// Callback data sent by the "check subscription" button.
pub const CHECK_SUBSCRIPTION: &str = "check_subscription";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "restart the conversation")]
    Start,
    #[command(description = "❔ FAQ")]
    Help,
    #[command(description = "🛠 support")]
    Support,
}

fn t_me_url(username: &str) -> Option<reqwest::Url> {
    reqwest::Url::parse(&format!("https://t.me/{}", username.trim_start_matches('@'))).ok()
}

/// Subscribe-to-channel prompt: a URL button plus a re-check button.
pub fn subscription_keyboard(channel_username: &str) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(url) = t_me_url(channel_username) {
        rows.push(vec![InlineKeyboardButton::url(texts::SUBSCRIBE_BUTTON, url)]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        texts::CHECK_SUBSCRIPTION_BUTTON,
        CHECK_SUBSCRIPTION,
    )]);
    InlineKeyboardMarkup::new(rows)
}

/// Link to the support account.
pub fn support_keyboard(support_username: &str) -> Option<InlineKeyboardMarkup> {
    let url = t_me_url(support_username)?;
    Some(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        texts::SUPPORT_BUTTON,
        url,
    )]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_keyboard_has_both_buttons() {
        let keyboard = subscription_keyboard("@boompi_ai");
        assert_eq!(keyboard.inline_keyboard.len(), 2);
    }

    #[test]
    fn test_support_keyboard_url() {
        let keyboard = support_keyboard("@boompi_support").unwrap();
        assert_eq!(keyboard.inline_keyboard.len(), 1);
    }
}

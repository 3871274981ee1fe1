//! Telegram transport wrapper using teloxide.

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, ChatMemberStatus, FileId, InlineKeyboardMarkup, MessageId, ParseMode,
    Recipient, ReplyParameters,
};
use tracing::{info, warn};

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Send an HTML-formatted message. Returns the new message id.
    pub async fn send_html(
        &self,
        chat_id: i64,
        text: &str,
        reply_to_message_id: Option<i64>,
    ) -> Result<i64, String> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);

        if let Some(msg_id) = reply_to_message_id {
            request = request.reply_parameters(ReplyParameters::new(MessageId(msg_id as i32)));
        }

        request.await.map(|msg| msg.id.0 as i64).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }

    /// Replace the text of a previously sent message in place.
    pub async fn edit_html(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), String> {
        self.bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id as i32), text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to edit message {message_id}: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Send a plain-text message (error notices, prompts).
    pub async fn send_plain(&self, chat_id: i64, text: &str) -> Result<i64, String> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|msg| msg.id.0 as i64)
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Send a message with an inline keyboard attached.
    pub async fn send_with_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> Result<i64, String> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .reply_markup(keyboard)
            .await
            .map(|msg| msg.id.0 as i64)
            .map_err(|e| {
                let msg = format!("Failed to send keyboard message: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Delete a message.
    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), String> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id as i32))
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to delete message: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Download a file (voice note, document, photo) by its file id.
    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, String> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| format!("Failed to get file info: {e}"))?;

        let mut data = Vec::new();
        self.bot
            .download_file(&file.path, &mut data)
            .await
            .map_err(|e| format!("Failed to download file: {e}"))?;

        info!("📥 Downloaded file ({} bytes)", data.len());
        Ok(data)
    }

    /// Download an image by file id. Returns (bytes, media type).
    pub async fn download_image(&self, file_id: &str) -> Result<(Vec<u8>, String), String> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| format!("Failed to get file info: {e}"))?;

        let mut data = Vec::new();
        self.bot
            .download_file(&file.path, &mut data)
            .await
            .map_err(|e| format!("Failed to download file: {e}"))?;

        // Telegram serves photos as JPEG unless the path says otherwise
        let media_type = if file.path.ends_with(".png") {
            "image/png"
        } else if file.path.ends_with(".webp") {
            "image/webp"
        } else {
            "image/jpeg"
        };

        info!("📥 Downloaded image ({} bytes, {media_type})", data.len());
        Ok((data, media_type.to_string()))
    }

    /// Whether the user is subscribed to the channel (member, admin or owner).
    pub async fn is_channel_member(&self, channel: &str, user_id: u64) -> Result<bool, String> {
        let member = self
            .bot
            .get_chat_member(Recipient::ChannelUsername(channel.to_string()), UserId(user_id))
            .await
            .map_err(|e| {
                let msg = format!("Failed to check subscription for {user_id}: {e}");
                warn!("{}", msg);
                msg
            })?;

        let status = member.status();
        info!("Subscription check for {user_id}: {:?}", status);
        Ok(matches!(
            status,
            ChatMemberStatus::Member | ChatMemberStatus::Administrator | ChatMemberStatus::Owner
        ))
    }

    /// Answer a callback query, optionally as a popup alert.
    pub async fn answer_callback(
        &self,
        callback_id: &CallbackQueryId,
        text: &str,
        show_alert: bool,
    ) -> Result<(), String> {
        self.bot
            .answer_callback_query(callback_id.clone())
            .text(text)
            .show_alert(show_alert)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to answer callback: {e}");
                warn!("{}", msg);
                msg
            })
    }
}

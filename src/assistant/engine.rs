//! The assistant engine.
//!
//! Every inbound event category (text, voice note, document, photo, album)
//! funnels into [`Assistant::process_content`], which gates, validates,
//! assembles the prompt from history, talks to the model and commits the
//! finished turn. Failures come back as [`ProcessError`]; converting one
//! into a user-visible message happens in exactly one place.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::assistant::albums::{AlbumCollector, AlbumHandler, AlbumPhoto};
use crate::assistant::documents::{self, DocumentError};
use crate::assistant::history::{ConversationTurn, HistoryStore};
use crate::assistant::images::{self, ImageError, ImageLimits};
use crate::assistant::llm::{ChatClient, ChatMessage, ContentPart, LlmError, Role};
use crate::assistant::markdown::MarkdownRenderer;
use crate::assistant::store::ListStore;
use crate::assistant::stream::{StreamBuffer, StreamError, stream_reply};
use crate::assistant::telegram::TelegramClient;
use crate::assistant::transcribe::Transcriber;
use crate::config::Config;
use crate::{keyboards, texts};

#[derive(Debug)]
pub enum ProcessError {
    /// Message exceeds the word-count cap.
    TooLong,
    /// More images than the configured maximum.
    TooManyImages,
    /// An image failed validation.
    Image(ImageError),
    /// A document could not be read.
    Document(DocumentError),
    /// Speech-to-text failed.
    Transcription(String),
    /// The model returned a blank answer.
    EmptyResponse,
    /// A backend or transport call failed.
    Backend(String),
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::TooLong => write!(f, "message exceeds the word limit"),
            ProcessError::TooManyImages => write!(f, "too many images"),
            ProcessError::Image(e) => write!(f, "invalid image: {e}"),
            ProcessError::Document(e) => write!(f, "document error: {e}"),
            ProcessError::Transcription(e) => write!(f, "transcription error: {e}"),
            ProcessError::EmptyResponse => write!(f, "model returned an empty answer"),
            ProcessError::Backend(e) => write!(f, "backend error: {e}"),
        }
    }
}

impl std::error::Error for ProcessError {}

impl ProcessError {
    /// The message shown to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            ProcessError::TooLong => texts::ERROR_TOO_LONG,
            ProcessError::TooManyImages => texts::ERROR_TOO_MANY_IMAGES,
            ProcessError::Image(ImageError::TooLarge { .. })
            | ProcessError::Image(ImageError::OverResolution { .. }) => {
                texts::ERROR_IMAGE_TOO_LARGE
            }
            ProcessError::Image(ImageError::Decode(_)) => texts::ERROR_GENERIC,
            ProcessError::Document(DocumentError::Unsupported(_)) => {
                texts::ERROR_UNSUPPORTED_DOCUMENT
            }
            ProcessError::Document(DocumentError::Empty) => texts::ERROR_DOCUMENT_EMPTY,
            ProcessError::Document(DocumentError::Extraction(_)) => texts::ERROR_DOCUMENT,
            ProcessError::Transcription(_) => texts::ERROR_VOICE,
            ProcessError::EmptyResponse => texts::ERROR_EMPTY_RESPONSE,
            ProcessError::Backend(_) => texts::ERROR_GENERIC,
        }
    }
}

pub struct Assistant {
    config: Config,
    renderer: MarkdownRenderer,
    telegram: Arc<TelegramClient>,
    chat: ChatClient,
    transcriber: Transcriber,
    history: HistoryStore,
    albums: AlbumCollector,
}

impl Assistant {
    pub fn new(config: Config, telegram: Arc<TelegramClient>) -> Result<Self, String> {
        let chat = ChatClient::new(
            &config.api_base_url,
            &config.api_key,
            &config.model_name,
            config.max_tokens,
            config.proxy.as_deref(),
        )
        .map_err(|e| e.to_string())?;
        let transcriber = Transcriber::new(
            &config.api_base_url,
            &config.api_key,
            &config.transcription_model,
        );

        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| format!("Failed to create data dir: {e}"))?;
        let store = Arc::new(ListStore::with_path(&config.data_dir.join("store.db")));
        let history = HistoryStore::new(
            store.clone(),
            config.max_context_messages,
            Duration::from_secs(config.context_ttl_hours * 3600),
        );
        let albums = AlbumCollector::new(store, Duration::from_millis(config.album_window_ms));

        Ok(Self {
            config,
            renderer: MarkdownRenderer::new(),
            telegram,
            chat,
            transcriber,
            history,
            albums,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn telegram(&self) -> &TelegramClient {
        &self.telegram
    }

    /// Log a failure and tell the user. The only place a [`ProcessError`]
    /// becomes a user-visible message.
    pub async fn report_error(&self, chat_id: i64, error: &ProcessError) {
        error!("Processing failed: {error}");
        if let Err(e) = self.telegram.send_plain(chat_id, error.user_message()).await {
            warn!("Failed to report error to chat {chat_id}: {e}");
        }
    }

    pub async fn process_text(
        &self,
        chat_id: i64,
        user_id: u64,
        text: &str,
    ) -> Result<(), ProcessError> {
        self.process_content(chat_id, user_id, text, &[]).await
    }

    pub async fn process_voice(
        &self,
        chat_id: i64,
        user_id: u64,
        file_id: &str,
    ) -> Result<(), ProcessError> {
        if !self.ensure_subscribed(chat_id, user_id).await {
            return Ok(());
        }
        let ogg = self
            .telegram
            .download_file(file_id)
            .await
            .map_err(ProcessError::Backend)?;
        let text = self
            .transcriber
            .transcribe(&ogg)
            .await
            .map_err(ProcessError::Transcription)?;
        self.process_content(chat_id, user_id, &text, &[]).await
    }

    pub async fn process_document(
        &self,
        chat_id: i64,
        user_id: u64,
        file_id: &str,
        file_name: &str,
        caption: Option<&str>,
    ) -> Result<(), ProcessError> {
        if !self.ensure_subscribed(chat_id, user_id).await {
            return Ok(());
        }
        let data = self
            .telegram
            .download_file(file_id)
            .await
            .map_err(ProcessError::Backend)?;
        let text = documents::extract_text(file_name, &data).map_err(ProcessError::Document)?;

        let content = match caption {
            Some(caption) => format!("{text}\n{caption}"),
            None => text,
        };
        self.process_content(chat_id, user_id, &content, &[]).await
    }

    pub async fn process_photos(
        &self,
        chat_id: i64,
        user_id: u64,
        caption: Option<String>,
        file_ids: &[String],
    ) -> Result<(), ProcessError> {
        let content = caption.unwrap_or_else(|| texts::DEFAULT_PHOTO_PROMPT.to_string());
        self.process_content(chat_id, user_id, &content, file_ids).await
    }

    /// Park an album photo; the whole group is processed as one request
    /// after it goes quiet.
    pub async fn queue_album_photo(
        self: Arc<Self>,
        chat_id: i64,
        user_id: u64,
        group_id: &str,
        photo: AlbumPhoto,
    ) {
        let engine = Arc::clone(&self);
        let handler: AlbumHandler = Arc::new(move |photos: Vec<AlbumPhoto>| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let caption = photos.iter().find_map(|p| p.caption.clone());
                let file_ids: Vec<String> = photos.into_iter().map(|p| p.file_id).collect();
                if let Err(e) = engine
                    .process_photos(chat_id, user_id, caption, &file_ids)
                    .await
                {
                    engine.report_error(chat_id, &e).await;
                }
            });
        });
        self.albums.add(group_id, photo, handler).await;
    }

    /// The single operation every inbound event funnels into.
    pub async fn process_content(
        &self,
        chat_id: i64,
        user_id: u64,
        text: &str,
        image_file_ids: &[String],
    ) -> Result<(), ProcessError> {
        if !self.ensure_subscribed(chat_id, user_id).await {
            return Ok(());
        }

        check_word_count(text, self.config.max_word_count)?;
        if image_file_ids.len() > self.config.max_images {
            return Err(ProcessError::TooManyImages);
        }

        let mut parts = vec![ContentPart::Text(text.to_string())];
        for file_id in image_file_ids {
            let (data, media_type) = self
                .telegram
                .download_image(file_id)
                .await
                .map_err(ProcessError::Backend)?;
            images::validate(&data, self.image_limits()).map_err(ProcessError::Image)?;
            parts.push(ContentPart::Image {
                data_url: images::to_data_url(&data, &media_type),
            });
        }

        let messages = build_messages(
            &self.config.system_prompt,
            &self.history.load(user_id),
            &parts,
        );
        info!(
            "🤖 Request for user {user_id}: {} chars, {} image(s)",
            text.chars().count(),
            image_file_ids.len()
        );

        if self.config.use_stream {
            let chunks = self
                .chat
                .stream(&messages)
                .await
                .map_err(|e| ProcessError::Backend(e.to_string()))?;
            let buffer = StreamBuffer::new(
                self.config.min_chunk_size,
                self.config.max_chunk_size,
                Duration::from_millis(self.config.min_update_interval_ms),
            );
            let answer =
                stream_reply(chunks, buffer, &self.renderer, &self.telegram, chat_id)
                    .await
                    .map_err(|e| match e {
                        StreamError::Empty => ProcessError::EmptyResponse,
                        StreamError::Backend(e) => ProcessError::Backend(e),
                    })?;
            self.history.append(user_id, &parts, &answer);
        } else {
            let (answer, usage) = self.chat.complete(&messages).await.map_err(|e| match e {
                LlmError::Empty => ProcessError::EmptyResponse,
                other => ProcessError::Backend(other.to_string()),
            })?;
            if answer.trim().is_empty() {
                return Err(ProcessError::EmptyResponse);
            }
            if let Some(u) = usage {
                info!(
                    "Tokens: total {}, prompt {}, completion {}",
                    u.total_tokens, u.prompt_tokens, u.completion_tokens
                );
            }
            self.history.append(user_id, &parts, &answer);
            let html = self.renderer.render(&answer);
            self.telegram
                .send_html(chat_id, &html, None)
                .await
                .map_err(ProcessError::Backend)?;
        }

        Ok(())
    }

    /// Whether the user may talk to the bot. A non-subscriber gets the
    /// subscribe prompt and `false`; no gate is configured, everyone passes.
    async fn ensure_subscribed(&self, chat_id: i64, user_id: u64) -> bool {
        let Some(ref channel) = self.config.channel_username else {
            return true;
        };
        let subscribed = self
            .telegram
            .is_channel_member(channel, user_id)
            .await
            .unwrap_or(false);
        if !subscribed {
            let keyboard = keyboards::subscription_keyboard(channel);
            if let Err(e) = self
                .telegram
                .send_with_keyboard(chat_id, texts::SUBSCRIBE_PROMPT, keyboard)
                .await
            {
                warn!("Failed to send subscription prompt: {e}");
            }
        }
        subscribed
    }

    /// Membership re-check for the subscription callback button.
    pub async fn is_subscribed(&self, user_id: u64) -> bool {
        match self.config.channel_username {
            Some(ref channel) => self
                .telegram
                .is_channel_member(channel, user_id)
                .await
                .unwrap_or(false),
            None => true,
        }
    }

    fn image_limits(&self) -> ImageLimits {
        ImageLimits {
            max_bytes: self.config.max_image_bytes,
            max_dimension: self.config.max_image_dimension,
        }
    }
}

fn check_word_count(text: &str, max_words: usize) -> Result<(), ProcessError> {
    if text.split_whitespace().count() > max_words {
        Err(ProcessError::TooLong)
    } else {
        Ok(())
    }
}

/// System prompt, then the history window replayed chronologically, then
/// the current question.
fn build_messages(
    system_prompt: &str,
    history: &[ConversationTurn],
    parts: &[ContentPart],
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::text(Role::System, system_prompt)];
    for turn in history {
        messages.push(ChatMessage::text(Role::User, turn.question.clone()));
        messages.push(ChatMessage::text(Role::Assistant, turn.answer.clone()));
    }
    messages.push(ChatMessage { role: Role::User, content: parts.to_vec() });
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_within_limit() {
        assert!(check_word_count("a few words here", 10).is_ok());
    }

    #[test]
    fn test_word_count_over_limit() {
        let text = "word ".repeat(701);
        assert!(matches!(
            check_word_count(&text, 700),
            Err(ProcessError::TooLong)
        ));
    }

    #[test]
    fn test_word_count_at_limit() {
        let text = "word ".repeat(700);
        assert!(check_word_count(&text, 700).is_ok());
    }

    #[test]
    fn test_build_messages_order() {
        let history = vec![
            ConversationTurn {
                question: "q1".to_string(),
                answer: "a1".to_string(),
                created_at: "2025-01-01 10:00:00".to_string(),
            },
            ConversationTurn {
                question: "q2".to_string(),
                answer: "a2".to_string(),
                created_at: "2025-01-01 10:01:00".to_string(),
            },
        ];
        let parts = vec![ContentPart::Text("q3".to_string())];
        let messages = build_messages("system", &history, &parts);

        assert_eq!(messages.len(), 6);
        assert!(matches!(messages[0].role, Role::System));
        assert_eq!(messages[1].content[0].as_text(), Some("q1"));
        assert_eq!(messages[2].content[0].as_text(), Some("a1"));
        assert_eq!(messages[5].content[0].as_text(), Some("q3"));
    }

    #[test]
    fn test_build_messages_keeps_image_parts() {
        let parts = vec![
            ContentPart::Text("what is this".to_string()),
            ContentPart::Image { data_url: "data:image/jpeg;base64,AA".to_string() },
        ];
        let messages = build_messages("system", &[], &parts);
        assert_eq!(messages.last().unwrap().content.len(), 2);
    }

    #[test]
    fn test_validation_errors_map_to_specific_texts() {
        assert_eq!(ProcessError::TooLong.user_message(), texts::ERROR_TOO_LONG);
        assert_eq!(
            ProcessError::Document(DocumentError::Unsupported("rar".into())).user_message(),
            texts::ERROR_UNSUPPORTED_DOCUMENT
        );
        assert_eq!(
            ProcessError::EmptyResponse.user_message(),
            texts::ERROR_EMPTY_RESPONSE
        );
        assert_eq!(
            ProcessError::Backend("boom".into()).user_message(),
            texts::ERROR_GENERIC
        );
    }
}

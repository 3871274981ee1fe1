//! Streaming flush policy and the streamed-reply driver.
//!
//! Telegram edits are rate limited, so partial model output is buffered and
//! painted into a single in-place-edited message at bounded frequency. The
//! flush decision and render happen on the same path that consumes the
//! model stream; there is no background timer.

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tracing::{info, warn};

use crate::assistant::llm::{ChunkStream, Usage};
use crate::assistant::markdown::MarkdownRenderer;
use crate::assistant::telegram::TelegramClient;

/// Transient per-response buffer deciding when to flush an update.
pub struct StreamBuffer {
    full_text: String,
    pending: String,
    pending_chars: usize,
    last_flush: Instant,
    min_chunk: usize,
    max_chunk: usize,
    min_interval: Duration,
}

impl StreamBuffer {
    /// Thresholds are measured in characters of the raw pending buffer.
    /// The interval clock starts at creation, so within the first interval
    /// only the max threshold can trigger a flush.
    pub fn new(min_chunk: usize, max_chunk: usize, min_interval: Duration) -> Self {
        Self {
            full_text: String::new(),
            pending: String::new(),
            pending_chars: 0,
            last_flush: Instant::now(),
            min_chunk,
            max_chunk,
            min_interval,
        }
    }

    pub fn push(&mut self, fragment: &str) {
        self.pending.push_str(fragment);
        self.pending_chars += fragment.chars().count();
    }

    pub fn should_flush(&self) -> bool {
        self.pending_chars >= self.max_chunk
            || (self.last_flush.elapsed() >= self.min_interval
                && self.pending_chars >= self.min_chunk)
    }

    /// Fold the pending buffer into the cumulative text and return it.
    /// The interval clock is reset separately via [`mark_emitted`], so a
    /// failed emit retries as soon as the next fragments accumulate.
    pub fn flush(&mut self) -> &str {
        self.full_text.push_str(&self.pending);
        self.pending.clear();
        self.pending_chars = 0;
        &self.full_text
    }

    pub fn mark_emitted(&mut self) {
        self.last_flush = Instant::now();
    }

    /// Fold any residual pending text and yield the complete response.
    pub fn into_final_text(mut self) -> String {
        self.full_text.push_str(&self.pending);
        self.full_text
    }
}

#[derive(Debug)]
pub enum StreamError {
    /// The model stream itself failed.
    Backend(String),
    /// The stream completed but produced a blank answer.
    Empty,
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::Backend(e) => write!(f, "stream failed: {e}"),
            StreamError::Empty => write!(f, "empty streamed response"),
        }
    }
}

impl std::error::Error for StreamError {}

/// Drive a model stream into a Telegram message: first flush creates the
/// message, later flushes edit it in place. Returns the full response text
/// for the caller to commit to history.
pub async fn stream_reply(
    mut chunks: ChunkStream,
    mut buffer: StreamBuffer,
    renderer: &MarkdownRenderer,
    telegram: &TelegramClient,
    chat_id: i64,
) -> Result<String, StreamError> {
    let mut message_id: Option<i64> = None;
    let mut usage: Option<Usage> = None;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| StreamError::Backend(e.to_string()))?;
        if let Some(u) = chunk.usage {
            usage = Some(u);
        }
        let Some(delta) = chunk.delta else { continue };

        buffer.push(&delta);
        if !buffer.should_flush() {
            continue;
        }

        let html = renderer.render(buffer.flush());
        if html.trim().is_empty() {
            continue;
        }

        let emitted = match message_id {
            None => match telegram.send_html(chat_id, &html, None).await {
                Ok(id) => {
                    message_id = Some(id);
                    true
                }
                Err(e) => {
                    warn!("Failed to send streamed message: {e}");
                    false
                }
            },
            Some(id) => match telegram.edit_html(chat_id, id, &html).await {
                Ok(()) => true,
                Err(e) => {
                    // Non-fatal: the next flush retries with the larger text.
                    warn!("Failed to update streamed message: {e}");
                    false
                }
            },
        };
        if emitted {
            buffer.mark_emitted();
        }
    }

    let full_text = buffer.into_final_text();
    if full_text.trim().is_empty() {
        return Err(StreamError::Empty);
    }

    if let Some(u) = usage {
        info!(
            "Tokens: total {}, prompt {}, completion {}",
            u.total_tokens, u.prompt_tokens, u.completion_tokens
        );
    }

    let html = renderer.render(&full_text);
    let result = match message_id {
        None => telegram.send_html(chat_id, &html, None).await.map(|_| ()),
        Some(id) => telegram.edit_html(chat_id, id, &html).await,
    };
    if let Err(e) = result {
        warn!("Failed to emit final message: {e}");
    }

    Ok(full_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_threshold_is_the_only_early_trigger() {
        // MIN=100, MAX=200, interval=1s; 250 chars arrive "instantly"
        let mut buf = StreamBuffer::new(100, 200, Duration::from_secs(1));
        let mut flushes = 0;

        for _ in 0..5 {
            buf.push(&"x".repeat(50));
            if buf.should_flush() {
                buf.flush();
                buf.mark_emitted();
                flushes += 1;
            }
        }

        // Exactly one flush, at the moment the buffer reached 200
        assert_eq!(flushes, 1);
        assert_eq!(buf.into_final_text().len(), 250);
    }

    #[test]
    fn test_no_flush_below_max_within_interval() {
        let mut buf = StreamBuffer::new(100, 200, Duration::from_secs(1));
        buf.push(&"x".repeat(199));
        assert!(!buf.should_flush());
        buf.push("x");
        assert!(buf.should_flush());
    }

    #[test]
    fn test_min_threshold_after_interval() {
        let mut buf = StreamBuffer::new(10, 1000, Duration::from_millis(30));
        buf.push(&"x".repeat(10));
        assert!(!buf.should_flush());

        std::thread::sleep(Duration::from_millis(50));
        assert!(buf.should_flush());
    }

    #[test]
    fn test_below_min_never_flushes() {
        let mut buf = StreamBuffer::new(10, 1000, Duration::ZERO);
        buf.push(&"x".repeat(9));
        assert!(!buf.should_flush());
    }

    #[test]
    fn test_flush_folds_and_clears_pending() {
        let mut buf = StreamBuffer::new(1, 1, Duration::ZERO);
        buf.push("abc");
        assert_eq!(buf.flush(), "abc");
        buf.push("def");
        assert_eq!(buf.flush(), "abcdef");
    }

    #[test]
    fn test_final_text_includes_residual_pending() {
        let mut buf = StreamBuffer::new(100, 200, Duration::from_secs(1));
        buf.push("tail");
        assert_eq!(buf.into_final_text(), "tail");
    }

    #[test]
    fn test_thresholds_count_chars_not_bytes() {
        let mut buf = StreamBuffer::new(1, 3, Duration::from_secs(1));
        buf.push("héé"); // 3 chars, 5 bytes
        assert!(buf.should_flush());
        let mut buf = StreamBuffer::new(1, 4, Duration::from_secs(1));
        buf.push("héé");
        assert!(!buf.should_flush());
    }
}

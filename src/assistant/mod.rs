//! Assistant module - relays Telegram messages to an LLM backend.

pub mod albums;
pub mod balance;
pub mod debounce;
pub mod documents;
pub mod engine;
pub mod history;
pub mod images;
pub mod llm;
pub mod markdown;
pub mod store;
pub mod stream;
pub mod telegram;
pub mod transcribe;

pub use engine::{Assistant, ProcessError};
pub use markdown::MarkdownRenderer;
pub use telegram::TelegramClient;

//! Boompi - a Telegram assistant bot backed by an LLM.
//!
//! Forwards user text, voice notes, documents and photos to a
//! chat-completion backend and streams the answer back into an in-place
//! edited message, keeping a short rolling conversation history per user.

pub mod assistant;
pub mod config;
pub mod keyboards;
pub mod texts;

//! Rolling per-user conversation history.
//!
//! A capped, expiring window of recent question/answer turns, replayed into
//! the prompt of the next request. Only the text component of a question is
//! stored; image parts never reach the history.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::assistant::llm::ContentPart;
use crate::assistant::store::ListStore;

/// One stored question/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub created_at: String,
}

pub struct HistoryStore {
    store: Arc<ListStore>,
    max_turns: usize,
    ttl: Duration,
}

fn key(user_id: u64) -> String {
    format!("user:{user_id}:context")
}

impl HistoryStore {
    pub fn new(store: Arc<ListStore>, max_turns: usize, ttl: Duration) -> Self {
        Self { store, max_turns, ttl }
    }

    /// Record a completed turn. Multi-part questions are reduced to their
    /// text component; a turn with a blank question or answer is discarded.
    pub fn append(&self, user_id: u64, question: &[ContentPart], answer: &str) {
        let question_text = question
            .iter()
            .find_map(ContentPart::as_text)
            .unwrap_or_default();

        if question_text.trim().is_empty() || answer.trim().is_empty() {
            warn!("Skipping invalid history entry for user {user_id}");
            return;
        }

        let turn = ConversationTurn {
            question: question_text.to_string(),
            answer: answer.to_string(),
            created_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        let json = match serde_json::to_string(&turn) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize history entry for user {user_id}: {e}");
                return;
            }
        };

        let key = key(user_id);
        self.store.push_front(&key, &json);
        self.store.trim(&key, self.max_turns);
        self.store.expire(&key, self.ttl);
    }

    /// Load the user's window in chronological order, skipping entries that
    /// fail to parse or violate the non-empty invariant.
    pub fn load(&self, user_id: u64) -> Vec<ConversationTurn> {
        let mut turns: Vec<ConversationTurn> = self
            .store
            .range(&key(user_id))
            .iter()
            .filter_map(|json| match serde_json::from_str::<ConversationTurn>(json) {
                Ok(turn)
                    if !turn.question.trim().is_empty() && !turn.answer.trim().is_empty() =>
                {
                    Some(turn)
                }
                Ok(_) => {
                    warn!("Invalid history entry for user {user_id}");
                    None
                }
                Err(e) => {
                    warn!("Failed to decode history entry for user {user_id}: {e}");
                    None
                }
            })
            .collect();

        // Stored newest-first; replay oldest-first.
        turns.reverse();
        turns
    }
}

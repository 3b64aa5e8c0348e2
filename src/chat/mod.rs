//! In-memory chat log with bounded history.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of messages retained for replay to new connections.
pub const MAX_HISTORY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub text: String,
    /// Unix milliseconds.
    pub timestamp: i64,
}

pub type OnChatMessage = Arc<dyn Fn(ChatMessage) + Send + Sync>;

pub struct ChatLog {
    messages: Mutex<VecDeque<ChatMessage>>,
    on_new: Option<OnChatMessage>,
}

impl ChatLog {
    pub fn new(on_new: Option<OnChatMessage>) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            on_new,
        }
    }

    /// Append a message, assigning its ID and timestamp, and fire the
    /// broadcast callback.
    pub fn add(&self, sender: &str, text: &str) -> ChatMessage {
        let msg = ChatMessage {
            id: Uuid::new_v4().to_string(),
            sender: sender.to_string(),
            text: text.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        {
            let mut messages = self.messages.lock().unwrap();
            messages.push_back(msg.clone());
            while messages.len() > MAX_HISTORY {
                messages.pop_front();
            }
        }
        if let Some(on_new) = &self.on_new {
            on_new(msg.clone());
        }
        msg
    }

    /// Snapshot of the retained history, oldest first.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded() {
        let log = ChatLog::new(None);
        for i in 0..600 {
            log.add("alice", &format!("message {i}"));
        }
        let history = log.history();
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history.first().unwrap().text, "message 100");
        assert_eq!(history.last().unwrap().text, "message 599");
    }

    #[test]
    fn callback_fires_with_assigned_fields() {
        let seen: Arc<Mutex<Vec<ChatMessage>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let log = ChatLog::new(Some(Arc::new(move |msg| {
            recorder.lock().unwrap().push(msg);
        })));

        let msg = log.add("bob", "hi there");
        assert!(!msg.id.is_empty());
        assert!(msg.timestamp > 0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], msg);
    }

    #[test]
    fn history_preserves_order() {
        let log = ChatLog::new(None);
        log.add("a", "first");
        log.add("b", "second");
        log.add("c", "third");
        let texts: Vec<_> = log.history().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }
}

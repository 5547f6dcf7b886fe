//! Per-session conversation history.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Default)]
struct Sessions {
    next_id: u64,
    history: HashMap<String, Vec<Message>>,
}

/// Keeps the most recent exchanges of each chat session.
pub struct SessionManager {
    max_history: usize,
    inner: Mutex<Sessions>,
}

impl SessionManager {
    /// `max_history` is the number of user/assistant exchanges retained.
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            inner: Mutex::new(Sessions::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new session and return its id.
    pub fn create_session(&self) -> String {
        let mut sessions = self.lock();
        sessions.next_id += 1;
        let id = format!("session_{}", sessions.next_id);
        sessions.history.insert(id.clone(), Vec::new());
        id
    }

    /// Record one question and answer. Unknown ids start a new history.
    pub fn add_exchange(&self, session_id: &str, user_message: &str, assistant_message: &str) {
        let mut sessions = self.lock();
        let messages = sessions.history.entry(session_id.to_string()).or_default();
        messages.push(Message {
            role: "User",
            content: user_message.to_string(),
        });
        messages.push(Message {
            role: "Assistant",
            content: assistant_message.to_string(),
        });

        let keep = self.max_history * 2;
        if messages.len() > keep {
            let excess = messages.len() - keep;
            messages.drain(..excess);
        }
    }

    /// Formatted history for a session, or `None` if there is none.
    pub fn get_conversation_history(&self, session_id: &str) -> Option<String> {
        let sessions = self.lock();
        let messages = sessions.history.get(session_id)?;
        if messages.is_empty() {
            return None;
        }

        Some(
            messages
                .iter()
                .map(|m| format!("{}: {}", m.role, m.content))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    pub fn clear_session(&self, session_id: &str) {
        if let Some(messages) = self.lock().history.get_mut(session_id) {
            messages.clear();
        }
    }

    pub fn session_count(&self) -> usize {
        self.lock().history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_sequential() {
        let sessions = SessionManager::new(2);
        assert_eq!(sessions.create_session(), "session_1");
        assert_eq!(sessions.create_session(), "session_2");
        assert_eq!(sessions.session_count(), 2);
    }

    #[test]
    fn test_history_format() {
        let sessions = SessionManager::new(2);
        let id = sessions.create_session();
        assert!(sessions.get_conversation_history(&id).is_none());

        sessions.add_exchange(&id, "What is MCP?", "A protocol.");
        assert_eq!(
            sessions.get_conversation_history(&id).unwrap(),
            "User: What is MCP?\nAssistant: A protocol."
        );
    }

    #[test]
    fn test_history_keeps_last_exchanges() {
        let sessions = SessionManager::new(2);
        let id = sessions.create_session();
        for i in 1..=3 {
            sessions.add_exchange(&id, &format!("q{i}"), &format!("a{i}"));
        }

        assert_eq!(
            sessions.get_conversation_history(&id).unwrap(),
            "User: q2\nAssistant: a2\nUser: q3\nAssistant: a3"
        );
    }

    #[test]
    fn test_unknown_session_and_clear() {
        let sessions = SessionManager::new(1);
        assert!(sessions.get_conversation_history("nope").is_none());

        sessions.add_exchange("external", "q", "a");
        assert!(sessions.get_conversation_history("external").is_some());

        sessions.clear_session("external");
        assert!(sessions.get_conversation_history("external").is_none());
    }
}

//! Chat transcript.

use serde::Serialize;
use std::fmt;

/// Assistant message every session starts with.
pub const GREETING: &str = "How may I assist you today?";

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions.
    User,
    /// The generated answers.
    Assistant,
}

impl Role {
    /// Returns the role name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Author.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Creates a message.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Ordered chat transcript for one user session.
///
/// Passed explicitly to every handler call; there is no process-wide
/// session. Never empty: a fresh or reset session holds exactly the
/// greeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    messages: Vec<Message>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a session holding only the greeting.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: vec![Message::new(Role::Assistant, GREETING)],
        }
    }

    /// Replaces the whole history with the greeting.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.messages.push(Message::new(Role::Assistant, GREETING));
    }

    /// Appends a message.
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    /// Returns the transcript in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the transcript has no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_has_greeting() {
        let session = Session::new();
        assert_eq!(session.messages(), &[Message::new(Role::Assistant, GREETING)]);
        assert!(!session.is_empty());
    }

    #[test]
    fn test_reset_leaves_only_greeting() {
        let mut session = Session::new();
        session.push(Role::User, "질문");
        session.push(Role::Assistant, "답변");
        session.push(Role::User, "another");
        assert_eq!(session.len(), 4);

        session.reset();
        assert_eq!(session.len(), 1);
        assert_eq!(session.last(), Some(&Message::new(Role::Assistant, GREETING)));
    }

    #[test]
    fn test_session_serialization() {
        let mut session = Session::new();
        session.push(Role::User, "hi");
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["messages"][0]["role"], "assistant");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "hi");
    }
}

//! Role-tagged conversation turns.

use serde::{Deserialize, Serialize};

/// A single turn handed to a generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Role: "system", "user" or "assistant"
    pub role: String,
    /// Message content
    pub content: String,
}

impl HistoryMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_roles() {
        assert_eq!(HistoryMessage::user("hi").role, "user");
        assert_eq!(HistoryMessage::assistant("hello").role, "assistant");
        assert_eq!(HistoryMessage::system("be kind").role, "system");
        assert!(HistoryMessage::user("x").is_user());
        assert!(!HistoryMessage::assistant("x").is_user());
    }
}

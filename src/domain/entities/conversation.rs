use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// The most recent `max_turns` turns (one user and one assistant message each).
pub fn recent_turns(history: &[Message], max_turns: usize) -> &[Message] {
    let max_messages = max_turns.saturating_mul(2);
    &history[history.len().saturating_sub(max_messages)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_turns_window() {
        let history: Vec<Message> = (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("q{i}"))
                } else {
                    Message::assistant(format!("a{i}"))
                }
            })
            .collect();

        let recent = recent_turns(&history, 2);
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].content, "q6");
        assert!(recent_turns(&history, 0).is_empty());
        assert_eq!(recent_turns(&history[..3], 4).len(), 3);
    }
}

//! Short-term conversation history

/// Number of most recent turns included in the prompt context
pub const CONTEXT_TURNS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub content: String,
}

/// In-process turn log. Grows for the whole session; only the tail is
/// ever shown to the backend.
#[derive(Debug, Default)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Speaker::User, content.into());
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Speaker::Assistant, content.into());
    }

    fn push(&mut self, speaker: Speaker, content: String) {
        self.turns.push(Turn { speaker, content });
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The last [`CONTEXT_TURNS`] turns
    pub fn recent(&self) -> &[Turn] {
        let start = self.turns.len().saturating_sub(CONTEXT_TURNS);
        &self.turns[start..]
    }

    /// Recent turns as `role: content` lines
    pub fn context(&self) -> String {
        self.recent()
            .iter()
            .map(|turn| format!("{}: {}", turn.speaker.as_str(), turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_format() {
        let mut history = History::new();
        history.push_user("2+2");
        history.push_assistant("4");
        assert_eq!(history.context(), "user: 2+2\nassistant: 4");
    }

    #[test]
    fn test_context_keeps_last_five() {
        let mut history = History::new();
        for i in 0..8 {
            history.push_user(format!("q{i}"));
        }
        assert_eq!(history.len(), 8);
        assert_eq!(history.recent().len(), CONTEXT_TURNS);
        assert_eq!(history.recent()[0].content, "q3");
        assert_eq!(history.context().lines().count(), CONTEXT_TURNS);
        assert!(!history.context().contains("q2"));
    }

    #[test]
    fn test_empty() {
        let history = History::new();
        assert!(history.is_empty());
        assert!(history.recent().is_empty());
        assert_eq!(history.context(), "");
    }
}

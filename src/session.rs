//! Chat session state for the interactive front end

use crate::Result;
use serde::{Deserialize, Serialize};

/// Starter prompts shown while a session has no turns
pub const EXAMPLE_PROMPTS: [&str; 3] = [
    "캐더헌에 나오는 명소를 알려줘",
    "내가 있는 위치 주변의 명소를 알려줘",
    "현재 위치에서 캐더헌에 나오는 명소가 있는지 알려줘",
];

/// Input placeholder text
pub const INPUT_PLACEHOLDER: &str = "드라마를 입력하세요.";

/// Session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Create a new random session ID
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One query and its rendered answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// What the user typed
    pub query: String,
    /// Answer shown for it
    pub answer: String,
}

/// Whether any turn has been recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No turns yet
    Empty,
    /// At least one turn
    Active,
}

/// In-memory chat history. Turns are appended only after an answer succeeds.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    id: SessionId,
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    /// Start an empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session ID
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.turns.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Active
        }
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Check if the session has no turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Submit a query.
    ///
    /// Blank input is ignored and returns `Ok(None)`. Otherwise `handler`
    /// produces the answer; on success one turn is appended and returned, on
    /// failure the session is left untouched and the error is passed through.
    pub fn submit<F>(&mut self, query: &str, handler: F) -> Result<Option<&ChatTurn>>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let answer = handler(query)?;
        self.turns.push(ChatTurn {
            query: query.to_string(),
            answer,
        });
        tracing::debug!(session = %self.id, turns = self.turns.len(), "turn recorded");
        Ok(self.turns.last())
    }

    /// Turns, most recent first
    pub fn history(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter().rev()
    }

    /// Starter prompts; empty once the session is active
    #[must_use]
    pub fn example_prompts(&self) -> &'static [&'static str] {
        match self.state() {
            SessionState::Empty => &EXAMPLE_PROMPTS,
            SessionState::Active => &[],
        }
    }

    /// Transcript text, most recent turn first
    #[must_use]
    pub fn render(&self) -> String {
        self.history()
            .map(|turn| format!("> {}\n{}", turn.query, turn.answer))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

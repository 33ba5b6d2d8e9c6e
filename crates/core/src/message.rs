//! Query and conversation-history domain types.
//!
//! A [`Query`] is the current user request; [`HistoricalMessage`]s are the
//! prior turns of the session. Both are immutable after creation — history
//! is append-only and never edited, which is what lets the scorer and
//! assembler stay pure functions of their inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
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

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

/// The current user request being classified.
///
/// Immutable: the text and arrival timestamp are fixed at creation. Recency
/// scoring is computed relative to `received_at` rather than wall-clock time,
/// so scoring the same query twice gives identical results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// The raw request text.
    pub text: String,
    /// When the query arrived.
    pub received_at: DateTime<Utc>,
}

impl Query {
    /// Create a query arriving now.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    /// Create a query with an explicit arrival timestamp.
    pub fn at(text: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            received_at,
        }
    }
}

/// Engagement metadata tracked per historical message.
///
/// All fields are required — the scoring formula consumes every one of them,
/// so "unknown" is expressed as the zero value, never as a missing field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    /// The message contained a code block.
    pub contained_code: bool,
    /// The message led to a working solution.
    pub led_to_solution: bool,
    /// Number of follow-up questions the user asked about it.
    pub follow_up_count: u32,
    /// The user expressed thanks in response.
    pub thanked: bool,
    /// The message was part of an error/debugging exchange.
    pub error_context: bool,
}

impl Engagement {
    /// Whether the user asked at least one follow-up question.
    pub fn followed_up(&self) -> bool {
        self.follow_up_count > 0
    }
}

/// A single prior turn in the session, owned by the conversation and
/// appended only — never edited after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalMessage {
    /// Unique message id.
    pub id: String,
    /// Who sent this message.
    pub role: Role,
    /// The text content.
    pub content: String,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
    /// Engagement signals accumulated for this message.
    pub engagement: Engagement,
}

impl HistoricalMessage {
    /// Create a user message sent now.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, Utc::now())
    }

    /// Create an assistant message sent now.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, Utc::now())
    }

    /// Create a message with an explicit timestamp.
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp,
            engagement: Engagement::default(),
        }
    }

    /// Attach engagement metadata (builder style).
    pub fn with_engagement(mut self, engagement: Engagement) -> Self {
        self.engagement = engagement;
        self
    }
}

//! The context window — the system's final output artifact.
//!
//! A [`ContextWindow`] is an ordered list of [`ContextComponent`]s plus an
//! aggregate token count. It is immutable once built; the assembler produces
//! a new window rather than mutating one. A window built on a degraded path
//! carries a [`FallbackStrategy`] saying which path and why.

use crate::analysis::{ContextLevel, Domain};
use serde::{Deserialize, Serialize};

/// What a component contributes to the window. The enum order is not the
/// assembly order; assembly order is fixed by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// The level-specific system directive. Never trimmed.
    SystemDirective,
    /// The verbatim user query. Never trimmed.
    UserQuery,
    /// Digest of the most relevant history messages.
    HistoryDigest,
    /// Debugging / error-analysis focus lines.
    TechnicalDigest,
    /// Optional block from the external quality-guidance collaborator.
    DomainGuidance,
    /// Canned or emergency response body on degraded paths.
    FallbackResponse,
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SystemDirective => write!(f, "system_directive"),
            Self::UserQuery => write!(f, "user_query"),
            Self::HistoryDigest => write!(f, "history_digest"),
            Self::TechnicalDigest => write!(f, "technical_digest"),
            Self::DomainGuidance => write!(f, "domain_guidance"),
            Self::FallbackResponse => write!(f, "fallback_response"),
        }
    }
}

/// A named, sized block of content inside the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextComponent {
    /// What this block is.
    pub kind: ComponentKind,
    /// The text content.
    pub content: String,
    /// Estimated tokens for this block.
    pub token_count: usize,
    /// Where the content came from (system / user / history / guidance / ...).
    pub source: String,
    /// Relevance score for history-derived components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
}

impl ContextComponent {
    /// Create a component, estimating its token count from the content.
    pub fn new(kind: ComponentKind, content: impl Into<String>, source: impl Into<String>) -> Self {
        let content = content.into();
        let token_count = crate::token::estimate_tokens(&content);
        Self {
            kind,
            content,
            token_count,
            source: source.into(),
            relevance: None,
        }
    }

    /// Override the estimated token count (for canned blocks with a fixed
    /// published estimate).
    pub fn with_token_count(mut self, tokens: usize) -> Self {
        self.token_count = tokens;
        self
    }

    /// Attach a relevance score.
    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = Some(relevance);
        self
    }
}

/// Which predetermined low-cost path produced a degraded window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackKind {
    /// Fast-path canned response for a canonical query pattern.
    CachedResponse,
    /// Ask the user to narrow things down step by step.
    ProgressiveDiscovery,
    /// Generic clarification request.
    SafeDefault,
    /// Analysis itself failed; minimal safe context.
    EmergencyMinimal,
    /// The degradation controller is open.
    CircuitBreaker,
}

impl std::fmt::Display for FallbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CachedResponse => write!(f, "cached_response"),
            Self::ProgressiveDiscovery => write!(f, "progressive_discovery"),
            Self::SafeDefault => write!(f, "safe_default"),
            Self::EmergencyMinimal => write!(f, "emergency_minimal"),
            Self::CircuitBreaker => write!(f, "circuit_breaker"),
        }
    }
}

/// Description of the degraded path a window took.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackStrategy {
    /// Which path.
    pub kind: FallbackKind,
    /// Human-readable reason.
    pub reason: String,
    /// Fixed token estimate for the degraded response.
    pub estimated_tokens: usize,
    /// What the naive send-everything path would have cost instead.
    pub baseline_tokens: usize,
}

impl FallbackStrategy {
    pub fn new(kind: FallbackKind, reason: impl Into<String>, estimated_tokens: usize) -> Self {
        Self {
            kind,
            reason: reason.into(),
            estimated_tokens,
            // The naive path forwarded everything regardless of the query.
            baseline_tokens: 1500,
        }
    }
}

/// The final bounded set of components assembled for the downstream call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindow {
    /// The context level this window was built for.
    pub level: ContextLevel,
    /// Ordered components.
    pub components: Vec<ContextComponent>,
    /// Aggregate token count across components.
    pub token_count: usize,
    /// Domains covered by the window.
    pub domains: Vec<Domain>,
    /// Present only on degraded paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackStrategy>,
    /// Cosmetic transition phrase when the context level changed between
    /// turns. No token-budget implication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
}

impl ContextWindow {
    /// Build a window from components, summing their token counts.
    pub fn new(level: ContextLevel, components: Vec<ContextComponent>, domains: Vec<Domain>) -> Self {
        let token_count = components.iter().map(|c| c.token_count).sum();
        Self {
            level,
            components,
            token_count,
            domains,
            fallback: None,
            transition: None,
        }
    }

    /// Attach a fallback strategy (builder style).
    pub fn with_fallback(mut self, fallback: FallbackStrategy) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Render the window as a single prompt payload, components joined by
    /// blank lines in assembly order.
    pub fn render(&self) -> String {
        self.components
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Whether this window was produced by a degraded path.
    pub fn is_degraded(&self) -> bool {
        self.fallback.is_some()
    }

    /// Find the first component of a given kind.
    pub fn component(&self, kind: ComponentKind) -> Option<&ContextComponent> {
        self.components.iter().find(|c| c.kind == kind)
    }
}

//! Error types for the tokengate domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded context
//! has its own error enum. Note the propagation policy: classification and
//! retrieval failures are always caught inside the pipeline and converted
//! to cheaper fallbacks — they exist as types so internal seams can report
//! them, not so callers ever see them. `BudgetOverflow` is different: after
//! correct trimming it should be unreachable, so observing it means a
//! ceiling misconfiguration.

use thiserror::Error;

/// The top-level error type for all tokengate operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Classification errors ---
    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),

    // --- Relevance errors ---
    #[error("Relevance error: {0}")]
    Relevance(#[from] RelevanceError),

    // --- Assembly errors ---
    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failure during intent/complexity analysis.
#[derive(Debug, Clone, Error)]
pub enum ClassifyError {
    #[error("Rule table invalid: {0}")]
    InvalidRuleTable(String),

    #[error("Analysis pass failed: {0}")]
    PassFailed(String),
}

/// Failure during relevance scoring or selection.
#[derive(Debug, Clone, Error)]
pub enum RelevanceError {
    #[error("Scoring failed: {0}")]
    ScoringFailed(String),

    #[error("Selection failed: {0}")]
    SelectionFailed(String),
}

/// Failure during context assembly.
#[derive(Debug, Clone, Error)]
pub enum AssemblyError {
    /// Assembled content still exceeds the ceiling after every removable
    /// component is gone. This indicates a ceiling misconfiguration, not a
    /// recoverable runtime condition.
    #[error(
        "Budget overflow: {token_count} tokens exceed the {ceiling}-token ceiling for {kind} \
         after trimming all removable components"
    )]
    BudgetOverflow {
        kind: String,
        token_count: usize,
        ceiling: usize,
    },
}

//! Core domain types for tokengate.
//!
//! tokengate decides, for every user query to an AI coding assistant, how
//! much and which conversational context to forward to the downstream model
//! under a hard token budget. This crate holds the value objects that flow
//! through that decision:
//!
//! - [`Query`] and [`HistoricalMessage`] — the inputs
//! - [`Classification`] and its layers — what the classifier produces
//! - [`ContextWindow`] and [`ContextComponent`] — the final output artifact
//! - [`FallbackStrategy`] — how a degraded path identifies itself
//!
//! Everything here is a plain value object: immutable once built, `Clone`,
//! serde-serializable, and free of I/O.

pub mod analysis;
pub mod error;
pub mod message;
pub mod token;
pub mod window;

pub use analysis::{
    Classification, ComplexitySignal, ContextLevel, ContextRequirement, Domain, IntentCategory,
    IntentLayer, IntentLayers, QueryKind, SignalCategory,
};
pub use error::{AssemblyError, ClassifyError, Error, RelevanceError, Result};
pub use message::{Engagement, HistoricalMessage, Query, Role, SessionId};
pub use token::{estimate_message_tokens, estimate_tokens};
pub use window::{
    ComponentKind, ContextComponent, ContextWindow, FallbackKind, FallbackStrategy,
};

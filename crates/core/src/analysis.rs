//! Classification output types — what the query classifier produces.
//!
//! A [`Classification`] bundles three [`IntentLayer`] passes (surface, deep,
//! contextual), zero or more [`ComplexitySignal`]s, and the derived
//! [`ContextRequirement`]. All confidence and escalation values lie in
//! `[0.0, 1.0]`.

use crate::window::FallbackStrategy;
use serde::{Deserialize, Serialize};

/// Overall query classification tier. Determines the hard token ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryKind {
    Simple,
    Medium,
    Complex,
    /// A mid-conversation jump: the query is complex and the previous turn
    /// ran at a lower context level.
    Escalated,
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "SIMPLE"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Complex => write!(f, "COMPLEX"),
            Self::Escalated => write!(f, "ESCALATED"),
        }
    }
}

/// How much context the downstream call needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextLevel {
    Minimal,
    Technical,
    Comprehensive,
}

impl std::fmt::Display for ContextLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minimal => write!(f, "minimal"),
            Self::Technical => write!(f, "technical"),
            Self::Comprehensive => write!(f, "comprehensive"),
        }
    }
}

/// What an intent pass decided the query primarily is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    Social,
    Technical,
    Continuation,
    Complex,
}

/// The result of a single intent analysis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentLayer {
    /// What kind of intent this pass detected.
    pub category: IntentCategory,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Labels of the indicators that matched.
    pub indicators: Vec<String>,
    /// First technical action verb found (deep pass only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_action: Option<String>,
    /// First technical object noun found (deep pass only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_object: Option<String>,
}

impl IntentLayer {
    /// A pass result with no verb/noun detail.
    pub fn new(category: IntentCategory, confidence: f64, indicators: Vec<String>) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            indicators,
            primary_action: None,
            primary_object: None,
        }
    }
}

/// The three intent passes produced per query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentLayers {
    pub surface: IntentLayer,
    pub deep: IntentLayer,
    pub contextual: IntentLayer,
}

/// Which complexity vocabulary group a signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    ErrorDebugging,
    MultiFile,
    Architecture,
    Creation,
    Optimization,
}

impl std::fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ErrorDebugging => write!(f, "error_debugging"),
            Self::MultiFile => write!(f, "multi_file"),
            Self::Architecture => write!(f, "architecture"),
            Self::Creation => write!(f, "creation"),
            Self::Optimization => write!(f, "optimization"),
        }
    }
}

/// A detected complexity escalation signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexitySignal {
    /// Which vocabulary group fired.
    pub category: SignalCategory,
    /// The pattern or keyword that matched.
    pub indicators: Vec<String>,
    /// Fixed escalation level for this group, in `[0.0, 1.0]`.
    pub escalation: f64,
}

/// A content domain the context must cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Technical,
    Debugging,
    ErrorAnalysis,
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Technical => write!(f, "technical"),
            Self::Debugging => write!(f, "debugging"),
            Self::ErrorAnalysis => write!(f, "error_analysis"),
        }
    }
}

/// Derived context target for the assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRequirement {
    /// How much context to build.
    pub level: ContextLevel,
    /// Domains the context must cover.
    pub domains: Vec<Domain>,
    /// Rough token estimate for the full window.
    pub estimated_tokens: usize,
    /// Whether relevant history should be included.
    pub requires_history: bool,
    /// Whether file context would help (hint for the caller; this core
    /// never reads files itself).
    pub requires_files: bool,
}

impl ContextRequirement {
    /// The minimal requirement: no history, no files, ~50 tokens.
    pub fn minimal() -> Self {
        Self {
            level: ContextLevel::Minimal,
            domains: Vec::new(),
            estimated_tokens: 50,
            requires_history: false,
            requires_files: false,
        }
    }
}

/// The complete classifier output for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Surface / deep / contextual pass results.
    pub layers: IntentLayers,
    /// Detected complexity signals (possibly empty).
    pub signals: Vec<ComplexitySignal>,
    /// Derived context requirement.
    pub requirement: ContextRequirement,
    /// Weighted overall confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// The classification tier.
    pub kind: QueryKind,
    /// Present only when the classifier chose a degraded path
    /// (canned cache hit or emergency fallback).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackStrategy>,
    /// Pre-authored response body for canned cache hits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canned_response: Option<String>,
}

impl Classification {
    /// Highest escalation level across all signals, or 0.0 if none.
    pub fn max_escalation(&self) -> f64 {
        self.signals
            .iter()
            .map(|s| s.escalation)
            .fold(0.0, f64::max)
    }

    /// Whether this classification took a degraded path.
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_layer_clamps_confidence() {
        let layer = IntentLayer::new(IntentCategory::Social, 1.7, vec!["greeting".into()]);
        assert_eq!(layer.confidence, 1.0);
        let layer = IntentLayer::new(IntentCategory::Social, -0.2, vec![]);
        assert_eq!(layer.confidence, 0.0);
    }

    #[test]
    fn context_level_ordering() {
        assert!(ContextLevel::Minimal < ContextLevel::Technical);
        assert!(ContextLevel::Technical < ContextLevel::Comprehensive);
    }

    #[test]
    fn query_kind_display() {
        assert_eq!(QueryKind::Simple.to_string(), "SIMPLE");
        assert_eq!(QueryKind::Escalated.to_string(), "ESCALATED");
    }

    #[test]
    fn max_escalation_over_signals() {
        let c = Classification {
            layers: IntentLayers {
                surface: IntentLayer::new(IntentCategory::Social, 0.0, vec![]),
                deep: IntentLayer::new(IntentCategory::Technical, 0.8, vec![]),
                contextual: IntentLayer::new(IntentCategory::Continuation, 0.2, vec![]),
            },
            signals: vec![
                ComplexitySignal {
                    category: SignalCategory::MultiFile,
                    indicators: vec!["project".into()],
                    escalation: 0.6,
                },
                ComplexitySignal {
                    category: SignalCategory::ErrorDebugging,
                    indicators: vec!["undefined".into()],
                    escalation: 0.75,
                },
            ],
            requirement: ContextRequirement::minimal(),
            confidence: 0.7,
            kind: QueryKind::Complex,
            fallback: None,
            canned_response: None,
        };
        assert!((c.max_escalation() - 0.75).abs() < 1e-9);
        assert!(!c.is_fallback());
    }
}

//! Multi-pass query classification.
//!
//! The [`QueryClassifier`] decides how much context a query deserves before
//! any expensive work happens. Three paths exist, cheapest first:
//!
//! 1. Canned fast path: canonical queries (greetings, thanks, vague help
//!    requests) match a pre-authored rule and short-circuit the pipeline
//!    entirely. Only consulted on the first turn of a conversation; once
//!    history exists, a greeting wrapper may hide real work.
//! 2. Full analysis: surface, deep and contextual intent passes plus
//!    complexity signal detection, weighed into a tier and a derived
//!    context requirement.
//! 3. Emergency fallback: if analysis itself fails, a minimal safe
//!    classification is returned rather than an error. Misclassification
//!    costs a few hundred wasted tokens; a failed turn costs the user.

mod compiled;
mod passes;

pub use compiled::CompiledRules;
pub use passes::{contextual_pass, deep_pass, detect_signals, surface_pass};

use tokengate_config::EngineConfig;
use tokengate_core::{
    Classification, ClassifyError, ContextLevel, ContextRequirement, Domain, FallbackKind,
    FallbackStrategy, HistoricalMessage, IntentCategory, IntentLayer, IntentLayers, Query,
    QueryKind,
};

/// The query classifier. Construct once, classify many times; rule tables
/// are compiled at construction.
pub struct QueryClassifier {
    config: EngineConfig,
    rules: CompiledRules,
}

impl QueryClassifier {
    /// Build a classifier from configuration, compiling its rule tables.
    pub fn new(config: EngineConfig) -> Result<Self, ClassifyError> {
        let rules = CompiledRules::compile(&config.rules)?;
        Ok(Self { config, rules })
    }

    /// Classify a query against its conversation history.
    ///
    /// Never fails: internal analysis errors degrade to the emergency
    /// classification. `previous_level` is the context level of the
    /// previous turn, used to detect mid-conversation escalation.
    pub fn classify(
        &self,
        query: &Query,
        history: &[HistoricalMessage],
        previous_level: Option<ContextLevel>,
    ) -> Classification {
        if history.is_empty() {
            if let Some(canned) = self.check_canned(&query.text) {
                return canned;
            }
        }

        let mut classification = self.analyze(query, history);
        classification.kind =
            escalate_if_jump(classification.kind, previous_level, !history.is_empty());
        if classification.kind == QueryKind::Escalated {
            tracing::debug!(
                previous = ?previous_level,
                "Complexity jump detected, escalating tier"
            );
        }
        classification
    }

    /// The full three-pass analysis.
    fn analyze(&self, query: &Query, history: &[HistoricalMessage]) -> Classification {
        let tuning = &self.config.classifier;
        let surface = passes::surface_pass(&query.text, &self.rules);
        let deep = passes::deep_pass(&query.text, &self.config.rules, tuning);
        let contextual =
            passes::contextual_pass(&query.text, !history.is_empty(), &self.config.rules, tuning);
        let signals = passes::detect_signals(&query.text, &self.rules);

        let confidence = surface.confidence * tuning.surface_share
            + deep.confidence * tuning.deep_share
            + contextual.confidence * tuning.contextual_share;

        let max_escalation = signals.iter().map(|s| s.escalation).fold(0.0, f64::max);
        let requirement = self.derive_requirement(&deep, max_escalation);

        let kind = if max_escalation > tuning.escalation_gate && deep.confidence > tuning.deep_gate
        {
            QueryKind::Complex
        } else if deep.confidence > tuning.medium_gate || !signals.is_empty() {
            QueryKind::Medium
        } else {
            QueryKind::Simple
        };

        tracing::debug!(
            %kind,
            confidence = format!("{confidence:.2}"),
            signals = signals.len(),
            level = %requirement.level,
            "Query classified"
        );

        Classification {
            layers: IntentLayers {
                surface,
                deep,
                contextual,
            },
            signals,
            requirement,
            confidence,
            kind,
            fallback: None,
            canned_response: None,
        }
    }

    /// Derive the context requirement from deep intent and signals.
    fn derive_requirement(&self, deep: &IntentLayer, max_escalation: f64) -> ContextRequirement {
        let tuning = &self.config.classifier;
        let mut requirement = ContextRequirement::minimal();

        if deep.confidence > tuning.deep_gate {
            requirement.level = ContextLevel::Technical;
            requirement.estimated_tokens = 300;
            requirement.requires_history = true;
            requirement.domains.push(Domain::Technical);
        }

        if max_escalation > tuning.escalation_gate {
            requirement.level = ContextLevel::Comprehensive;
            requirement.estimated_tokens = 800;
            requirement.requires_history = true;
            requirement.requires_files = true;
            requirement.domains.push(Domain::Debugging);
            requirement.domains.push(Domain::ErrorAnalysis);
        }

        requirement.estimated_tokens = requirement
            .estimated_tokens
            .min(self.config.ceilings.complex);
        requirement
    }

    /// First-turn canned fast path. Matches against the trimmed query.
    fn check_canned(&self, text: &str) -> Option<Classification> {
        let normalized = text.trim();
        for rule in &self.rules.canned {
            if rule.regex.is_match(normalized) {
                tracing::debug!(rule = %rule.name, tokens = rule.tokens, "Canned fast path hit");
                return Some(Classification {
                    layers: IntentLayers {
                        surface: IntentLayer::new(
                            IntentCategory::Social,
                            0.9,
                            vec!["cached_pattern".into()],
                        ),
                        deep: IntentLayer::new(
                            IntentCategory::Technical,
                            0.8,
                            vec!["cached_response".into()],
                        ),
                        contextual: IntentLayer::new(IntentCategory::Continuation, 0.5, vec![]),
                    },
                    signals: Vec::new(),
                    requirement: ContextRequirement {
                        estimated_tokens: rule.tokens,
                        ..ContextRequirement::minimal()
                    },
                    confidence: 0.95,
                    kind: rule.kind,
                    fallback: Some(FallbackStrategy::new(
                        FallbackKind::CachedResponse,
                        format!("Matched canned pattern '{}'", rule.name),
                        rule.tokens,
                    )),
                    canned_response: Some(rule.response.clone()),
                });
            }
        }
        None
    }

    /// The minimal safe classification used when analysis itself fails.
    /// Never expensive: the body is picked by plain vocabulary matching
    /// against the query (technical / error / creation / generic).
    pub fn emergency_fallback(&self, query: &Query) -> Classification {
        tracing::warn!("Emergency classification fallback activated");
        let emergency = self.config.rules.fallbacks.emergency_for(&query.text);
        Classification {
            layers: IntentLayers {
                surface: IntentLayer::new(IntentCategory::Social, 0.3, vec!["emergency".into()]),
                deep: IntentLayer::new(IntentCategory::Technical, 0.3, vec!["emergency".into()]),
                contextual: IntentLayer::new(IntentCategory::Continuation, 0.1, vec![]),
            },
            signals: Vec::new(),
            requirement: ContextRequirement {
                estimated_tokens: emergency.tokens,
                ..ContextRequirement::minimal()
            },
            confidence: 0.3,
            kind: QueryKind::Simple,
            fallback: Some(FallbackStrategy::new(
                FallbackKind::EmergencyMinimal,
                "Query analysis failed, using minimal safe context",
                emergency.tokens,
            )),
            canned_response: Some(emergency.body.clone()),
        }
    }

    /// The engine configuration this classifier was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Promote COMPLEX to ESCALATED when the previous turn ran at a lower
/// context level and real history exists.
pub fn escalate_if_jump(
    kind: QueryKind,
    previous_level: Option<ContextLevel>,
    has_history: bool,
) -> QueryKind {
    match (kind, previous_level) {
        (QueryKind::Complex, Some(level))
            if has_history && level < ContextLevel::Comprehensive =>
        {
            QueryKind::Escalated
        }
        _ => kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokengate_core::SignalCategory;

    fn classifier() -> QueryClassifier {
        QueryClassifier::new(EngineConfig::default()).unwrap()
    }

    fn history(n: usize) -> Vec<HistoricalMessage> {
        (0..n)
            .map(|i| HistoricalMessage::user(format!("message {i} about the api endpoint")))
            .collect()
    }

    #[test]
    fn greeting_takes_canned_fast_path() {
        let c = classifier();
        let result = c.classify(&Query::new("Hello!"), &[], None);
        assert_eq!(result.kind, QueryKind::Simple);
        assert!(result.is_fallback());
        let fb = result.fallback.as_ref().unwrap();
        assert_eq!(fb.kind, FallbackKind::CachedResponse);
        assert_eq!(fb.estimated_tokens, 60);
        assert_eq!(result.confidence, 0.95);
        assert!(result.canned_response.is_some());
    }

    #[test]
    fn gratitude_takes_canned_fast_path() {
        let c = classifier();
        let result = c.classify(&Query::new("thanks!"), &[], None);
        assert_eq!(result.kind, QueryKind::Simple);
        let fb = result.fallback.as_ref().unwrap();
        assert_eq!(fb.kind, FallbackKind::CachedResponse);
        assert_eq!(fb.estimated_tokens, 25);
        assert!(result.canned_response.as_ref().unwrap().contains("welcome"));
    }

    #[test]
    fn canned_path_skipped_when_history_exists() {
        let c = classifier();
        let result = c.classify(&Query::new("Hello!"), &history(2), None);
        assert!(!result.is_fallback());
        assert_eq!(result.kind, QueryKind::Simple);
    }

    #[test]
    fn focused_technical_query_is_medium() {
        let c = classifier();
        let result = c.classify(&Query::new("How do I fix this function?"), &[], None);
        assert_eq!(result.kind, QueryKind::Medium);
        assert!(!result.is_fallback());
        assert!(result.layers.deep.confidence > 0.5);
        assert_eq!(result.requirement.level, ContextLevel::Technical);
        assert!(result.requirement.requires_history);
    }

    #[test]
    fn greeting_wrapped_error_query_is_complex() {
        let c = classifier();
        let query = Query::new(
            "hi, can you help debug this error: Cannot read property 'map' of undefined",
        );
        let result = c.classify(&query, &history(5), None);
        assert_eq!(result.kind, QueryKind::Complex);
        assert!(result.layers.deep.confidence > 0.6);
        assert!(result.max_escalation() > 0.7);
        assert!(result
            .signals
            .iter()
            .any(|s| s.category == SignalCategory::ErrorDebugging));
        assert_eq!(result.requirement.level, ContextLevel::Comprehensive);
        assert!(result.requirement.requires_files);
        assert!(result.requirement.domains.contains(&Domain::Debugging));
    }

    #[test]
    fn complex_after_minimal_turn_escalates() {
        let c = classifier();
        let query = Query::new(
            "hi, can you help debug this error: Cannot read property 'map' of undefined",
        );
        let result = c.classify(&query, &history(5), Some(ContextLevel::Minimal));
        assert_eq!(result.kind, QueryKind::Escalated);
    }

    #[test]
    fn complex_after_comprehensive_turn_stays_complex() {
        let c = classifier();
        let query = Query::new(
            "hi, can you help debug this error: Cannot read property 'map' of undefined",
        );
        let result = c.classify(&query, &history(5), Some(ContextLevel::Comprehensive));
        assert_eq!(result.kind, QueryKind::Complex);
    }

    #[test]
    fn classification_is_deterministic() {
        let c = classifier();
        let query = Query::new("optimize the database queries in this project");
        let a = c.classify(&query, &history(3), None);
        let b = c.classify(&query, &history(3), None);
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.signals.len(), b.signals.len());
    }

    #[test]
    fn emergency_fallback_is_minimal() {
        let c = classifier();
        let result = c.emergency_fallback(&Query::new("hmm, where do I even start"));
        assert_eq!(result.kind, QueryKind::Simple);
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.requirement.estimated_tokens, 50);
        let fb = result.fallback.as_ref().unwrap();
        assert_eq!(fb.kind, FallbackKind::EmergencyMinimal);
    }

    #[test]
    fn emergency_body_matches_query_vocabulary() {
        let c = classifier();

        let errorish = c.emergency_fallback(&Query::new("everything is broken and undefined"));
        assert_eq!(errorish.fallback.as_ref().unwrap().estimated_tokens, 85);
        assert!(errorish.canned_response.unwrap().contains("error message"));

        let creation = c.emergency_fallback(&Query::new("make me a portfolio site"));
        assert_eq!(creation.fallback.as_ref().unwrap().estimated_tokens, 90);
        assert_eq!(creation.requirement.estimated_tokens, 90);
        // Either way the strategy tag stays emergency_minimal
        assert_eq!(
            creation.fallback.as_ref().unwrap().kind,
            FallbackKind::EmergencyMinimal
        );
    }

    #[test]
    fn estimated_tokens_never_exceed_complex_ceiling() {
        let c = classifier();
        let result = c.classify(
            &Query::new("debug the error in the architecture of this application"),
            &history(1),
            None,
        );
        assert!(result.requirement.estimated_tokens <= 1200);
    }
}

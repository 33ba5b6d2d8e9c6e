//! Context window assembly under hard token ceilings.
//!
//! The [`ContextAssembler`] turns a classification plus a history selection
//! into a [`ContextWindow`]. Assembly order is fixed: system directive,
//! user query, history digest, technical digest, then optional domain
//! guidance. The ceiling for the query's tier is enforced by trimming
//! removable components in a fixed priority order; the directive and the
//! user query are never trimmed. If the window still exceeds the ceiling
//! with nothing left to remove, assembly fails with
//! [`AssemblyError::BudgetOverflow`].

mod guidance;

pub use guidance::{GuidanceProvider, GuidedAssembler, NoopGuidance};

use tokengate_config::EngineConfig;
use tokengate_core::{
    AssemblyError, Classification, ComponentKind, ContextComponent, ContextLevel, ContextWindow,
    Domain, FallbackKind, FallbackStrategy, IntentCategory, Query, QueryKind,
};
use tokengate_relevance::Selection;

/// Components removed when a window exceeds its ceiling, in order.
const TRIM_ORDER: [ComponentKind; 3] = [
    ComponentKind::DomainGuidance,
    ComponentKind::HistoryDigest,
    ComponentKind::TechnicalDigest,
];

/// Most relevant messages carried into the history digest.
const DIGEST_MESSAGES: usize = 3;
/// Characters excerpted per digested message.
const DIGEST_EXCERPT_CHARS: usize = 200;

/// Assembles bounded context windows.
pub struct ContextAssembler {
    config: EngineConfig,
}

impl ContextAssembler {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Assemble the window for a classified query.
    ///
    /// Classifications carrying a canned or emergency response short-circuit
    /// into a single-component degraded window; everything else goes through
    /// the standard component build and ceiling enforcement.
    pub fn assemble(
        &self,
        query: &Query,
        classification: &Classification,
        selection: &Selection,
    ) -> Result<ContextWindow, AssemblyError> {
        if let Some(window) = self.fallback_window(classification) {
            return Ok(window);
        }

        let requirement = &classification.requirement;
        let mut components = vec![
            ContextComponent::new(
                ComponentKind::SystemDirective,
                self.directive(requirement.level),
                "system",
            ),
            ContextComponent::new(ComponentKind::UserQuery, query.text.clone(), "user"),
        ];

        if requirement.requires_history && !selection.selected.is_empty() {
            if let Some(digest) = self.history_digest(selection) {
                components.push(digest);
            }
        }

        if let Some(digest) = self.technical_digest(&requirement.domains) {
            components.push(digest);
        }

        let window = ContextWindow::new(
            requirement.level,
            components,
            requirement.domains.clone(),
        );
        let mut window = self.enforce_ceiling(window, classification.kind)?;
        window.transition = self.transition(query, classification);
        Ok(window)
    }

    /// Enforce the tier ceiling by trimming removable components in
    /// priority order. The directive and user query always survive.
    pub fn enforce_ceiling(
        &self,
        window: ContextWindow,
        kind: QueryKind,
    ) -> Result<ContextWindow, AssemblyError> {
        let ceiling = self.config.ceilings.for_kind(kind);
        if window.token_count <= ceiling {
            return Ok(window);
        }

        tracing::warn!(
            tokens = window.token_count,
            ceiling,
            %kind,
            "Window exceeds ceiling, trimming"
        );

        let mut components = window.components;
        let mut total = components.iter().map(|c| c.token_count).sum::<usize>();
        for kind_to_remove in TRIM_ORDER {
            if total <= ceiling {
                break;
            }
            if let Some(idx) = components.iter().position(|c| c.kind == kind_to_remove) {
                let removed = components.remove(idx);
                total -= removed.token_count;
                tracing::debug!(component = %kind_to_remove, tokens = removed.token_count, "Trimmed component");
            }
        }

        if total > ceiling {
            tracing::error!(
                tokens = total,
                ceiling,
                %kind,
                "Window still over ceiling with nothing left to trim"
            );
            return Err(AssemblyError::BudgetOverflow {
                kind: kind.to_string(),
                token_count: total,
                ceiling,
            });
        }

        let mut trimmed = ContextWindow::new(window.level, components, window.domains);
        trimmed.fallback = window.fallback;
        trimmed.transition = window.transition;
        Ok(trimmed)
    }

    /// Single-component window for canned and emergency classifications,
    /// or `None` if the classification carries no pre-authored response.
    /// Carries the classification's fixed token estimate, not a fresh one.
    pub fn fallback_window(&self, classification: &Classification) -> Option<ContextWindow> {
        let response = classification.canned_response.as_deref()?;
        let strategy = classification
            .fallback
            .clone()
            .unwrap_or_else(|| {
                FallbackStrategy::new(FallbackKind::SafeDefault, "No strategy recorded", 50)
            });
        let source = match strategy.kind {
            FallbackKind::CachedResponse => "cache",
            FallbackKind::EmergencyMinimal => "emergency",
            _ => "fallback",
        };
        let component = ContextComponent::new(ComponentKind::FallbackResponse, response, source)
            .with_token_count(strategy.estimated_tokens);
        tracing::debug!(kind = %strategy.kind, tokens = strategy.estimated_tokens, "Built degraded window");
        Some(
            ContextWindow::new(ContextLevel::Minimal, vec![component], Vec::new())
                .with_fallback(strategy),
        )
    }

    /// Window returned while the degradation controller is open. Echoes the
    /// query so the downstream call can still respond to it directly.
    pub fn breaker_window(&self, query: &Query) -> ContextWindow {
        let body = &self.config.rules.fallbacks.breaker_open.body;
        let content = format!("{body}\n\n**{}**", query.text);
        let component = ContextComponent::new(ComponentKind::FallbackResponse, content, "breaker");
        let tokens = component.token_count;
        ContextWindow::new(ContextLevel::Minimal, vec![component], Vec::new()).with_fallback(
            FallbackStrategy::new(
                FallbackKind::CircuitBreaker,
                "Breaker open after repeated failures",
                tokens,
            ),
        )
    }

    fn directive(&self, level: ContextLevel) -> String {
        let d = &self.config.rules.directives;
        let framing = match level {
            ContextLevel::Minimal => &d.minimal,
            ContextLevel::Technical => &d.technical,
            ContextLevel::Comprehensive => &d.comprehensive,
        };
        format!("{} {}", d.base, framing)
    }

    /// Digest of the most relevant selected messages: up to three, each
    /// excerpted to 200 characters.
    fn history_digest(&self, selection: &Selection) -> Option<ContextComponent> {
        if selection.selected.is_empty() {
            return None;
        }
        let pieces: Vec<String> = selection
            .selected
            .iter()
            .take(DIGEST_MESSAGES)
            .map(|s| {
                let excerpt: String = s
                    .message
                    .content
                    .chars()
                    .take(DIGEST_EXCERPT_CHARS)
                    .collect();
                format!("Previous context: {excerpt}...")
            })
            .collect();
        let content = format!("Relevant conversation history:\n{}", pieces.join("\n\n"));
        let top_score = selection.selected[0].score.total;
        Some(
            ContextComponent::new(ComponentKind::HistoryDigest, content, "history")
                .with_relevance(top_score),
        )
    }

    /// Focus lines for debugging and error-analysis domains.
    fn technical_digest(&self, domains: &[Domain]) -> Option<ContextComponent> {
        let mut lines = Vec::new();
        if domains.contains(&Domain::Debugging) {
            lines.push(
                "Focus on identifying and solving code issues. Ask for error messages, \
                 stack traces, and relevant code snippets if needed.",
            );
        }
        if domains.contains(&Domain::ErrorAnalysis) {
            lines.push(
                "Analyze errors systematically: check syntax, logic, dependencies, \
                 and runtime conditions.",
            );
        }
        if lines.is_empty() {
            return None;
        }
        let content = format!("Technical context:\n{}", lines.join("\n"));
        Some(ContextComponent::new(
            ComponentKind::TechnicalDigest,
            content,
            "technical",
        ))
    }

    /// Cosmetic transition phrase for level escalations. The phrase is
    /// picked deterministically from the pool by query length, so the same
    /// query always gets the same phrase.
    fn transition(&self, query: &Query, classification: &Classification) -> Option<String> {
        let t = &self.config.rules.transitions;
        let pool = match classification.requirement.level {
            ContextLevel::Technical
                if classification.layers.surface.category == IntentCategory::Social =>
            {
                &t.minimal_to_technical
            }
            ContextLevel::Comprehensive => &t.technical_to_comprehensive,
            _ => return None,
        };
        if pool.is_empty() {
            return None;
        }
        Some(pool[query.text.len() % pool.len()].clone())
    }

    /// The engine configuration this assembler was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokengate_core::{
        ContextRequirement, HistoricalMessage, IntentLayer, IntentLayers,
    };
    use tokengate_relevance::{RelevanceScore, ScoredMessage};

    fn assembler() -> ContextAssembler {
        ContextAssembler::new(EngineConfig::default())
    }

    fn layers(surface_social: bool) -> IntentLayers {
        let surface_cat = if surface_social {
            IntentCategory::Social
        } else {
            IntentCategory::Technical
        };
        IntentLayers {
            surface: IntentLayer::new(surface_cat, 0.3, vec![]),
            deep: IntentLayer::new(IntentCategory::Technical, 0.7, vec![]),
            contextual: IntentLayer::new(IntentCategory::Continuation, 0.2, vec![]),
        }
    }

    fn classification(
        kind: QueryKind,
        level: ContextLevel,
        domains: Vec<Domain>,
        requires_history: bool,
    ) -> Classification {
        Classification {
            layers: layers(false),
            signals: vec![],
            requirement: ContextRequirement {
                level,
                domains,
                estimated_tokens: 300,
                requires_history,
                requires_files: false,
            },
            confidence: 0.7,
            kind,
            fallback: None,
            canned_response: None,
        }
    }

    fn empty_selection() -> Selection {
        Selection {
            selected: vec![],
            total_considered: 0,
            strategy: "relevance_ranking".into(),
            estimated_tokens: 0,
            threshold: 0.3,
            fallback_used: false,
        }
    }

    fn selection_of(contents: &[&str]) -> Selection {
        let selected: Vec<ScoredMessage> = contents
            .iter()
            .map(|c| ScoredMessage {
                message: HistoricalMessage::user(*c),
                score: RelevanceScore {
                    semantic: 0.5,
                    recency: 0.9,
                    engagement: 0.5,
                    technical_overlap: 0.4,
                    total: 0.62,
                },
            })
            .collect();
        let estimated_tokens = selected
            .iter()
            .map(|s| s.message.content.len().div_ceil(4))
            .sum();
        Selection {
            total_considered: selected.len(),
            selected,
            strategy: "relevance_ranking".into(),
            estimated_tokens,
            threshold: 0.3,
            fallback_used: false,
        }
    }

    #[test]
    fn minimal_window_has_directive_and_query_only() {
        let a = assembler();
        let c = classification(QueryKind::Simple, ContextLevel::Minimal, vec![], false);
        let window = a
            .assemble(&Query::new("hello"), &c, &empty_selection())
            .unwrap();
        assert_eq!(window.components.len(), 2);
        assert_eq!(window.components[0].kind, ComponentKind::SystemDirective);
        assert_eq!(window.components[1].kind, ComponentKind::UserQuery);
        assert!(window.token_count <= 50);
        assert!(!window.is_degraded());
    }

    #[test]
    fn history_digest_caps_messages_and_excerpts() {
        let a = assembler();
        let c = classification(
            QueryKind::Complex,
            ContextLevel::Comprehensive,
            vec![Domain::Technical],
            true,
        );
        let long = "x".repeat(500);
        let selection = selection_of(&[&long, &long, &long, &long, &long]);
        let window = a
            .assemble(&Query::new("debug the error"), &c, &selection)
            .unwrap();
        let digest = window.component(ComponentKind::HistoryDigest).unwrap();
        // 3 messages max, 200 chars each
        assert_eq!(digest.content.matches("Previous context:").count(), 3);
        assert!(!digest.content.contains(&"x".repeat(201)));
        assert_eq!(digest.relevance, Some(0.62));
    }

    #[test]
    fn technical_digest_built_for_debugging_domains() {
        let a = assembler();
        let c = classification(
            QueryKind::Complex,
            ContextLevel::Comprehensive,
            vec![Domain::Debugging, Domain::ErrorAnalysis],
            false,
        );
        let window = a
            .assemble(&Query::new("fix the crash"), &c, &empty_selection())
            .unwrap();
        let digest = window.component(ComponentKind::TechnicalDigest).unwrap();
        assert!(digest.content.contains("stack traces"));
        assert!(digest.content.contains("systematically"));
    }

    #[test]
    fn trim_removes_history_before_failing() {
        let a = assembler();
        let c = classification(
            QueryKind::Medium,
            ContextLevel::Technical,
            vec![Domain::Technical],
            true,
        );
        // A 1200-char query (300 tokens) plus digest pushes past the
        // 400-token MEDIUM ceiling; the digest goes, the query stays.
        let query = Query::new("q".repeat(1200));
        let filler = "m".repeat(500);
        let selection = selection_of(&[filler.as_str(); 3]);
        let window = a.assemble(&query, &c, &selection).unwrap();
        assert!(window.token_count <= 400);
        assert!(window.component(ComponentKind::HistoryDigest).is_none());
        assert!(window.component(ComponentKind::UserQuery).is_some());
    }

    #[test]
    fn overflow_when_untrimmable_exceeds_ceiling() {
        let a = assembler();
        let c = classification(QueryKind::Simple, ContextLevel::Minimal, vec![], false);
        let query = Query::new("q".repeat(400)); // 100 tokens, SIMPLE ceiling is 50
        let err = a.assemble(&query, &c, &empty_selection()).unwrap_err();
        match err {
            AssemblyError::BudgetOverflow {
                kind,
                token_count,
                ceiling,
            } => {
                assert_eq!(kind, "SIMPLE");
                assert_eq!(ceiling, 50);
                assert!(token_count > 50);
            }
        }
    }

    #[test]
    fn assembled_windows_respect_tier_ceilings() {
        let a = assembler();
        let cases = [
            (QueryKind::Simple, ContextLevel::Minimal, 50),
            (QueryKind::Medium, ContextLevel::Technical, 400),
            (QueryKind::Complex, ContextLevel::Comprehensive, 1200),
            (QueryKind::Escalated, ContextLevel::Comprehensive, 1200),
        ];
        let selection = selection_of(&["the react component state error", "try a null check"]);
        for (kind, level, ceiling) in cases {
            let c = classification(kind, level, vec![Domain::Debugging], true);
            let window = a
                .assemble(&Query::new("fix the state error"), &c, &selection)
                .unwrap();
            assert!(
                window.token_count <= ceiling,
                "{kind} window {} over {ceiling}",
                window.token_count
            );
        }
    }

    #[test]
    fn canned_classification_yields_degraded_window() {
        let a = assembler();
        let mut c = classification(QueryKind::Simple, ContextLevel::Minimal, vec![], false);
        c.fallback = Some(FallbackStrategy::new(
            FallbackKind::CachedResponse,
            "Matched canned pattern 'pure_greeting'",
            60,
        ));
        c.canned_response = Some("Hi! What are you working on today?".into());
        let window = a.assemble(&Query::new("hello!"), &c, &empty_selection()).unwrap();
        assert!(window.is_degraded());
        assert_eq!(window.token_count, 60);
        assert_eq!(window.components.len(), 1);
        assert_eq!(window.components[0].kind, ComponentKind::FallbackResponse);
        assert_eq!(window.components[0].source, "cache");
    }

    #[test]
    fn breaker_window_echoes_query() {
        let a = assembler();
        let window = a.breaker_window(&Query::new("fix my build"));
        assert!(window.is_degraded());
        assert_eq!(
            window.fallback.as_ref().unwrap().kind,
            FallbackKind::CircuitBreaker
        );
        assert!(window.render().contains("fix my build"));
    }

    #[test]
    fn transition_is_deterministic_and_level_gated() {
        let a = assembler();
        let mut c = classification(
            QueryKind::Medium,
            ContextLevel::Technical,
            vec![Domain::Technical],
            false,
        );
        c.layers = layers(true); // social surface wrapper
        let query = Query::new("hi, please fix the component");
        let w1 = a.assemble(&query, &c, &empty_selection()).unwrap();
        let w2 = a.assemble(&query, &c, &empty_selection()).unwrap();
        assert!(w1.transition.is_some());
        assert_eq!(w1.transition, w2.transition);

        // Minimal level gets no transition
        let minimal = classification(QueryKind::Simple, ContextLevel::Minimal, vec![], false);
        let w3 = a.assemble(&Query::new("ok"), &minimal, &empty_selection()).unwrap();
        assert!(w3.transition.is_none());
    }
}

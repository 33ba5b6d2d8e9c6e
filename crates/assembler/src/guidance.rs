//! Optional domain-guidance decoration.
//!
//! A [`GuidedAssembler`] wraps the base assembler and asks an external
//! [`GuidanceProvider`] for a short quality-guidance block keyed by
//! component kind and domain. Guidance is strictly additive and strictly
//! optional: provider absence, provider failure, or an oversized block all
//! yield the base window unchanged. Degraded windows are never decorated.

use async_trait::async_trait;
use tokengate_core::{
    AssemblyError, Classification, ComponentKind, ContextComponent, ContextWindow, Domain, Query,
};
use tokengate_relevance::Selection;

use crate::ContextAssembler;

/// External source of domain-specific guidance text.
///
/// Returning `None` means no guidance for that component/domain pair;
/// implementations should also map their internal failures to `None`.
#[async_trait]
pub trait GuidanceProvider: Send + Sync {
    async fn guidance(&self, component: ComponentKind, domain: Domain) -> Option<String>;
}

/// A provider that never has guidance. The default collaborator.
pub struct NoopGuidance;

#[async_trait]
impl GuidanceProvider for NoopGuidance {
    async fn guidance(&self, _component: ComponentKind, _domain: Domain) -> Option<String> {
        None
    }
}

/// The base assembler decorated with a guidance provider.
pub struct GuidedAssembler<P> {
    inner: ContextAssembler,
    provider: P,
}

impl<P: GuidanceProvider> GuidedAssembler<P> {
    pub fn new(inner: ContextAssembler, provider: P) -> Self {
        Self { inner, provider }
    }

    /// Assemble, then append a guidance block when the provider has one for
    /// the window's primary domain. The tier ceiling is re-enforced after
    /// decoration, so guidance is the first thing trimmed back out.
    pub async fn assemble(
        &self,
        query: &Query,
        classification: &Classification,
        selection: &Selection,
    ) -> Result<ContextWindow, AssemblyError> {
        let window = self.inner.assemble(query, classification, selection)?;
        if window.is_degraded() {
            return Ok(window);
        }

        let Some(domain) = classification.requirement.domains.first().copied() else {
            return Ok(window);
        };
        let Some(text) = self
            .provider
            .guidance(ComponentKind::DomainGuidance, domain)
            .await
        else {
            return Ok(window);
        };

        let component = ContextComponent::new(ComponentKind::DomainGuidance, text, "guidance");
        let budget = self.inner.config().guidance.token_budget;
        if component.token_count > budget {
            tracing::debug!(
                tokens = component.token_count,
                budget,
                "Guidance block over budget, skipping"
            );
            return Ok(window);
        }

        let mut components = window.components;
        components.push(component);
        let mut decorated = ContextWindow::new(window.level, components, window.domains);
        decorated.transition = window.transition;
        self.inner.enforce_ceiling(decorated, classification.kind)
    }

    /// The wrapped base assembler.
    pub fn inner(&self) -> &ContextAssembler {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokengate_config::EngineConfig;
    use tokengate_core::{
        ContextLevel, ContextRequirement, IntentCategory, IntentLayer, IntentLayers, QueryKind,
    };

    struct FixedGuidance(String);

    #[async_trait]
    impl GuidanceProvider for FixedGuidance {
        async fn guidance(&self, _component: ComponentKind, domain: Domain) -> Option<String> {
            (domain == Domain::Debugging).then(|| self.0.clone())
        }
    }

    fn classification(domains: Vec<Domain>) -> Classification {
        Classification {
            layers: IntentLayers {
                surface: IntentLayer::new(IntentCategory::Technical, 0.0, vec![]),
                deep: IntentLayer::new(IntentCategory::Technical, 0.8, vec![]),
                contextual: IntentLayer::new(IntentCategory::Social, 0.0, vec![]),
            },
            signals: vec![],
            requirement: ContextRequirement {
                level: ContextLevel::Comprehensive,
                domains,
                estimated_tokens: 800,
                requires_history: false,
                requires_files: true,
            },
            confidence: 0.7,
            kind: QueryKind::Complex,
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

    #[tokio::test]
    async fn guidance_appended_for_matching_domain() {
        let guided = GuidedAssembler::new(
            ContextAssembler::new(EngineConfig::default()),
            FixedGuidance("Check the error boundary first.".into()),
        );
        let window = guided
            .assemble(
                &Query::new("debug the error"),
                &classification(vec![Domain::Debugging]),
                &empty_selection(),
            )
            .await
            .unwrap();
        let block = window.component(ComponentKind::DomainGuidance).unwrap();
        assert_eq!(block.content, "Check the error boundary first.");
        assert!(window.token_count <= 1200);
    }

    #[tokio::test]
    async fn no_guidance_when_provider_declines() {
        let guided = GuidedAssembler::new(
            ContextAssembler::new(EngineConfig::default()),
            FixedGuidance("unused".into()),
        );
        // Provider only serves the debugging domain
        let window = guided
            .assemble(
                &Query::new("build a component"),
                &classification(vec![Domain::Technical]),
                &empty_selection(),
            )
            .await
            .unwrap();
        assert!(window.component(ComponentKind::DomainGuidance).is_none());
    }

    #[tokio::test]
    async fn noop_provider_leaves_window_unchanged() {
        let guided = GuidedAssembler::new(
            ContextAssembler::new(EngineConfig::default()),
            NoopGuidance,
        );
        let window = guided
            .assemble(
                &Query::new("debug the error"),
                &classification(vec![Domain::Debugging]),
                &empty_selection(),
            )
            .await
            .unwrap();
        assert!(window.component(ComponentKind::DomainGuidance).is_none());
    }

    #[tokio::test]
    async fn oversized_guidance_is_skipped() {
        let guided = GuidedAssembler::new(
            ContextAssembler::new(EngineConfig::default()),
            // 1000 chars is 250 tokens, over the 150-token budget
            FixedGuidance("g".repeat(1000)),
        );
        let window = guided
            .assemble(
                &Query::new("debug the error"),
                &classification(vec![Domain::Debugging]),
                &empty_selection(),
            )
            .await
            .unwrap();
        assert!(window.component(ComponentKind::DomainGuidance).is_none());
    }
}

//! The end-to-end context selection pipeline.
//!
//! [`ContextPipeline`] wires the classifier, the history selector, the
//! assembler and the usage tracker behind a single [`run`] call, with the
//! [`DegradationController`] gating the whole thing. The pipeline never
//! returns an error to the caller: every failure mode degrades to a
//! cheaper window instead.
//!
//! Failure accounting: a history selection error, an assembly budget
//! overflow and a blown deadline each count one breaker failure; a clean
//! run resets the count. Canned fast-path turns touch neither side.
//!
//! [`run`]: ContextPipeline::run

mod breaker;

pub use breaker::{BreakerStatus, DegradationController};
pub use tokengate_assembler::{GuidanceProvider, NoopGuidance};

use std::time::Duration;

use async_trait::async_trait;
use tokengate_assembler::{ContextAssembler, GuidedAssembler};
use tokengate_classifier::QueryClassifier;
use tokengate_config::EngineConfig;
use tokengate_core::{
    AssemblyError, Classification, ComponentKind, ContextComponent, ContextLevel, ContextWindow,
    Error, FallbackKind, FallbackStrategy, HistoricalMessage, Query, QueryKind, RelevanceError,
    SessionId,
};
use tokengate_relevance::{RelevanceScorer, Selection};
use tokengate_telemetry::{UsageReport, UsageTracker};

/// Seam for history selection, so callers can substitute their own
/// retrieval (or tests can inject failures).
#[async_trait]
pub trait HistorySelector: Send + Sync {
    async fn select(
        &self,
        query: &Query,
        history: &[HistoricalMessage],
    ) -> Result<Selection, RelevanceError>;
}

#[async_trait]
impl HistorySelector for RelevanceScorer {
    async fn select(
        &self,
        query: &Query,
        history: &[HistoricalMessage],
    ) -> Result<Selection, RelevanceError> {
        RelevanceScorer::select(self, query, history)
    }
}

/// One query through the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub query: Query,
    pub history: Vec<HistoricalMessage>,
    pub session_id: SessionId,
    /// Context level of the previous turn, for escalation detection.
    pub previous_level: Option<ContextLevel>,
    /// Per-request guidance override; `None` follows the config default.
    pub wants_guidance: Option<bool>,
    /// Optional wall-clock budget for selection and assembly.
    pub deadline: Option<Duration>,
}

impl PipelineRequest {
    pub fn new(query: Query, session_id: SessionId) -> Self {
        Self {
            query,
            history: Vec::new(),
            session_id,
            previous_level: None,
            wants_guidance: None,
            deadline: None,
        }
    }

    pub fn with_guidance(mut self, wants_guidance: bool) -> Self {
        self.wants_guidance = Some(wants_guidance);
        self
    }

    pub fn with_history(mut self, history: Vec<HistoricalMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_previous_level(mut self, level: ContextLevel) -> Self {
        self.previous_level = Some(level);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// What the pipeline produced for one query.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Absent only on the breaker-open path, where no analysis ran.
    pub classification: Option<Classification>,
    pub window: ContextWindow,
    pub report: UsageReport,
}

/// The assembled pipeline. Generic over the history selector and the
/// guidance provider; [`ContextPipeline::new`] wires the defaults.
pub struct ContextPipeline<S, G> {
    config: EngineConfig,
    classifier: QueryClassifier,
    selector: S,
    assembler: GuidedAssembler<G>,
    fallback_scorer: RelevanceScorer,
    tracker: UsageTracker,
    breaker: DegradationController,
}

impl ContextPipeline<RelevanceScorer, NoopGuidance> {
    /// Pipeline with the built-in relevance scorer and no guidance.
    pub fn new(config: EngineConfig) -> Result<Self, Error> {
        let selector = RelevanceScorer::new(&config);
        Self::with_parts(config, selector, NoopGuidance)
    }
}

impl<S: HistorySelector, G: GuidanceProvider> ContextPipeline<S, G> {
    /// Pipeline with injected collaborators.
    pub fn with_parts(config: EngineConfig, selector: S, guidance: G) -> Result<Self, Error> {
        config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        let classifier = QueryClassifier::new(config.clone())?;
        let assembler = GuidedAssembler::new(ContextAssembler::new(config.clone()), guidance);
        let fallback_scorer = RelevanceScorer::new(&config);
        let tracker = UsageTracker::new(config.baselines.clone());
        let breaker = DegradationController::new(&config.breaker);
        Ok(Self {
            config,
            classifier,
            selector,
            assembler,
            fallback_scorer,
            tracker,
            breaker,
        })
    }

    /// Run one query end to end. Infallible by design: every failure mode
    /// yields a degraded window rather than an error.
    pub async fn run(&self, request: PipelineRequest) -> PipelineOutcome {
        let PipelineRequest {
            query,
            history,
            session_id,
            previous_level,
            wants_guidance,
            deadline,
        } = request;
        let use_guidance = wants_guidance.unwrap_or(self.config.guidance.enabled);

        if self.breaker.is_open() {
            tracing::warn!(session = %session_id, "Breaker open, serving breaker window");
            let window = self.assembler.inner().breaker_window(&query);
            let report =
                self.tracker
                    .record(&session_id, QueryKind::Simple, true, window.token_count);
            return PipelineOutcome {
                classification: None,
                window,
                report,
            };
        }

        let classification = self.classifier.classify(&query, &history, previous_level);

        // Canned fast path: no selection, no assembly, no breaker traffic.
        if classification.is_fallback() {
            if let Some(window) = self.assembler.inner().fallback_window(&classification) {
                let report = self.tracker.record(
                    &session_id,
                    classification.kind,
                    true,
                    window.token_count,
                );
                return PipelineOutcome {
                    classification: Some(classification),
                    window,
                    report,
                };
            }
        }

        let mut failed = false;
        let built = {
            let work =
                self.build_window(&query, &history, &classification, use_guidance, &mut failed);
            match deadline {
                Some(limit) => tokio::time::timeout(limit, work).await.ok(),
                None => Some(work.await),
            }
        };

        let (classification, window) = match built {
            Some(Ok(window)) => (classification, window),
            Some(Err(err)) => {
                tracing::error!(error = %err, "Assembly failed, serving emergency window");
                failed = true;
                self.emergency(&query)
            }
            None => {
                tracing::warn!("Deadline exceeded, serving emergency window");
                failed = true;
                self.emergency(&query)
            }
        };

        if failed {
            self.breaker.record_failure();
        } else {
            self.breaker.record_success();
        }

        let report = self.tracker.record(
            &session_id,
            classification.kind,
            window.is_degraded(),
            window.token_count,
        );
        PipelineOutcome {
            classification: Some(classification),
            window,
            report,
        }
    }

    /// Selection plus assembly. A selection failure flips `failed` and
    /// continues on the recency fallback rather than aborting the turn.
    async fn build_window(
        &self,
        query: &Query,
        history: &[HistoricalMessage],
        classification: &Classification,
        use_guidance: bool,
        failed: &mut bool,
    ) -> Result<ContextWindow, AssemblyError> {
        let selection = if classification.requirement.requires_history && !history.is_empty() {
            match self.selector.select(query, history).await {
                Ok(selection) => selection,
                Err(err) => {
                    tracing::warn!(error = %err, "History selection failed, using recency fallback");
                    *failed = true;
                    self.fallback_scorer.recency_fallback(history)
                }
            }
        } else {
            Selection {
                selected: Vec::new(),
                total_considered: history.len(),
                strategy: "no_history".into(),
                estimated_tokens: 0,
                threshold: self.config.weights.threshold,
                fallback_used: false,
            }
        };

        if use_guidance {
            self.assembler.assemble(query, classification, &selection).await
        } else {
            self.assembler.inner().assemble(query, classification, &selection)
        }
    }

    /// The emergency classification and its minimal window, with the body
    /// tailored to the query's vocabulary.
    fn emergency(&self, query: &Query) -> (Classification, ContextWindow) {
        let classification = self.classifier.emergency_fallback(query);
        let window = self
            .assembler
            .inner()
            .fallback_window(&classification)
            .unwrap_or_else(|| {
                let e = self.config.rules.fallbacks.emergency_for(&query.text);
                let component =
                    ContextComponent::new(ComponentKind::FallbackResponse, &e.body, "emergency")
                        .with_token_count(e.tokens);
                ContextWindow::new(ContextLevel::Minimal, vec![component], Vec::new())
                    .with_fallback(FallbackStrategy::new(
                        FallbackKind::EmergencyMinimal,
                        "Pipeline failure",
                        e.tokens,
                    ))
            });
        (classification, window)
    }

    /// Substitute a caller-owned degradation controller (builder style).
    /// Useful for sharing one breaker across pipelines or tightening its
    /// settings in tests.
    pub fn with_breaker(mut self, breaker: DegradationController) -> Self {
        self.breaker = breaker;
        self
    }

    /// The degradation controller, for status checks and manual resets.
    pub fn breaker(&self) -> &DegradationController {
        &self.breaker
    }

    /// The usage tracker.
    pub fn tracker(&self) -> &UsageTracker {
        &self.tracker
    }
}

//! Configuration for the tokengate engine.
//!
//! Two halves live here:
//!
//! - [`EngineConfig`] — the tunable numeric constants: scoring weights,
//!   per-tier token ceilings, naive-baseline costs, breaker settings.
//! - [`RuleBook`] — the data-driven rule tables the classifier and
//!   assembler run on: canned-response patterns, vocabularies, transition
//!   phrase pools, fallback response texts.
//!
//! Both are serde structures with embedded defaults, loadable from a TOML
//! file so classification behavior can be tuned without code changes. The
//! formula weights (0.4/0.2/0.2/0.2, decay base 0.9 per 10 minutes) are
//! empirically chosen constants; they are preserved here as named,
//! overridable configuration rather than re-derived.

pub mod rules;

pub use rules::{
    CannedRule, DirectiveTable, FallbackResponse, FallbackTable, MarkerRule, RuleBook, SignalRule,
    TransitionTable,
};

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokengate_core::QueryKind;

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Relevance-scoring weights and selection parameters.
    #[serde(default)]
    pub weights: ScoringWeights,

    /// Classifier pass weights and decision gates.
    #[serde(default)]
    pub classifier: ClassifierTuning,

    /// Hard token ceilings per classification tier.
    #[serde(default)]
    pub ceilings: Ceilings,

    /// Naive send-everything baselines per tier (for savings reporting).
    #[serde(default)]
    pub baselines: Baselines,

    /// Degradation controller settings.
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Domain-guidance decoration settings.
    #[serde(default)]
    pub guidance: GuidanceConfig,

    /// The rule tables.
    #[serde(default)]
    pub rules: RuleBook,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            classifier: ClassifierTuning::default(),
            ceilings: Ceilings::default(),
            baselines: Baselines::default(),
            breaker: BreakerConfig::default(),
            guidance: GuidanceConfig::default(),
            rules: RuleBook::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate weights, ceilings and every rule-table pattern.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.weights;
        let sum = w.semantic + w.recency + w.engagement + w.technical;
        if !(0.99..=1.01).contains(&sum) {
            return Err(ConfigError::ValidationError(format!(
                "relevance weights must sum to 1.0, got {sum}"
            )));
        }
        if w.decay_base <= 0.0 || w.decay_base >= 1.0 {
            return Err(ConfigError::ValidationError(
                "decay_base must be in (0, 1)".into(),
            ));
        }
        if w.max_selected == 0 {
            return Err(ConfigError::ValidationError(
                "max_selected must be at least 1".into(),
            ));
        }
        if self.ceilings.simple == 0 || self.ceilings.medium == 0 || self.ceilings.complex == 0 {
            return Err(ConfigError::ValidationError(
                "token ceilings must be non-zero".into(),
            ));
        }
        if self.breaker.threshold == 0 {
            return Err(ConfigError::ValidationError(
                "breaker threshold must be at least 1".into(),
            ));
        }
        self.rules.validate()?;
        Ok(())
    }
}

/// Weights for the relevance formula and selection parameters.
///
/// `relevance = semantic·similarity + recency·decay + engagement·score +
/// technical·overlap`, each term in `[0, 1]`, final score capped at 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_semantic")]
    pub semantic: f64,
    #[serde(default = "default_fifth")]
    pub recency: f64,
    #[serde(default = "default_fifth")]
    pub engagement: f64,
    #[serde(default = "default_fifth")]
    pub technical: f64,

    /// Base of the exponential recency decay.
    #[serde(default = "default_decay_base")]
    pub decay_base: f64,
    /// Decay interval in minutes (one decay step per interval).
    #[serde(default = "default_decay_interval")]
    pub decay_interval_minutes: f64,

    /// Similarity boost per shared domain-vocabulary term.
    #[serde(default = "default_domain_boost")]
    pub domain_term_boost: f64,

    /// Engagement score base and per-signal increments.
    #[serde(default = "default_engagement_base")]
    pub engagement_base: f64,
    #[serde(default = "default_followup_bonus")]
    pub followup_bonus: f64,
    #[serde(default = "default_code_bonus")]
    pub code_bonus: f64,
    #[serde(default = "default_thanks_bonus")]
    pub thanks_bonus: f64,
    #[serde(default = "default_solution_bonus")]
    pub solution_bonus: f64,
    #[serde(default = "default_error_bonus")]
    pub error_bonus: f64,

    /// Minimum relevance score for selection.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Maximum messages selected.
    #[serde(default = "default_max_selected")]
    pub max_selected: usize,
    /// Messages taken by the pure-recency fallback selection.
    #[serde(default = "default_fallback_max")]
    pub fallback_max_selected: usize,
    /// Placeholder score assigned on the recency fallback path.
    #[serde(default = "default_engagement_base")]
    pub fallback_score: f64,
}

fn default_semantic() -> f64 {
    0.4
}
fn default_fifth() -> f64 {
    0.2
}
fn default_decay_base() -> f64 {
    0.9
}
fn default_decay_interval() -> f64 {
    10.0
}
fn default_domain_boost() -> f64 {
    0.1
}
fn default_engagement_base() -> f64 {
    0.5
}
fn default_followup_bonus() -> f64 {
    0.3
}
fn default_code_bonus() -> f64 {
    0.4
}
fn default_thanks_bonus() -> f64 {
    0.2
}
fn default_solution_bonus() -> f64 {
    0.5
}
fn default_error_bonus() -> f64 {
    0.3
}
fn default_threshold() -> f64 {
    0.3
}
fn default_max_selected() -> usize {
    5
}
fn default_fallback_max() -> usize {
    3
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            semantic: default_semantic(),
            recency: default_fifth(),
            engagement: default_fifth(),
            technical: default_fifth(),
            decay_base: default_decay_base(),
            decay_interval_minutes: default_decay_interval(),
            domain_term_boost: default_domain_boost(),
            engagement_base: default_engagement_base(),
            followup_bonus: default_followup_bonus(),
            code_bonus: default_code_bonus(),
            thanks_bonus: default_thanks_bonus(),
            solution_bonus: default_solution_bonus(),
            error_bonus: default_error_bonus(),
            threshold: default_threshold(),
            max_selected: default_max_selected(),
            fallback_max_selected: default_fallback_max(),
            fallback_score: default_engagement_base(),
        }
    }
}

/// Classifier pass weights and the classification decision gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierTuning {
    /// Deep-pass increment per matched action verb.
    #[serde(default = "default_verb_weight")]
    pub verb_weight: f64,
    /// Deep-pass increment per matched object noun.
    #[serde(default = "default_noun_weight")]
    pub noun_weight: f64,
    /// Proximity bonus starting value for adjacent verb-noun pairs.
    #[serde(default = "default_engagement_base")]
    pub proximity_base: f64,
    /// Proximity bonus lost per word of verb-noun distance.
    #[serde(default = "default_domain_boost")]
    pub proximity_decay: f64,
    /// Deep confidence above which the layer counts as technical.
    #[serde(default = "default_technical_gate")]
    pub technical_gate: f64,

    /// Contextual-pass increment per continuation word.
    #[serde(default = "default_noun_weight")]
    pub continuation_weight: f64,
    /// Contextual-pass increment per follow-up word.
    #[serde(default = "default_verb_weight")]
    pub followup_weight: f64,
    /// Contextual-pass boost when prior-turn history exists.
    #[serde(default = "default_noun_weight")]
    pub history_bonus: f64,

    /// Aggregate confidence weights: surface / deep / contextual.
    #[serde(default = "default_fifth")]
    pub surface_share: f64,
    #[serde(default = "default_deep_share")]
    pub deep_share: f64,
    #[serde(default = "default_fifth")]
    pub contextual_share: f64,

    /// Max signal escalation must exceed this for COMPLEX.
    #[serde(default = "default_escalation_gate")]
    pub escalation_gate: f64,
    /// Deep confidence must exceed this for COMPLEX.
    #[serde(default = "default_deep_gate")]
    pub deep_gate: f64,
    /// Deep confidence above this (or any signal) yields MEDIUM.
    #[serde(default = "default_engagement_base")]
    pub medium_gate: f64,
}

fn default_verb_weight() -> f64 {
    0.3
}
fn default_noun_weight() -> f64 {
    0.2
}
fn default_technical_gate() -> f64 {
    0.4
}
fn default_deep_share() -> f64 {
    0.6
}
fn default_escalation_gate() -> f64 {
    0.7
}
fn default_deep_gate() -> f64 {
    0.6
}

impl Default for ClassifierTuning {
    fn default() -> Self {
        Self {
            verb_weight: default_verb_weight(),
            noun_weight: default_noun_weight(),
            proximity_base: default_engagement_base(),
            proximity_decay: default_domain_boost(),
            technical_gate: default_technical_gate(),
            continuation_weight: default_noun_weight(),
            followup_weight: default_verb_weight(),
            history_bonus: default_noun_weight(),
            surface_share: default_fifth(),
            deep_share: default_deep_share(),
            contextual_share: default_fifth(),
            escalation_gate: default_escalation_gate(),
            deep_gate: default_deep_gate(),
            medium_gate: default_engagement_base(),
        }
    }
}

/// Hard token ceilings per classification tier. Non-negotiable upper
/// bounds, not targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ceilings {
    #[serde(default = "default_simple_ceiling")]
    pub simple: usize,
    #[serde(default = "default_medium_ceiling")]
    pub medium: usize,
    #[serde(default = "default_complex_ceiling")]
    pub complex: usize,
    #[serde(default = "default_complex_ceiling")]
    pub escalated: usize,
}

fn default_simple_ceiling() -> usize {
    50
}
fn default_medium_ceiling() -> usize {
    400
}
fn default_complex_ceiling() -> usize {
    1200
}

impl Default for Ceilings {
    fn default() -> Self {
        Self {
            simple: default_simple_ceiling(),
            medium: default_medium_ceiling(),
            complex: default_complex_ceiling(),
            escalated: default_complex_ceiling(),
        }
    }
}

impl Ceilings {
    /// The ceiling for a classification tier.
    pub fn for_kind(&self, kind: QueryKind) -> usize {
        match kind {
            QueryKind::Simple => self.simple,
            QueryKind::Medium => self.medium,
            QueryKind::Complex => self.complex,
            QueryKind::Escalated => self.escalated,
        }
    }
}

/// What the naive send-everything strategy would have cost per tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baselines {
    #[serde(default = "default_simple_baseline")]
    pub simple: usize,
    #[serde(default = "default_medium_baseline")]
    pub medium: usize,
    #[serde(default = "default_complex_baseline")]
    pub complex: usize,
    #[serde(default = "default_complex_baseline")]
    pub escalated: usize,
}

fn default_simple_baseline() -> usize {
    1500
}
fn default_medium_baseline() -> usize {
    1800
}
fn default_complex_baseline() -> usize {
    2500
}

impl Default for Baselines {
    fn default() -> Self {
        Self {
            simple: default_simple_baseline(),
            medium: default_medium_baseline(),
            complex: default_complex_baseline(),
            escalated: default_complex_baseline(),
        }
    }
}

impl Baselines {
    /// The baseline cost for a classification tier.
    pub fn for_kind(&self, kind: QueryKind) -> usize {
        match kind {
            QueryKind::Simple => self.simple,
            QueryKind::Medium => self.medium,
            QueryKind::Complex => self.complex,
            QueryKind::Escalated => self.escalated,
        }
    }
}

/// Degradation controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    #[serde(default = "default_breaker_threshold")]
    pub threshold: u32,
    /// Seconds after the last failure before an open breaker auto-resets.
    #[serde(default = "default_breaker_timeout")]
    pub timeout_secs: u64,
}

fn default_breaker_threshold() -> u32 {
    3
}
fn default_breaker_timeout() -> u64 {
    300
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: default_breaker_threshold(),
            timeout_secs: default_breaker_timeout(),
        }
    }
}

/// Domain-guidance decoration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidanceConfig {
    /// Whether the guidance decorator is active.
    #[serde(default)]
    pub enabled: bool,
    /// Maximum tokens a guidance block may add.
    #[serde(default = "default_guidance_budget")]
    pub token_budget: usize,
}

fn default_guidance_budget() -> usize {
    150
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token_budget: default_guidance_budget(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: String, reason: String },

    #[error("Failed to parse config: {reason}")]
    ParseError { reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid pattern in rule '{rule}': {reason}")]
    InvalidPattern { rule: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ceilings.simple, 50);
        assert_eq!(config.ceilings.medium, 400);
        assert_eq!(config.ceilings.complex, 1200);
        assert_eq!(config.ceilings.escalated, 1200);
        assert_eq!(config.baselines.simple, 1500);
        assert_eq!(config.breaker.threshold, 3);
        assert_eq!(config.breaker.timeout_secs, 300);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = EngineConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.weights.semantic, config.weights.semantic);
        assert_eq!(parsed.ceilings.complex, config.ceilings.complex);
        assert_eq!(parsed.rules.canned.len(), config.rules.canned.len());
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut config = EngineConfig::default();
        config.weights.semantic = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn decay_base_endpoints_rejected() {
        let mut config = EngineConfig::default();
        config.weights.decay_base = 0.0;
        assert!(config.validate().is_err());
        config.weights.decay_base = 1.0;
        assert!(config.validate().is_err());
        config.weights.decay_base = 0.9;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_ceiling_rejected() {
        let mut config = EngineConfig::default();
        config.ceilings.simple = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_pattern_rejected() {
        let mut config = EngineConfig::default();
        config.rules.canned[0].pattern = "((".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_returns_defaults() {
        let config = EngineConfig::load_from(Path::new("/nonexistent/tokengate.toml")).unwrap();
        assert_eq!(config.ceilings.simple, 50);
    }

    #[test]
    fn load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ceilings]\nmedium = 500").unwrap();
        let config = EngineConfig::load_from(file.path()).unwrap();
        assert_eq!(config.ceilings.medium, 500);
        // Untouched sections keep defaults
        assert_eq!(config.ceilings.simple, 50);
        assert_eq!(config.weights.threshold, 0.3);
    }

    #[test]
    fn kind_lookup() {
        let c = Ceilings::default();
        assert_eq!(c.for_kind(QueryKind::Simple), 50);
        assert_eq!(c.for_kind(QueryKind::Escalated), 1200);
        let b = Baselines::default();
        assert_eq!(b.for_kind(QueryKind::Complex), 2500);
        assert_eq!(b.for_kind(QueryKind::Escalated), 2500);
    }
}

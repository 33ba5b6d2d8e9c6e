//! History relevance scoring and selection.
//!
//! The [`RelevanceScorer`] ranks prior turns against the current query and
//! picks the few worth carrying forward. The score is a weighted blend of
//! four components, each in `[0, 1]`:
//!
//! ```text
//! relevance = 0.4·semantic + 0.2·recency + 0.2·engagement + 0.2·technical
//! ```
//!
//! Recency decays relative to the query's arrival timestamp, not wall-clock
//! time, so scoring is a pure function of its inputs. If scoring fails the
//! caller falls back to [`RelevanceScorer::recency_fallback`], which just
//! takes the most recent turns.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokengate_config::{EngineConfig, ScoringWeights};
use tokengate_core::{estimate_message_tokens, HistoricalMessage, Query, RelevanceError};

/// Per-component breakdown of a message's relevance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RelevanceScore {
    /// Term overlap with the query, boosted for shared domain vocabulary.
    pub semantic: f64,
    /// Exponential age decay relative to the query's arrival.
    pub recency: f64,
    /// How much the user engaged with the message.
    pub engagement: f64,
    /// Jaccard overlap of domain-vocabulary terms.
    pub technical_overlap: f64,
    /// The weighted blend, capped at 1.0.
    pub total: f64,
}

/// A history message paired with its score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMessage {
    pub message: HistoricalMessage,
    pub score: RelevanceScore,
}

/// The outcome of a selection pass over the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    /// Messages above threshold, best first, at most `max_selected`.
    pub selected: Vec<ScoredMessage>,
    /// How many history messages were considered.
    pub total_considered: usize,
    /// Which path produced the selection.
    pub strategy: String,
    /// Token estimate for the selected content.
    pub estimated_tokens: usize,
    /// The threshold applied.
    pub threshold: f64,
    /// Whether the recency fallback produced this selection.
    pub fallback_used: bool,
}

/// Scores history messages against the current query.
pub struct RelevanceScorer {
    weights: ScoringWeights,
    domain_terms: HashSet<String>,
    stop_words: HashSet<String>,
}

impl RelevanceScorer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            domain_terms: config.rules.domain_terms.iter().cloned().collect(),
            stop_words: config.rules.stop_words.iter().cloned().collect(),
        }
    }

    /// Score one message against the query.
    pub fn score(&self, query: &Query, message: &HistoricalMessage) -> RelevanceScore {
        let query_terms = self.extract_terms(&query.text);
        let message_terms = self.extract_terms(&message.content);

        let semantic = self.semantic_similarity(&query_terms, &message_terms);
        let recency = self.recency_factor(query, message);
        let engagement = self.engagement_score(message);
        let technical_overlap = self.technical_overlap(&query_terms, &message_terms);

        let w = &self.weights;
        let total = (semantic * w.semantic
            + recency * w.recency
            + engagement * w.engagement
            + technical_overlap * w.technical)
            .min(1.0);

        RelevanceScore {
            semantic,
            recency,
            engagement,
            technical_overlap,
            total,
        }
    }

    /// Rank the history and select the messages worth keeping.
    ///
    /// Ties on score break toward the more recent message; full ties keep
    /// history order.
    pub fn select(
        &self,
        query: &Query,
        history: &[HistoricalMessage],
    ) -> Result<Selection, RelevanceError> {
        let total_considered = history.len();

        let mut scored: Vec<ScoredMessage> = history
            .iter()
            .map(|m| ScoredMessage {
                message: m.clone(),
                score: self.score(query, m),
            })
            .filter(|s| s.score.total >= self.weights.threshold)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total
                .partial_cmp(&a.score.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.message.timestamp.cmp(&a.message.timestamp))
        });
        scored.truncate(self.weights.max_selected);

        let estimated_tokens = scored
            .iter()
            .map(|s| estimate_message_tokens(&s.message))
            .sum();

        tracing::debug!(
            selected = scored.len(),
            considered = total_considered,
            tokens = estimated_tokens,
            "History selection complete"
        );

        Ok(Selection {
            selected: scored,
            total_considered,
            strategy: "relevance_ranking".into(),
            estimated_tokens,
            threshold: self.weights.threshold,
            fallback_used: false,
        })
    }

    /// Degraded selection: the most recent turns, no scoring. Used when the
    /// scoring path fails; every message carries a placeholder score.
    pub fn recency_fallback(&self, history: &[HistoricalMessage]) -> Selection {
        let mut recent: Vec<&HistoricalMessage> = history.iter().collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(self.weights.fallback_max_selected);

        let placeholder = self.weights.fallback_score;
        let selected: Vec<ScoredMessage> = recent
            .into_iter()
            .map(|m| ScoredMessage {
                message: m.clone(),
                score: RelevanceScore {
                    semantic: 0.0,
                    recency: 0.0,
                    engagement: 0.0,
                    technical_overlap: 0.0,
                    total: placeholder,
                },
            })
            .collect();

        let estimated_tokens = selected
            .iter()
            .map(|s| estimate_message_tokens(&s.message))
            .sum();

        tracing::warn!(
            selected = selected.len(),
            "Relevance scoring unavailable, using recency fallback"
        );

        Selection {
            selected,
            total_considered: history.len(),
            strategy: "recency_fallback".into(),
            estimated_tokens,
            threshold: self.weights.threshold,
            fallback_used: true,
        }
    }

    /// Lowercased terms longer than two characters, stop words removed.
    fn extract_terms(&self, text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 2 && !self.stop_words.contains(*t))
            .map(String::from)
            .collect()
    }

    /// Term-set overlap normalized by the larger set, plus a fixed boost
    /// per shared domain term. Capped at 1.0.
    fn semantic_similarity(&self, query: &HashSet<String>, message: &HashSet<String>) -> f64 {
        if query.is_empty() || message.is_empty() {
            return 0.0;
        }
        let intersection: Vec<&String> = query.intersection(message).collect();
        let max_len = query.len().max(message.len()) as f64;
        let mut similarity = intersection.len() as f64 / max_len;

        let domain_matches = intersection
            .iter()
            .filter(|t| self.domain_terms.contains(t.as_str()))
            .count();
        similarity += domain_matches as f64 * self.weights.domain_term_boost;

        similarity.min(1.0)
    }

    /// Exponential decay by age: one decay step per interval, relative to
    /// the query's arrival. Messages from the future clamp to 1.0.
    fn recency_factor(&self, query: &Query, message: &HistoricalMessage) -> f64 {
        let age = query
            .received_at
            .signed_duration_since(message.timestamp)
            .num_seconds()
            .max(0) as f64
            / 60.0;
        self.weights
            .decay_base
            .powf(age / self.weights.decay_interval_minutes)
    }

    /// Base engagement plus per-signal increments, capped at 1.0.
    fn engagement_score(&self, message: &HistoricalMessage) -> f64 {
        let e = &message.engagement;
        let w = &self.weights;
        let mut score = w.engagement_base;
        if e.followed_up() {
            score += w.followup_bonus;
        }
        if e.contained_code {
            score += w.code_bonus;
        }
        if e.thanked {
            score += w.thanks_bonus;
        }
        if e.led_to_solution {
            score += w.solution_bonus;
        }
        if e.error_context {
            score += w.error_bonus;
        }
        score.min(1.0)
    }

    /// Jaccard overlap of the domain-vocabulary terms on each side.
    fn technical_overlap(&self, query: &HashSet<String>, message: &HashSet<String>) -> f64 {
        let query_tech: HashSet<&String> =
            query.iter().filter(|t| self.domain_terms.contains(*t)).collect();
        let message_tech: HashSet<&String> = message
            .iter()
            .filter(|t| self.domain_terms.contains(*t))
            .collect();

        if query_tech.is_empty() && message_tech.is_empty() {
            return 0.0;
        }
        let intersection = query_tech.intersection(&message_tech).count() as f64;
        let union = query_tech.union(&message_tech).count() as f64;
        intersection / union
    }
}

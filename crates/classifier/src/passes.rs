//! The three intent passes and complexity signal detection.
//!
//! Each pass reads the raw query text and produces an [`IntentLayer`]. The
//! passes are independent; the classifier weighs them afterwards. Verb and
//! noun matching is per-word substring containment, so "debugging" matches
//! the verb "debug" and "error:" matches the noun "error".

use tokengate_config::{ClassifierTuning, RuleBook};
use tokengate_core::{ComplexitySignal, IntentCategory, IntentLayer};

use crate::compiled::CompiledRules;

/// Surface pass: social wrappers and politeness markers.
pub fn surface_pass(query: &str, rules: &CompiledRules) -> IntentLayer {
    let mut indicators = Vec::new();
    let mut confidence = 0.0;

    for marker in &rules.markers {
        if marker.regex.is_match(query) {
            indicators.push(marker.label.clone());
            confidence += marker.weight;
        }
    }

    let category = if indicators.is_empty() {
        IntentCategory::Technical
    } else {
        IntentCategory::Social
    };
    IntentLayer::new(category, confidence, indicators)
}

/// Deep pass: technical verbs, object nouns and their proximity.
pub fn deep_pass(query: &str, book: &RuleBook, tuning: &ClassifierTuning) -> IntentLayer {
    let lower = query.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let mut found_verbs = Vec::new();
    let mut found_nouns = Vec::new();
    for word in &words {
        if book.verbs.iter().any(|v| word.contains(v.as_str())) {
            found_verbs.push(word.to_string());
        }
        if book.nouns.iter().any(|n| word.contains(n.as_str())) {
            found_nouns.push(word.to_string());
        }
    }

    let proximity = proximity_score(&words, &found_verbs, &found_nouns, tuning);
    let confidence = found_verbs.len() as f64 * tuning.verb_weight
        + found_nouns.len() as f64 * tuning.noun_weight
        + proximity;

    let category = if confidence > tuning.technical_gate {
        IntentCategory::Technical
    } else {
        IntentCategory::Social
    };

    let mut indicators = found_verbs.clone();
    indicators.extend(found_nouns.iter().cloned());

    let mut layer = IntentLayer::new(category, confidence, indicators);
    layer.primary_action = found_verbs.into_iter().next();
    layer.primary_object = found_nouns.into_iter().next();
    layer
}

/// Best proximity bonus over all verb-noun pairs. Adjacency scores highest;
/// the bonus decays per word of distance and floors at zero.
fn proximity_score(
    words: &[&str],
    verbs: &[String],
    nouns: &[String],
    tuning: &ClassifierTuning,
) -> f64 {
    if verbs.is_empty() || nouns.is_empty() {
        return 0.0;
    }

    let mut best: f64 = 0.0;
    for verb in verbs {
        for noun in nouns {
            let verb_idx = words.iter().position(|w| w.contains(verb.as_str()));
            let noun_idx = words.iter().position(|w| w.contains(noun.as_str()));
            if let (Some(v), Some(n)) = (verb_idx, noun_idx) {
                let distance = v.abs_diff(n) as f64;
                let score = (tuning.proximity_base - distance * tuning.proximity_decay).max(0.0);
                best = best.max(score);
            }
        }
    }
    best
}

/// Contextual pass: continuation and follow-up words, plus a boost when
/// prior-turn history exists.
pub fn contextual_pass(
    query: &str,
    has_history: bool,
    book: &RuleBook,
    tuning: &ClassifierTuning,
) -> IntentLayer {
    let lower = query.to_lowercase();
    let mut indicators = Vec::new();
    let mut confidence = 0.0;

    for word in lower.split_whitespace() {
        if book.continuation_words.iter().any(|w| w == word) {
            indicators.push(format!("continuation:{word}"));
            confidence += tuning.continuation_weight;
        }
        if book.followup_words.iter().any(|w| w == word) {
            indicators.push(format!("followup:{word}"));
            confidence += tuning.followup_weight;
        }
    }

    if has_history {
        confidence += tuning.history_bonus;
        indicators.push("has_history".into());
    }

    let category = if indicators.is_empty() {
        IntentCategory::Social
    } else {
        IntentCategory::Continuation
    };
    IntentLayer::new(category, confidence, indicators)
}

/// Detect complexity escalation signals. Each rule fires at most once, on
/// its first matching pattern.
pub fn detect_signals(query: &str, rules: &CompiledRules) -> Vec<ComplexitySignal> {
    let mut signals = Vec::new();
    for rule in &rules.signals {
        for (regex, source) in &rule.patterns {
            if regex.is_match(query) {
                signals.push(ComplexitySignal {
                    category: rule.category,
                    indicators: vec![source.clone()],
                    escalation: rule.escalation,
                });
                break;
            }
        }
    }
    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokengate_core::SignalCategory;

    fn fixtures() -> (RuleBook, CompiledRules, ClassifierTuning) {
        let book = RuleBook::default();
        let compiled = CompiledRules::compile(&book).unwrap();
        (book, compiled, ClassifierTuning::default())
    }

    #[test]
    fn surface_detects_greeting_and_help() {
        let (_, compiled, _) = fixtures();
        let layer = surface_pass("hi, can you help me", &compiled);
        assert_eq!(layer.category, IntentCategory::Social);
        assert!(layer.indicators.contains(&"greeting".to_string()));
        assert!(layer.indicators.contains(&"help_request".to_string()));
        assert!((layer.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn surface_without_markers_is_technical() {
        let (_, compiled, _) = fixtures();
        let layer = surface_pass("refactor the database layer", &compiled);
        assert_eq!(layer.category, IntentCategory::Technical);
        assert_eq!(layer.confidence, 0.0);
    }

    #[test]
    fn deep_scores_verb_noun_pair_with_proximity() {
        let (book, _, tuning) = fixtures();
        // "fix"(3) and "function?"(5): 0.3 + 0.2 + proximity 0.3
        let layer = deep_pass("How do I fix this function?", &book, &tuning);
        assert_eq!(layer.category, IntentCategory::Technical);
        assert!((layer.confidence - 0.8).abs() < 1e-9);
        assert_eq!(layer.primary_action.as_deref(), Some("fix"));
        assert_eq!(layer.primary_object.as_deref(), Some("function?"));
    }

    #[test]
    fn deep_substring_matches_inflected_forms() {
        let (book, _, tuning) = fixtures();
        let layer = deep_pass("deploying the service", &book, &tuning);
        assert_eq!(layer.primary_action.as_deref(), Some("deploying"));
        assert_eq!(layer.primary_object.as_deref(), Some("service"));
    }

    #[test]
    fn deep_without_terms_is_social() {
        let (book, _, tuning) = fixtures();
        let layer = deep_pass("hello there", &book, &tuning);
        assert_eq!(layer.category, IntentCategory::Social);
        assert_eq!(layer.confidence, 0.0);
        assert!(layer.primary_action.is_none());
    }

    #[test]
    fn contextual_counts_words_and_history() {
        let (book, _, tuning) = fixtures();
        // "but"(0.3) + "it"(0.2) + history(0.2)
        let layer = contextual_pass("but it broke again", true, &book, &tuning);
        assert_eq!(layer.category, IntentCategory::Continuation);
        assert!((layer.confidence - 0.7).abs() < 1e-9);
        assert!(layer.indicators.contains(&"has_history".to_string()));
    }

    #[test]
    fn signal_fires_once_per_category() {
        let (_, compiled, _) = fixtures();
        // Matches both the first and third error pattern; one signal only.
        let signals = detect_signals("error: got a 404 network error", &compiled);
        let errors: Vec<_> = signals
            .iter()
            .filter(|s| s.category == SignalCategory::ErrorDebugging)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!((errors[0].escalation - 0.75).abs() < 1e-9);
    }

    #[test]
    fn architecture_and_multifile_can_coexist() {
        let (_, compiled, _) = fixtures();
        let signals = detect_signals(
            "redesign the architecture across multiple files",
            &compiled,
        );
        assert_eq!(signals.len(), 2);
    }
}

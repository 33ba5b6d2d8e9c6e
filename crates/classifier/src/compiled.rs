//! Rule tables compiled into matchable form.
//!
//! The config crate validates patterns; this module compiles them once at
//! classifier construction so the per-query hot path never touches the
//! regex parser. All patterns match case-insensitively.

use regex_lite::Regex;
use tokengate_config::{CannedRule, MarkerRule, RuleBook, SignalRule};
use tokengate_core::{ClassifyError, QueryKind, SignalCategory};

/// A canned rule with its pattern compiled.
#[derive(Debug)]
pub struct CompiledCanned {
    pub name: String,
    pub regex: Regex,
    pub kind: QueryKind,
    pub tokens: usize,
    pub response: String,
}

/// A surface marker with its pattern compiled.
#[derive(Debug)]
pub struct CompiledMarker {
    pub label: String,
    pub regex: Regex,
    pub weight: f64,
}

/// A complexity signal rule with all patterns compiled. The source strings
/// are kept alongside for indicator reporting.
#[derive(Debug)]
pub struct CompiledSignal {
    pub category: SignalCategory,
    pub patterns: Vec<(Regex, String)>,
    pub escalation: f64,
}

/// All compiled rule tables.
#[derive(Debug)]
pub struct CompiledRules {
    pub canned: Vec<CompiledCanned>,
    pub markers: Vec<CompiledMarker>,
    pub signals: Vec<CompiledSignal>,
}

impl CompiledRules {
    /// Compile every pattern in a rule book.
    pub fn compile(book: &RuleBook) -> Result<Self, ClassifyError> {
        let canned = book
            .canned
            .iter()
            .map(compile_canned)
            .collect::<Result<Vec<_>, _>>()?;
        let markers = book
            .surface_markers
            .iter()
            .map(compile_marker)
            .collect::<Result<Vec<_>, _>>()?;
        let signals = book
            .signals
            .iter()
            .map(compile_signal)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            canned,
            markers,
            signals,
        })
    }
}

fn compile(name: &str, pattern: &str) -> Result<Regex, ClassifyError> {
    Regex::new(&format!("(?i){pattern}"))
        .map_err(|e| ClassifyError::InvalidRuleTable(format!("pattern '{name}': {e}")))
}

fn compile_canned(rule: &CannedRule) -> Result<CompiledCanned, ClassifyError> {
    Ok(CompiledCanned {
        name: rule.name.clone(),
        regex: compile(&rule.name, &rule.pattern)?,
        kind: rule.kind,
        tokens: rule.tokens,
        response: rule.response.clone(),
    })
}

fn compile_marker(rule: &MarkerRule) -> Result<CompiledMarker, ClassifyError> {
    Ok(CompiledMarker {
        label: rule.label.clone(),
        regex: compile(&rule.label, &rule.pattern)?,
        weight: rule.weight,
    })
}

fn compile_signal(rule: &SignalRule) -> Result<CompiledSignal, ClassifyError> {
    let patterns = rule
        .patterns
        .iter()
        .map(|p| Ok((compile(&rule.category.to_string(), p)?, p.clone())))
        .collect::<Result<Vec<_>, ClassifyError>>()?;
    Ok(CompiledSignal {
        category: rule.category,
        patterns,
        escalation: rule.escalation,
    })
}

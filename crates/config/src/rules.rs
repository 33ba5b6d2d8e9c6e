//! The declarative rule tables the engine runs on.
//!
//! Everything pattern-shaped lives here: canned-response rules, surface
//! marker patterns, the verb/noun/architecture vocabularies, complexity
//! signal patterns, transition phrase pools, per-level system directives
//! and the degraded-path response bodies. Patterns are regex strings,
//! validated up front with `regex-lite` and compiled case-insensitively by
//! the classifier.

use serde::{Deserialize, Serialize};
use tokengate_core::{QueryKind, SignalCategory};

use crate::ConfigError;

/// All rule tables, with embedded defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleBook {
    /// Canned fast-path rules, checked in order against normalized queries.
    #[serde(default = "default_canned")]
    pub canned: Vec<CannedRule>,

    /// Surface-pass social marker patterns.
    #[serde(default = "default_surface_markers")]
    pub surface_markers: Vec<MarkerRule>,

    /// Action verbs for the deep pass (substring matched per word).
    #[serde(default = "default_verbs")]
    pub verbs: Vec<String>,

    /// Object nouns for the deep pass (substring matched per word).
    #[serde(default = "default_nouns")]
    pub nouns: Vec<String>,

    /// Complexity signal rules. Each rule fires at most once per query.
    #[serde(default = "default_signals")]
    pub signals: Vec<SignalRule>,

    /// Continuation words for the contextual pass.
    #[serde(default = "default_continuation_words")]
    pub continuation_words: Vec<String>,

    /// Follow-up words for the contextual pass.
    #[serde(default = "default_followup_words")]
    pub followup_words: Vec<String>,

    /// Words ignored during term extraction.
    #[serde(default = "default_stop_words")]
    pub stop_words: Vec<String>,

    /// Domain vocabulary for similarity boosts and technical overlap.
    #[serde(default = "default_domain_terms")]
    pub domain_terms: Vec<String>,

    /// Transition phrase pools for level changes between turns.
    #[serde(default)]
    pub transitions: TransitionTable,

    /// Per-level system directive texts.
    #[serde(default)]
    pub directives: DirectiveTable,

    /// Degraded-path response bodies.
    #[serde(default)]
    pub fallbacks: FallbackTable,
}

impl Default for RuleBook {
    fn default() -> Self {
        Self {
            canned: default_canned(),
            surface_markers: default_surface_markers(),
            verbs: default_verbs(),
            nouns: default_nouns(),
            signals: default_signals(),
            continuation_words: default_continuation_words(),
            followup_words: default_followup_words(),
            stop_words: default_stop_words(),
            domain_terms: default_domain_terms(),
            transitions: TransitionTable::default(),
            directives: DirectiveTable::default(),
            fallbacks: FallbackTable::default(),
        }
    }
}

impl RuleBook {
    /// Compile-check every regex pattern in the book.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in &self.canned {
            check_pattern(&rule.name, &rule.pattern)?;
        }
        for marker in &self.surface_markers {
            check_pattern(&marker.label, &marker.pattern)?;
        }
        for signal in &self.signals {
            for pattern in &signal.patterns {
                check_pattern(&format!("{:?}", signal.category), pattern)?;
            }
        }
        Ok(())
    }
}

fn check_pattern(rule: &str, pattern: &str) -> Result<(), ConfigError> {
    regex_lite::Regex::new(&format!("(?i){pattern}")).map_err(|e| ConfigError::InvalidPattern {
        rule: rule.to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// A canned fast-path rule: pattern, tier, fixed token cost, response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CannedRule {
    pub name: String,
    pub pattern: String,
    pub kind: QueryKind,
    pub tokens: usize,
    pub response: String,
}

/// A surface-pass social marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerRule {
    pub label: String,
    pub pattern: String,
    /// Confidence added when the pattern matches.
    pub weight: f64,
}

/// A complexity signal rule: if any pattern matches, the signal fires once
/// with the given escalation level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRule {
    pub category: SignalCategory,
    pub patterns: Vec<String>,
    pub escalation: f64,
}

/// Phrase pools for cosmetic transitions between context levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionTable {
    #[serde(default = "default_minimal_to_technical")]
    pub minimal_to_technical: Vec<String>,
    #[serde(default = "default_technical_to_comprehensive")]
    pub technical_to_comprehensive: Vec<String>,
    #[serde(default = "default_context_expansion")]
    pub context_expansion: Vec<String>,
    #[serde(default = "default_topic_pivot")]
    pub topic_pivot: Vec<String>,
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self {
            minimal_to_technical: default_minimal_to_technical(),
            technical_to_comprehensive: default_technical_to_comprehensive(),
            context_expansion: default_context_expansion(),
            topic_pivot: default_topic_pivot(),
        }
    }
}

/// Per-level system directive texts. The base directive is shared; each
/// level appends its own framing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveTable {
    #[serde(default = "default_base_directive")]
    pub base: String,
    #[serde(default = "default_minimal_directive")]
    pub minimal: String,
    #[serde(default = "default_technical_directive")]
    pub technical: String,
    #[serde(default = "default_comprehensive_directive")]
    pub comprehensive: String,
}

impl Default for DirectiveTable {
    fn default() -> Self {
        Self {
            base: default_base_directive(),
            minimal: default_minimal_directive(),
            technical: default_technical_directive(),
            comprehensive: default_comprehensive_directive(),
        }
    }
}

/// A degraded-path response body with its fixed token estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackResponse {
    pub tokens: usize,
    pub body: String,
}

/// An emergency body keyed to query vocabulary. The first rule with a
/// trigger word appearing in the query wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyRule {
    pub name: String,
    pub triggers: Vec<String>,
    pub response: FallbackResponse,
}

/// Response bodies for each degraded path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackTable {
    /// Generic emergency body, used when no [`EmergencyRule`] matches.
    #[serde(default = "default_emergency")]
    pub emergency: FallbackResponse,
    #[serde(default = "default_breaker_open")]
    pub breaker_open: FallbackResponse,
    /// Query-keyed emergency bodies, checked in order.
    #[serde(default = "default_emergency_rules")]
    pub emergency_rules: Vec<EmergencyRule>,
}

impl FallbackTable {
    /// Pick the emergency body best matched to the query's vocabulary.
    pub fn emergency_for(&self, text: &str) -> &FallbackResponse {
        let lower = text.to_lowercase();
        self.emergency_rules
            .iter()
            .find(|rule| rule.triggers.iter().any(|t| lower.contains(t.as_str())))
            .map(|rule| &rule.response)
            .unwrap_or(&self.emergency)
    }
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self {
            emergency: default_emergency(),
            breaker_open: default_breaker_open(),
            emergency_rules: default_emergency_rules(),
        }
    }
}

// ── Default tables ──

fn default_canned() -> Vec<CannedRule> {
    vec![
        CannedRule {
            name: "pure_greeting".into(),
            pattern: r"^(hi|hello|hey|sup|what's up)[\s.!]*$".into(),
            kind: QueryKind::Simple,
            tokens: 60,
            response: "Hi! I'm your coding assistant. I can help you:\n\n\
                       - Build apps and websites from scratch\n\
                       - Debug and fix code issues\n\
                       - Add features to existing projects\n\
                       - Explain how things work\n\n\
                       What are you working on today?"
                .into(),
        },
        CannedRule {
            name: "gratitude".into(),
            pattern: r"^(thanks?|thank you|thx|appreciated?)[\s.!]*$".into(),
            kind: QueryKind::Simple,
            tokens: 25,
            response: "You're welcome! Happy to help. Let me know if you need anything else!"
                .into(),
        },
        CannedRule {
            name: "status_check".into(),
            pattern: r"^(how are you|how's it going|status|working\?)[\s.!]*$".into(),
            kind: QueryKind::Simple,
            tokens: 30,
            response: "All systems running smoothly! Ready to help with your coding projects. \
                       What can I build for you?"
                .into(),
        },
        CannedRule {
            name: "vague_help".into(),
            pattern: r"^(help|can you help|need help|assist)[\s.!]*$".into(),
            kind: QueryKind::Simple,
            tokens: 80,
            response: "Absolutely! I'm here to help with web development. I specialize in:\n\n\
                       - Building: apps, websites, components from scratch\n\
                       - Debugging: fixing errors and code issues\n\
                       - Enhancing: adding features to existing projects\n\
                       - Explaining: how code and technologies work\n\n\
                       What's your current project or challenge?"
                .into(),
        },
        CannedRule {
            name: "general_creation".into(),
            pattern: r"^(create|build|make).*(app|website|component|page)$".into(),
            kind: QueryKind::Medium,
            tokens: 95,
            response: "I'd love to help you build that! To create exactly what you need:\n\n\
                       1. What type of app or site? (e.g. todo app, portfolio site, dashboard)\n\
                       2. Key features you want? (user login, database, etc.)\n\
                       3. Tech preferences? (React, vanilla JS, specific styling)\n\n\
                       This way I can build something that fits your needs!"
                .into(),
        },
        CannedRule {
            name: "debug_with_error".into(),
            pattern: r"^(hi|hey|hello).*(debug|fix|error|help).*(error|undefined|null|failed|exception)"
                .into(),
            kind: QueryKind::Medium,
            tokens: 85,
            response: "I can help debug that error! To give you the best solution:\n\n\
                       1. Paste the complete error message (including line numbers)\n\
                       2. Share the relevant code where the error occurs\n\
                       3. Tell me what you expected vs what's happening\n\n\
                       This helps me pinpoint the exact issue quickly!"
                .into(),
        },
    ]
}

fn default_surface_markers() -> Vec<MarkerRule> {
    vec![
        MarkerRule {
            label: "greeting".into(),
            pattern: r"^(hi|hello|hey|sup|what's up)".into(),
            weight: 0.3,
        },
        MarkerRule {
            label: "politeness".into(),
            pattern: r"(please|thank|thanks|thx)".into(),
            weight: 0.3,
        },
        MarkerRule {
            label: "help_request".into(),
            pattern: r"(help|assist|support)".into(),
            weight: 0.3,
        },
        MarkerRule {
            label: "acknowledgment".into(),
            pattern: r"^(ok|okay|cool|got it|sounds good)".into(),
            weight: 0.3,
        },
    ]
}

fn default_verbs() -> Vec<String> {
    [
        "debug", "fix", "optimize", "refactor", "implement", "create", "deploy", "test", "build",
        "setup", "configure", "install", "update", "add", "remove",
    ]
    .map(String::from)
    .to_vec()
}

fn default_nouns() -> Vec<String> {
    [
        "component",
        "function",
        "api",
        "database",
        "error",
        "bug",
        "endpoint",
        "state",
        "props",
        "hook",
        "service",
        "module",
        "class",
        "interface",
        "variable",
        "array",
        "object",
        "response",
        "request",
        "server",
        "client",
    ]
    .map(String::from)
    .to_vec()
}

fn default_signals() -> Vec<SignalRule> {
    vec![
        // Escalation sits above the COMPLEX gate (0.7) so error queries
        // with strong technical intent reach the comprehensive tier.
        SignalRule {
            category: SignalCategory::ErrorDebugging,
            patterns: vec![
                r"error|exception|failed|broken|not working|undefined|null".into(),
                r"stack trace|line \d+|syntax error|reference error".into(),
                r"500|404|401|403|cors|network error".into(),
            ],
            escalation: 0.75,
        },
        SignalRule {
            category: SignalCategory::MultiFile,
            patterns: vec![r"multiple files|several files|project|app|application".into()],
            escalation: 0.6,
        },
        SignalRule {
            category: SignalCategory::Architecture,
            patterns: vec![
                r"architecture|design pattern|scalability|performance|security".into(),
                r"authentication|authorization|optimization|refactoring|testing".into(),
                r"deployment|docker|kubernetes|microservices|database design".into(),
            ],
            escalation: 0.8,
        },
    ]
}

fn default_continuation_words() -> Vec<String> {
    ["this", "that", "it", "also", "and", "plus", "additionally"]
        .map(String::from)
        .to_vec()
}

fn default_followup_words() -> Vec<String> {
    ["but", "however", "actually", "wait", "also"]
        .map(String::from)
        .to_vec()
}

fn default_stop_words() -> Vec<String> {
    [
        "the", "is", "at", "which", "on", "and", "a", "to", "are", "as", "was", "will", "be",
        "have", "has", "had", "do", "does", "did", "can", "could", "would", "should", "may",
        "might", "must", "shall",
    ]
    .map(String::from)
    .to_vec()
}

fn default_domain_terms() -> Vec<String> {
    [
        "react",
        "vue",
        "angular",
        "svelte",
        "typescript",
        "javascript",
        "node",
        "express",
        "api",
        "rest",
        "graphql",
        "database",
        "sql",
        "mongodb",
        "postgres",
        "mysql",
        "component",
        "function",
        "hook",
        "state",
        "props",
        "context",
        "reducer",
        "error",
        "bug",
        "debug",
        "test",
        "testing",
        "unit",
        "integration",
        "deploy",
        "build",
        "webpack",
        "vite",
        "babel",
        "eslint",
        "prettier",
        "css",
        "scss",
        "tailwind",
        "styled",
        "bootstrap",
        "flexbox",
        "grid",
        "async",
        "await",
        "promise",
        "callback",
        "event",
        "listener",
        "handler",
        "dom",
        "html",
        "element",
        "selector",
        "query",
        "fetch",
        "axios",
        "server",
        "client",
        "frontend",
        "backend",
        "fullstack",
        "spa",
        "ssr",
    ]
    .map(String::from)
    .to_vec()
}

fn default_minimal_to_technical() -> Vec<String> {
    [
        "Looking at this more closely,",
        "Given the specifics here,",
        "For this particular case,",
        "Based on what you're describing,",
    ]
    .map(String::from)
    .to_vec()
}

fn default_technical_to_comprehensive() -> Vec<String> {
    [
        "This actually touches on several things -",
        "There are a few layers to this:",
        "This connects to what we were working on before -",
        "This involves a few different pieces:",
    ]
    .map(String::from)
    .to_vec()
}

fn default_context_expansion() -> Vec<String> {
    [
        "Ah, I see what you're working with -",
        "Given your setup,",
        "Looking at your project structure,",
        "Based on your codebase,",
    ]
    .map(String::from)
    .to_vec()
}

fn default_topic_pivot() -> Vec<String> {
    [
        "That's a different approach -",
        "Switching gears to that,",
        "For that particular challenge,",
        "Moving to that topic,",
    ]
    .map(String::from)
    .to_vec()
}

fn default_base_directive() -> String {
    "You are an intelligent web development assistant.".into()
}

fn default_minimal_directive() -> String {
    "Provide helpful, concise responses. If you need more context to help properly, \
     ask the user for clarification."
        .into()
}

fn default_technical_directive() -> String {
    "You're helping with a technical web development task. Provide accurate, practical \
     solutions with code examples when helpful."
        .into()
}

fn default_comprehensive_directive() -> String {
    "You're working on a complex development challenge. Consider architectural \
     implications, best practices, and provide thorough guidance with detailed examples."
        .into()
}

fn default_emergency() -> FallbackResponse {
    FallbackResponse {
        tokens: 50,
        body: "I hit a snag analyzing that request. Could you rephrase it, or tell me a bit \
               more about what you're trying to do?"
            .into(),
    }
}

fn default_breaker_open() -> FallbackResponse {
    FallbackResponse {
        tokens: 40,
        body: "I'm running in reduced mode right now. I can still help with focused, \
               specific questions while things recover."
            .into(),
    }
}

fn default_emergency_rules() -> Vec<EmergencyRule> {
    vec![
        EmergencyRule {
            name: "technical_context".into(),
            triggers: [
                "debug", "fix", "error", "code", "function", "component", "api", "react",
                "vue", "angular",
            ]
            .map(String::from)
            .to_vec(),
            response: FallbackResponse {
                tokens: 75,
                body: "I can help with that! To give you an accurate solution:\n\n\
                       1. What technology are you using? (React, Vue, Node, etc.)\n\
                       2. What exactly goes wrong? (error message, unexpected behavior)\n\
                       3. What did you expect to happen?\n\n\
                       That narrows it down fast!"
                    .into(),
            },
        },
        EmergencyRule {
            name: "error_context".into(),
            triggers: [
                "error",
                "exception",
                "failed",
                "broken",
                "not working",
                "undefined",
                "null",
            ]
            .map(String::from)
            .to_vec(),
            response: FallbackResponse {
                tokens: 85,
                body: "I can help debug that! To pinpoint the issue quickly:\n\n\
                       1. Share the complete error message (line numbers included)\n\
                       2. Show the code where it happens\n\
                       3. Describe what you were trying to do\n\n\
                       Then I can give you a targeted fix instead of guessing."
                    .into(),
            },
        },
        EmergencyRule {
            name: "creation_context".into(),
            triggers: ["create", "build", "make", "develop", "design", "implement"]
                .map(String::from)
                .to_vec(),
            response: FallbackResponse {
                tokens: 90,
                body: "I'd love to help build that! To create exactly what you need:\n\n\
                       1. What type of project? (todo app, portfolio, dashboard)\n\
                       2. Which key features? (user login, database, specific functionality)\n\
                       3. Any tech preferences?\n\n\
                       The more specific you are, the better the first version will be."
                    .into(),
            },
        },
    ]
}

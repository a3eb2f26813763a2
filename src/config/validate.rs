//! Configuration validation with unknown field detection.

use serde_json::{Map, Value};
use std::collections::HashSet;

use super::Config;

/// Known top-level config field names.
const KNOWN_TOP_LEVEL: &[&str] = &[
    "agents",
    "providers",
    "database",
    "dictionary",
    "sessions",
    "gateway",
    "evaluation",
    "logging",
];

/// Known fields for each section. Nested as section.field.
const KNOWN_AGENTS: &[&str] = &["defaults", "prompts"];

const KNOWN_AGENTS_DEFAULTS: &[&str] = &[
    "model",
    "max_tokens",
    "temperature",
    "streaming",
    "max_tool_rounds",
    "round_timeout_secs",
    "max_history_messages",
    "default_session_id",
];

const KNOWN_PROMPTS: &[&str] = &["regular", "evaluator"];

const KNOWN_PROVIDERS: &[&str] = &["openai", "openrouter", "vllm", "ollama", "retry"];

const KNOWN_DATABASE: &[&str] = &["path", "read_only", "max_rows", "busy_timeout_ms", "schema"];

const KNOWN_DICTIONARY: &[&str] = &["path"];

const KNOWN_SESSIONS: &[&str] = &["persist", "path", "busy_policy"];

const KNOWN_GATEWAY: &[&str] = &["host", "port", "allowed_origins"];

const KNOWN_EVALUATION: &[&str] = &[
    "questions_path",
    "pass_threshold",
    "default_limit",
    "concurrency",
];

const KNOWN_LOGGING: &[&str] = &["format", "file", "level"];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, strsim::levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

/// Returns true if any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.level == DiagnosticLevel::Error)
}

/// Report keys of `obj` that are not in `known`. Returns true if any were found.
fn check_keys(
    obj: &Map<String, Value>,
    known: &[&str],
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let known_set: HashSet<&str> = known.iter().copied().collect();
    let mut found = false;
    for key in obj.keys() {
        if known_set.contains(key.as_str()) {
            continue;
        }
        found = true;
        let msg = match suggest_field(key, known) {
            Some(suggestion) => format!("Unknown field '{}', {}", key, suggestion),
            None => format!("Unknown field '{}'", key),
        };
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        diagnostics.push(Diagnostic::new(DiagnosticLevel::Error, path, msg));
    }
    found
}

fn section<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    obj.get(key).and_then(|v| v.as_object())
}

/// Validate a raw JSON config value against known field names and value ranges.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match raw.as_object() {
        Some(o) => o,
        None => {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Error,
                "",
                "Config must be a JSON object",
            ));
            return diagnostics;
        }
    };

    diagnostics.push(Diagnostic::new(DiagnosticLevel::Ok, "", "Valid JSON"));

    let mut has_unknown = check_keys(obj, KNOWN_TOP_LEVEL, "", &mut diagnostics);

    if let Some(agents) = section(obj, "agents") {
        has_unknown |= check_keys(agents, KNOWN_AGENTS, "agents", &mut diagnostics);
        if let Some(defaults) = section(agents, "defaults") {
            has_unknown |= check_keys(
                defaults,
                KNOWN_AGENTS_DEFAULTS,
                "agents.defaults",
                &mut diagnostics,
            );
        }
        if let Some(prompts) = section(agents, "prompts") {
            has_unknown |= check_keys(prompts, KNOWN_PROMPTS, "agents.prompts", &mut diagnostics);
        }
    }

    let flat_sections: [(&str, &[&str]); 7] = [
        ("providers", KNOWN_PROVIDERS),
        ("database", KNOWN_DATABASE),
        ("dictionary", KNOWN_DICTIONARY),
        ("sessions", KNOWN_SESSIONS),
        ("gateway", KNOWN_GATEWAY),
        ("evaluation", KNOWN_EVALUATION),
        ("logging", KNOWN_LOGGING),
    ];
    for (name, known) in flat_sections {
        if let Some(sec) = section(obj, name) {
            has_unknown |= check_keys(sec, known, name, &mut diagnostics);
        }
    }

    if !has_unknown {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Ok,
            "",
            "All fields recognized",
        ));
    }

    // Type check: the document must deserialize into Config.
    match serde_json::from_value::<Config>(raw.clone()) {
        Ok(config) => diagnostics.extend(validate_values(&config)),
        Err(e) => diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "",
            format!("Invalid value: {}", e),
        )),
    }

    diagnostics
}

/// Range checks on an already-typed configuration.
pub fn validate_values(config: &Config) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let defaults = &config.agents.defaults;

    if defaults.model.trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "agents.defaults.model",
            "Must not be empty",
        ));
    }
    if defaults.max_tool_rounds == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "agents.defaults.max_tool_rounds",
            "Must be at least 1",
        ));
    }
    if defaults.round_timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "agents.defaults.round_timeout_secs",
            "Must be at least 1",
        ));
    }
    if !(0.0..=2.0).contains(&defaults.temperature) {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "agents.defaults.temperature",
            format!("{} is outside the usual 0.0-2.0 range", defaults.temperature),
        ));
    }
    if defaults.streaming {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "agents.defaults.streaming",
            "Streaming is not supported; requests are sent non-streaming",
        ));
    }
    if config.database.max_rows == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "database.max_rows",
            "Must be at least 1",
        ));
    }
    if !config.database.read_only {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "database.read_only",
            "Disabled; model-generated SQL can modify the database",
        ));
    }
    if !(0.0..=1.0).contains(&config.evaluation.pass_threshold) {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "evaluation.pass_threshold",
            "Must be between 0.0 and 1.0",
        ));
    }
    if config.evaluation.concurrency == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "evaluation.concurrency",
            "Must be at least 1",
        ));
    }
    if config.gateway.port == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "gateway.port",
            "Must be non-zero",
        ));
    }
    if config.gateway.allowed_origins.is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "gateway.allowed_origins",
            "Empty; any origin may connect",
        ));
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_suggest_field_match() {
        let result = suggest_field("gatway", KNOWN_TOP_LEVEL);
        assert!(result.is_some());
        assert!(result.unwrap().contains("gateway"));
    }

    #[test]
    fn test_suggest_field_no_match() {
        assert!(suggest_field("xyzabcdef", KNOWN_TOP_LEVEL).is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        let raw = json!({
            "agents": {"defaults": {"model": "gpt-4o"}},
            "gateway": {"port": 8080},
            "database": {"path": "/tmp/db.sqlite", "schema": {"max_tables": 10}}
        });
        let diags = validate_config(&raw);
        assert!(!has_errors(&diags), "unexpected errors: {:?}", diags);
    }

    #[test]
    fn test_validate_unknown_top_level() {
        let diags = validate_config(&json!({"agentsss": {}}));
        assert!(diags
            .iter()
            .any(|d| d.level == DiagnosticLevel::Error && d.path == "agentsss"));
    }

    #[test]
    fn test_validate_unknown_nested_field_with_suggestion() {
        let diags = validate_config(&json!({"agents": {"defaults": {"max_tool_round": 3}}}));
        let diag = diags
            .iter()
            .find(|d| d.path == "agents.defaults.max_tool_round")
            .unwrap();
        assert_eq!(diag.level, DiagnosticLevel::Error);
        assert!(diag.message.contains("max_tool_rounds"));
    }

    #[test]
    fn test_validate_unknown_section_field() {
        let diags = validate_config(&json!({"evaluation": {"threshold": 0.5}}));
        assert!(diags.iter().any(|d| d.path == "evaluation.threshold"));
    }

    #[test]
    fn test_validate_wrong_type() {
        let diags = validate_config(&json!({"gateway": {"port": "eighty"}}));
        assert!(diags
            .iter()
            .any(|d| d.level == DiagnosticLevel::Error && d.message.starts_with("Invalid value")));
    }

    #[test]
    fn test_validate_threshold_out_of_range() {
        let diags = validate_config(&json!({"evaluation": {"pass_threshold": 1.5}}));
        assert!(diags
            .iter()
            .any(|d| d.path == "evaluation.pass_threshold" && d.level == DiagnosticLevel::Error));
    }

    #[test]
    fn test_validate_zero_rounds() {
        let mut config = Config::default();
        config.agents.defaults.max_tool_rounds = 0;
        assert!(has_errors(&validate_values(&config)));
    }

    #[test]
    fn test_validate_writable_database_warns() {
        let mut config = Config::default();
        config.database.read_only = false;
        let diags = validate_values(&config);
        assert!(!has_errors(&diags));
        assert!(diags
            .iter()
            .any(|d| d.level == DiagnosticLevel::Warn && d.path == "database.read_only"));
    }

    #[test]
    fn test_validate_not_an_object() {
        let diags = validate_config(&json!("not an object"));
        assert!(diags.iter().any(|d| {
            d.level == DiagnosticLevel::Error && d.message.contains("must be a JSON object")
        }));
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::new(DiagnosticLevel::Warn, "gateway.port", "odd");
        assert_eq!(d.to_string(), "[WARN] gateway.port: odd");
        let d = Diagnostic::new(DiagnosticLevel::Ok, "", "Valid JSON");
        assert_eq!(d.to_string(), "[OK] Valid JSON");
    }
}

//! SQL extraction, normalization and similarity scoring.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::session::Message;
use crate::tools::EXECUTE_SQL_TOOL;

static SQL_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```[ \t]*sql[ \t]*\r?\n?(.*?)```").unwrap()
});

static ANY_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").unwrap()
});

static FENCE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_-]*").unwrap());

static LINE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--[^\n]*").unwrap());

static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Pick the SQL out of an assistant answer.
///
/// Order: first ```sql block, first fenced block of any kind, the last query
/// the session ran through `execute_sql_query`, then the answer itself.
pub fn extract_sql(answer: &str, last_executed: Option<&str>) -> String {
    if let Some(m) = SQL_FENCE.captures(answer).and_then(|c| c.get(1)) {
        return m.as_str().trim().to_string();
    }
    if let Some(m) = ANY_FENCE.captures(answer).and_then(|c| c.get(1)) {
        return m.as_str().trim().to_string();
    }
    if let Some(query) = last_executed.map(str::trim).filter(|q| !q.is_empty()) {
        return query.to_string();
    }
    answer.trim().to_string()
}

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

/// The most recent query issued through `execute_sql_query` in `history`.
pub fn last_executed_query(history: &[Message]) -> Option<String> {
    history
        .iter()
        .rev()
        .filter_map(|m| m.tool_calls.as_ref())
        .flat_map(|calls| calls.iter().rev())
        .filter(|call| call.name == EXECUTE_SQL_TOOL)
        .find_map(|call| call.parse_arguments::<QueryArgs>().ok())
        .map(|args| args.query)
}

/// Canonical form for comparison: no fences or comments, lowercase,
/// single-spaced, no trailing semicolons.
pub fn normalize_sql(sql: &str) -> String {
    let without_fences = FENCE_MARKER.replace_all(sql, " ");
    let without_blocks = BLOCK_COMMENT.replace_all(&without_fences, " ");
    let without_lines = LINE_COMMENT.replace_all(&without_blocks, " ");
    let lowered = without_lines.to_lowercase();
    let collapsed = WHITESPACE.replace_all(&lowered, " ");
    collapsed
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

/// Normalized Levenshtein similarity of two queries, in `0.0..=1.0`.
pub fn sql_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_sql(a), &normalize_sql(b))
}

//! Context builder for agent conversations
//!
//! Builds the message list sent to the model: the purpose's system prompt
//! followed by the session history, optionally trimmed to recent turns.

use crate::session::{Message, Role};

/// Default prompt for live chat.
pub const REGULAR_SYSTEM_PROMPT: &str = r#"You are SQLMatic, an assistant that answers questions about data in a relational database.

You have three tools:
- get_schema: inspect tables, columns, keys and indexes. Call it before writing SQL.
- get_field_definition: look up the business meaning of a column in the data dictionary.
- execute_sql_query: run a SQL query and see the resulting rows.

Work step by step. Check the schema, write a query, run it, and fix it if it fails.
Answer in plain language, and show the final SQL in a ```sql block."#;

/// Default prompt for evaluation runs.
pub const EVALUATOR_SYSTEM_PROMPT: &str = r#"You are SQLMatic running in evaluation mode.

For each question, use get_schema and get_field_definition as needed, then run your
query with execute_sql_query to confirm it works.

Reply with exactly one ```sql fenced block containing the final query that answers
the question, and nothing else."#;

/// Which system prompt a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentPurpose {
    #[default]
    Regular,
    Evaluator,
}

impl AgentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Evaluator => "evaluator",
        }
    }
}

impl std::fmt::Display for AgentPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for the model's message list.
///
/// # Example
///
/// ```rust
/// use sqlmatic::agent::ContextBuilder;
/// use sqlmatic::session::{Message, Role};
///
/// let builder = ContextBuilder::new("You answer questions about data.");
/// let history = vec![Message::user("How many customers?")];
/// let messages = builder.build_messages(&history);
/// assert_eq!(messages.len(), 2);
/// assert_eq!(messages[0].role, Role::System);
/// ```
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    /// 0 keeps the whole history
    max_history_messages: usize,
}

impl ContextBuilder {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            max_history_messages: 0,
        }
    }

    /// Keep roughly the most recent `max` messages in the model context.
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history_messages = max;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn build_system_message(&self) -> Message {
        Message::system(&self.system_prompt)
    }

    /// System message followed by the (possibly trimmed) history.
    pub fn build_messages(&self, history: &[Message]) -> Vec<Message> {
        let kept = trim_history(history, self.max_history_messages);
        let mut messages = Vec::with_capacity(kept.len() + 1);
        messages.push(self.build_system_message());
        messages.extend_from_slice(kept);
        messages
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(REGULAR_SYSTEM_PROMPT)
    }
}

/// Trim `history` to about `max` messages, cutting only where a user message
/// starts.
///
/// The cut lands on the first user message inside the window. When the
/// window holds no user message the latest turn is kept whole, so the result
/// may exceed `max`. `max == 0` disables trimming.
pub fn trim_history(history: &[Message], max: usize) -> &[Message] {
    if max == 0 || history.len() <= max {
        return history;
    }
    let window_start = history.len() - max;
    let start = history[window_start..]
        .iter()
        .position(|m| m.role == Role::User)
        .map(|offset| window_start + offset)
        .or_else(|| history.iter().rposition(|m| m.role == Role::User))
        .unwrap_or(0);
    &history[start..]
}

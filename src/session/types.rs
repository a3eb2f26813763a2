//! Session types for SQLMatic
//!
//! This module defines the core types for conversation history: messages,
//! roles, tool calls, and the tool-call pairing check that every stored
//! history must satisfy.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation session containing its ordered message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for this session
    pub key: String,
    /// Ordered list of messages in this conversation
    pub messages: Vec<Message>,
    /// When this session was created
    pub created_at: DateTime<Utc>,
    /// When this session was last modified
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new empty session with the given key.
    ///
    /// # Example
    /// ```
    /// use sqlmatic::session::Session;
    ///
    /// let session = Session::new("web-42");
    /// assert!(session.messages.is_empty());
    /// ```
    pub fn new(key: &str) -> Self {
        let now = Utc::now();
        Self {
            key: key.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to this session without validation.
    ///
    /// Also updates the `updated_at` timestamp. Callers that need the pairing
    /// guarantee go through `SessionManager::append_all`.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Drop a corrupted turn and everything after it.
    ///
    /// The cut starts at the user message that opened the turn containing
    /// the first pairing violation. Returns the number of discarded messages,
    /// or `None` if the history was already consistent.
    pub fn discard_corrupted_turn(&mut self) -> Option<usize> {
        let violation = check_tool_pairing(&self.messages).err()?;
        let cut = turn_start(&self.messages, violation.index);
        let removed = self.messages.len() - cut;
        self.messages.truncate(cut);
        self.updated_at = Utc::now();
        Some(removed)
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The text content of the message
    pub content: String,
    /// Tool calls made by the assistant (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message is responding to (for tool results)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a new user message.
    ///
    /// # Example
    /// ```
    /// use sqlmatic::session::{Message, Role};
    ///
    /// let msg = Message::user("How many customers do we have?");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new system message.
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new tool result message.
    ///
    /// # Example
    /// ```
    /// use sqlmatic::session::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", r#"{"row_count": 3}"#);
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
    /// ```
    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: Role::Tool,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    /// Create an assistant message with tool calls.
    ///
    /// # Example
    /// ```
    /// use sqlmatic::session::{Message, ToolCall};
    ///
    /// let call = ToolCall::new("call_1", "get_schema", r#"{"table_name": "all"}"#);
    /// let msg = Message::assistant_with_tools("", vec![call]);
    /// assert!(msg.has_tool_calls());
    /// ```
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Check if this message has tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false)
    }

    /// Check if this is a tool result message.
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompts and instructions
    System,
    /// Messages from the user
    User,
    /// Messages from the AI assistant
    Assistant,
    /// Results from tool executions
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call made by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Identifier, unique within the assistant turn
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// JSON-encoded arguments exactly as the model produced them
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Parse the arguments as a specific type.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.arguments)
    }
}

/// First place where a history breaks the call/result pairing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingViolation {
    /// Index of the offending message
    pub index: usize,
    /// Human-readable description
    pub detail: String,
}

impl std::fmt::Display for PairingViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "message {}: {}", self.index, self.detail)
    }
}

/// Check that every tool result answers a call of the assistant message
/// directly before its block, and that every call is answered exactly once
/// before any other message follows.
pub fn check_tool_pairing(messages: &[Message]) -> std::result::Result<(), PairingViolation> {
    // Calls of the current assistant turn still waiting for a result,
    // plus the index of that assistant message.
    let mut pending: HashSet<&str> = HashSet::new();
    let mut pending_since = 0usize;

    for (index, msg) in messages.iter().enumerate() {
        if msg.role == Role::Tool {
            let id = msg.tool_call_id.as_deref().ok_or_else(|| PairingViolation {
                index,
                detail: "tool message without tool_call_id".to_string(),
            })?;
            if !pending.remove(id) {
                return Err(PairingViolation {
                    index,
                    detail: format!("tool result '{}' has no matching pending call", id),
                });
            }
            continue;
        }

        if !pending.is_empty() {
            return Err(PairingViolation {
                index: pending_since,
                detail: format!(
                    "{} tool call(s) left without results before a {} message",
                    pending.len(),
                    msg.role
                ),
            });
        }

        if let Some(calls) = msg.tool_calls.as_ref().filter(|c| !c.is_empty()) {
            if msg.role != Role::Assistant {
                return Err(PairingViolation {
                    index,
                    detail: format!("{} message carries tool calls", msg.role),
                });
            }
            for call in calls {
                if !pending.insert(call.id.as_str()) {
                    return Err(PairingViolation {
                        index,
                        detail: format!("duplicate tool call id '{}'", call.id),
                    });
                }
            }
            pending_since = index;
        }
    }

    if pending.is_empty() {
        Ok(())
    } else {
        Err(PairingViolation {
            index: pending_since,
            detail: format!("{} tool call(s) left without results", pending.len()),
        })
    }
}

/// Index of the user message that opened the turn containing `index`.
fn turn_start(messages: &[Message], index: usize) -> usize {
    messages[..=index.min(messages.len().saturating_sub(1))]
        .iter()
        .rposition(|m| m.role == Role::User)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "get_schema", "{}")
    }

    #[test]
    fn test_session_new() {
        let session = Session::new("test-session");
        assert_eq!(session.key, "test-session");
        assert!(session.messages.is_empty());
        assert!(session.created_at <= session.updated_at);
    }

    #[test]
    fn test_add_message_touches_updated_at() {
        let mut session = Session::new("test");
        let created = session.updated_at;

        session.add_message(Message::user("Hello"));
        session.add_message(Message::assistant("Hi!"));

        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].role, Role::Assistant);
        assert!(session.updated_at >= created);
    }

    #[test]
    fn test_message_with_tool_calls() {
        let msg = Message::assistant_with_tools("", vec![call("c1")]);
        assert!(msg.has_tool_calls());
        assert!(!Message::assistant_with_tools("", vec![]).has_tool_calls());
    }

    #[test]
    fn test_role_serialize() {
        let json = serde_json::to_string(&Role::Tool).unwrap();
        assert_eq!(json, r#""tool""#);
        let parsed: Role = serde_json::from_str(r#""assistant""#).unwrap();
        assert_eq!(parsed, Role::Assistant);
    }

    #[test]
    fn test_tool_call_parse_arguments() {
        #[derive(Debug, Deserialize)]
        struct Args {
            query: String,
        }

        let call = ToolCall::new("c1", "execute_sql_query", r#"{"query": "SELECT 1"}"#);
        let args: Args = call.parse_arguments().unwrap();
        assert_eq!(args.query, "SELECT 1");
    }

    #[test]
    fn test_message_serialization_skips_none() {
        let json = serde_json::to_string(&Message::user("Hello")).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
    }

    #[test]
    fn test_pairing_valid_history() {
        let messages = vec![
            Message::user("q"),
            Message::assistant_with_tools("", vec![call("a"), call("b")]),
            Message::tool_result("b", "{}"),
            Message::tool_result("a", "{}"),
            Message::assistant("answer"),
            Message::user("q2"),
            Message::assistant("answer2"),
        ];
        assert!(check_tool_pairing(&messages).is_ok());
    }

    #[test]
    fn test_pairing_missing_result() {
        let messages = vec![
            Message::user("q"),
            Message::assistant_with_tools("", vec![call("a"), call("b")]),
            Message::tool_result("a", "{}"),
            Message::assistant("answer"),
        ];
        let err = check_tool_pairing(&messages).unwrap_err();
        assert_eq!(err.index, 1);
    }

    #[test]
    fn test_pairing_trailing_unresolved_calls() {
        let messages = vec![
            Message::user("q"),
            Message::assistant_with_tools("", vec![call("a")]),
        ];
        assert!(check_tool_pairing(&messages).is_err());
    }

    #[test]
    fn test_pairing_orphan_result() {
        let messages = vec![Message::user("q"), Message::tool_result("x", "{}")];
        let err = check_tool_pairing(&messages).unwrap_err();
        assert_eq!(err.index, 1);
        assert!(err.detail.contains("'x'"));
    }

    #[test]
    fn test_pairing_duplicate_result() {
        let messages = vec![
            Message::user("q"),
            Message::assistant_with_tools("", vec![call("a")]),
            Message::tool_result("a", "{}"),
            Message::tool_result("a", "{}"),
        ];
        assert_eq!(check_tool_pairing(&messages).unwrap_err().index, 3);
    }

    #[test]
    fn test_pairing_duplicate_call_ids() {
        let messages = vec![
            Message::user("q"),
            Message::assistant_with_tools("", vec![call("a"), call("a")]),
        ];
        assert!(check_tool_pairing(&messages)
            .unwrap_err()
            .detail
            .contains("duplicate"));
    }

    #[test]
    fn test_discard_corrupted_turn() {
        let mut session = Session::new("s");
        session.add_message(Message::user("first"));
        session.add_message(Message::assistant("ok"));
        session.add_message(Message::user("second"));
        session.add_message(Message::assistant_with_tools("", vec![call("a")]));
        session.add_message(Message::assistant("dangling"));

        assert_eq!(session.discard_corrupted_turn(), Some(3));
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "ok");
        assert!(check_tool_pairing(&session.messages).is_ok());
    }

    #[test]
    fn test_discard_consistent_history_is_noop() {
        let mut session = Session::new("s");
        session.add_message(Message::user("q"));
        session.add_message(Message::assistant("a"));
        assert_eq!(session.discard_corrupted_turn(), None);
        assert_eq!(session.messages.len(), 2);
    }
}

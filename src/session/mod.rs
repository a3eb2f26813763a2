//! Session module - Session and conversation state management
//!
//! This module provides:
//! - In-memory session storage with async access and optional JSON file
//!   persistence ([`SessionManager`])
//! - Validated, all-or-nothing history appends
//! - Per-session exclusive leases ([`SessionRouter`])
//!
//! # Example
//!
//! ```
//! use sqlmatic::session::{Message, SessionManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = SessionManager::new_memory();
//!     manager.get_or_create("web-1").await.unwrap();
//!     manager
//!         .append_all("web-1", vec![Message::user("Hi"), Message::assistant("Hello!")])
//!         .await
//!         .unwrap();
//!     let session = manager.get_or_create("web-1").await.unwrap();
//!     assert_eq!(session.messages.len(), 2);
//! }
//! ```

pub mod router;
pub mod types;

pub use router::{SessionLease, SessionRouter};
pub use types::{check_tool_pairing, Message, PairingViolation, Role, Session, ToolCall};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{Result, SqlMaticError};

/// Session manager for storing and retrieving conversation sessions.
///
/// Sessions live in an in-memory map; when a storage path is set each one is
/// also written to `<path>/<percent-encoded key>.json` after every commit.
/// Cloning shares the underlying map.
pub struct SessionManager {
    /// In-memory cache of sessions
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    /// Optional path for file-based persistence
    storage_path: Option<PathBuf>,
}

impl SessionManager {
    /// Create an in-memory session manager without persistence.
    pub fn new_memory() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage_path: None,
        }
    }

    /// Create a session manager persisting to the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_path(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            storage_path: Some(path),
        })
    }

    /// Build a manager from an optional storage directory.
    pub fn from_storage(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::with_path(p),
            None => Ok(Self::new_memory()),
        }
    }

    /// Get an existing session or create a new one. Idempotent.
    ///
    /// Sessions loaded from disk are checked for tool-call pairing; a
    /// corrupted turn is discarded from its user message onward.
    /// A blank key is rejected; callers resolve ids through the router.
    pub async fn get_or_create(&self, key: &str) -> Result<Session> {
        if key.trim().is_empty() {
            return Err(SqlMaticError::Session("session id must not be blank".into()));
        }
        if let Some(session) = self.get(key).await? {
            return Ok(session);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(session_id = %key, "Created session");
                Session::new(key)
            })
            .clone();
        Ok(session)
    }

    /// Get a session by key without creating it.
    pub async fn get(&self, key: &str) -> Result<Option<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(key) {
                return Ok(Some(session.clone()));
            }
        }

        let Some(file_path) = self.file_path(key) else {
            return Ok(None);
        };
        if !file_path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&file_path).await?;
        let mut session: Session = serde_json::from_str(&content)?;
        if let Some(removed) = session.discard_corrupted_turn() {
            warn!(
                session_id = %key,
                removed,
                "Discarded corrupted turn from stored history"
            );
        }

        let mut sessions = self.sessions.write().await;
        // Another task may have loaded it meanwhile; keep the first copy.
        let session = sessions.entry(key.to_string()).or_insert(session).clone();
        Ok(Some(session))
    }

    /// Append one message. See [`SessionManager::append_all`].
    pub async fn append(&self, key: &str, message: Message) -> Result<()> {
        self.append_all(key, vec![message]).await
    }

    /// Append messages in order as a single commit.
    ///
    /// The resulting history is checked against the tool-call pairing rule
    /// first; on violation nothing is committed and `SessionCorruption` is
    /// returned.
    pub async fn append_all(&self, key: &str, messages: Vec<Message>) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        // Make sure a persisted session is loaded before extending it.
        self.get_or_create(key).await?;

        let snapshot = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .entry(key.to_string())
                .or_insert_with(|| Session::new(key));

            let mut candidate = session.messages.clone();
            candidate.extend(messages);
            check_tool_pairing(&candidate).map_err(|v| SqlMaticError::SessionCorruption {
                session: key.to_string(),
                detail: v.to_string(),
            })?;

            session.messages = candidate;
            session.updated_at = Utc::now();
            session.clone()
        };

        self.persist(&snapshot).await
    }

    /// Delete a session from both memory and disk.
    pub async fn delete(&self, key: &str) -> Result<()> {
        {
            let mut sessions = self.sessions.write().await;
            sessions.remove(key);
        }

        if let Some(file_path) = self.file_path(key) {
            if file_path.exists() {
                tokio::fs::remove_file(&file_path).await?;
            }
        }

        Ok(())
    }

    /// List all session keys from memory and disk, sorted and deduplicated.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions.keys().cloned().collect()
        };

        if let Some(ref storage_path) = self.storage_path {
            let mut dir_entries = tokio::fs::read_dir(storage_path).await?;
            while let Some(entry) = dir_entries.next_entry().await? {
                let path = entry.path();
                if path.extension().map(|e| e == "json").unwrap_or(false) {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        keys.push(Self::unsanitize_key(stem));
                    }
                }
            }
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Check if a session exists in memory or on disk.
    pub async fn exists(&self, key: &str) -> bool {
        {
            let sessions = self.sessions.read().await;
            if sessions.contains_key(key) {
                return true;
            }
        }
        self.file_path(key).map(|p| p.exists()).unwrap_or(false)
    }

    /// Get the number of sessions in memory.
    pub async fn cache_size(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    async fn persist(&self, session: &Session) -> Result<()> {
        if let Some(file_path) = self.file_path(&session.key) {
            let content = serde_json::to_string_pretty(session)?;
            tokio::fs::write(&file_path, content)
                .await
                .map_err(|e| SqlMaticError::Session(format!("Failed to persist '{}': {}", session.key, e)))?;
        }
        Ok(())
    }

    fn file_path(&self, key: &str) -> Option<PathBuf> {
        self.storage_path
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", Self::sanitize_key(key))))
    }

    /// Percent-encode characters that are unsafe in file names.
    ///
    /// `%` itself is escaped so the mapping stays reversible.
    fn sanitize_key(key: &str) -> String {
        let mut result = String::with_capacity(key.len() * 3);
        for c in key.chars() {
            match c {
                '/' => result.push_str("%2F"),
                '\\' => result.push_str("%5C"),
                ':' => result.push_str("%3A"),
                '*' => result.push_str("%2A"),
                '?' => result.push_str("%3F"),
                '"' => result.push_str("%22"),
                '<' => result.push_str("%3C"),
                '>' => result.push_str("%3E"),
                '|' => result.push_str("%7C"),
                '.' => result.push_str("%2E"),
                '%' => result.push_str("%25"),
                c => result.push(c),
            }
        }
        result
    }

    /// Inverse of `sanitize_key`.
    fn unsanitize_key(sanitized: &str) -> String {
        let mut result = String::with_capacity(sanitized.len());
        let mut chars = sanitized.chars();

        while let Some(c) = chars.next() {
            if c != '%' {
                result.push(c);
                continue;
            }
            let hex: String = chars.by_ref().take(2).collect();
            match u8::from_str_radix(&hex, 16) {
                Ok(byte) if hex.len() == 2 => result.push(byte as char),
                _ => {
                    result.push('%');
                    result.push_str(&hex);
                }
            }
        }
        result
    }
}

impl Clone for SessionManager {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            storage_path: self.storage_path.clone(),
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new_memory()
    }
}

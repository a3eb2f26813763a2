//! Business glossary (data dictionary) loaded from CSV.
//!
//! The file has the header `Domain,Table,Column,Key_Type,Description`.
//! Lookups match the `Column` field case-insensitively by substring.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Column names reported alongside lookup results.
pub const DICTIONARY_COLUMNS: [&str; 5] = ["Domain", "Table", "Column", "Key_Type", "Description"];

/// One glossary row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    #[serde(rename = "Domain", default)]
    pub domain: String,
    #[serde(rename = "Table", default)]
    pub table: String,
    #[serde(rename = "Column")]
    pub column: String,
    #[serde(rename = "Key_Type", default)]
    pub key_type: String,
    #[serde(rename = "Description", default)]
    pub description: String,
}

/// In-memory glossary.
#[derive(Debug, Clone, Default)]
pub struct DataDictionary {
    entries: Vec<FieldDefinition>,
    /// Where the entries came from; `None` when built in memory
    source: Option<PathBuf>,
    /// Set when the configured file could not be found
    missing: bool,
}

impl DataDictionary {
    /// Load the glossary at `path`.
    ///
    /// A missing file yields an empty dictionary flagged as missing; a
    /// malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Data dictionary not found; field lookups will fail");
            return Ok(Self {
                entries: Vec::new(),
                source: Some(path.to_path_buf()),
                missing: true,
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)?;
        let entries = reader
            .deserialize::<FieldDefinition>()
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!(path = %path.display(), entries = entries.len(), "Loaded data dictionary");
        Ok(Self {
            entries,
            source: Some(path.to_path_buf()),
            missing: false,
        })
    }

    /// Build a dictionary from entries already in memory.
    pub fn from_entries(entries: Vec<FieldDefinition>) -> Self {
        Self {
            entries,
            source: None,
            missing: false,
        }
    }

    /// True when the configured file did not exist at load time.
    pub fn is_missing(&self) -> bool {
        self.missing
    }

    /// Source path, if loaded from disk.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows whose `Column` contains `column_name`, ignoring case.
    pub fn lookup(&self, column_name: &str) -> Vec<&FieldDefinition> {
        let needle = column_name.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|e| e.column.to_lowercase().contains(&needle))
            .collect()
    }
}

//! SQLite access: schema introspection and query execution.
//!
//! A single connection is shared behind a mutex. The async wrappers move the
//! work onto tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{DatabaseConfig, SchemaToolConfig};
use crate::error::{Result, SqlMaticError};

/// Whole-database schema as reported by `get_schema`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchemaInfo {
    pub tables: Vec<TableInfo>,
    pub indexes: Vec<IndexInfo>,
}

impl SchemaInfo {
    /// Table names in catalog order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    /// Schema restricted to one table (case-insensitive), with its indexes.
    pub fn filter_table(&self, name: &str) -> Option<SchemaInfo> {
        let tables: Vec<TableInfo> = self
            .tables
            .iter()
            .filter(|t| t.name.eq_ignore_ascii_case(name))
            .cloned()
            .collect();
        if tables.is_empty() {
            return None;
        }
        let indexes = self
            .indexes
            .iter()
            .filter(|i| i.table.eq_ignore_ascii_case(name))
            .cloned()
            .collect();
        Some(SchemaInfo { tables, indexes })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub notnull: bool,
    pub pk: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForeignKeyInfo {
    pub from: String,
    pub to_table: String,
    pub to_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexInfo {
    pub table: String,
    pub name: String,
    pub unique: bool,
}

/// Rows produced by a query, capped at the configured maximum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    /// True when more rows existed than were returned
    pub truncated: bool,
}

/// Shared SQLite handle.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    /// Open the database at `path` honouring the read-only flag and busy timeout.
    ///
    /// # Errors
    ///
    /// `NotFound` if the file does not exist; `Database` for SQLite failures.
    pub fn open(path: &Path, cfg: &DatabaseConfig) -> Result<Self> {
        if !path.exists() {
            return Err(SqlMaticError::NotFound(format!(
                "SQLite database {}",
                path.display()
            )));
        }

        let flags = if cfg.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX
        };
        let conn = Connection::open_with_flags(path, flags)?;
        conn.busy_timeout(Duration::from_millis(cfg.busy_timeout_ms))?;
        if cfg.read_only {
            conn.pragma_update(None, "query_only", true)?;
        }

        debug!(path = %path.display(), read_only = cfg.read_only, "Opened database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    /// Wrap an already-open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        }
    }

    /// Path the database was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SqlMaticError::Tool(format!("Database lock poisoned: {}", e)))
    }

    /// Introspect tables, columns, foreign keys and indexes.
    pub fn schema(&self, opts: &SchemaToolConfig) -> Result<SchemaInfo> {
        let conn = self.lock()?;

        let tables_query = format!(
            "SELECT name FROM sqlite_master WHERE type = 'table' {} ORDER BY name LIMIT ?1",
            if opts.exclude_system_tables {
                "AND name NOT LIKE 'sqlite_%'"
            } else {
                ""
            }
        );
        let table_names: Vec<String> = {
            let mut stmt = conn.prepare(&tables_query)?;
            let names = stmt
                .query_map([opts.max_tables as i64], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            names
        };

        let mut schema = SchemaInfo::default();
        for table in table_names {
            let columns = {
                let mut stmt = conn.prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1)")?;
                let cols = stmt
                    .query_map([&table], |row| {
                        Ok(ColumnInfo {
                            name: row.get(0)?,
                            data_type: row.get(1)?,
                            notnull: row.get::<_, i64>(2)? != 0,
                            pk: row.get::<_, i64>(3)? != 0,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                cols
            };

            let foreign_keys = if opts.include_relationships {
                let mut stmt = conn.prepare(
                    "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1)",
                )?;
                let fks = stmt
                    .query_map([&table], |row| {
                        Ok(ForeignKeyInfo {
                            from: row.get(0)?,
                            to_table: row.get(1)?,
                            // NULL when the reference targets the primary key implicitly
                            to_column: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                fks
            } else {
                Vec::new()
            };

            if opts.include_indexes {
                let mut stmt = conn.prepare("SELECT name, \"unique\" FROM pragma_index_list(?1)")?;
                let indexes = stmt
                    .query_map([&table], |row| {
                        Ok(IndexInfo {
                            table: table.clone(),
                            name: row.get(0)?,
                            unique: row.get::<_, i64>(1)? != 0,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                schema.indexes.extend(indexes);
            }

            schema.tables.push(TableInfo {
                name: table,
                columns,
                foreign_keys,
            });
        }

        Ok(schema)
    }

    /// Run `sql` and collect at most `max_rows` rows.
    pub fn query(&self, sql: &str, max_rows: usize) -> Result<QueryResult> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut truncated = false;
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            if rows.len() >= max_rows {
                truncated = true;
                break;
            }
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(sql_to_json(row.get::<_, SqlValue>(i)?));
            }
            rows.push(values);
        }

        Ok(QueryResult {
            columns,
            row_count: rows.len(),
            rows,
            truncated,
        })
    }

    /// [`Database::schema`] on the blocking pool.
    pub async fn schema_async(&self, opts: SchemaToolConfig) -> Result<SchemaInfo> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.schema(&opts))
            .await
            .map_err(|e| SqlMaticError::Tool(format!("Schema task failed: {}", e)))?
    }

    /// [`Database::query`] on the blocking pool.
    pub async fn query_async(&self, sql: String, max_rows: usize) -> Result<QueryResult> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.query(&sql, max_rows))
            .await
            .map_err(|e| SqlMaticError::Tool(format!("Query task failed: {}", e)))?
    }
}

fn sql_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(n) => json!(n),
        SqlValue::Real(f) => json!(f),
        SqlValue::Text(s) => json!(s),
        SqlValue::Blob(b) => json!(format!("<blob:{} bytes>", b.len())),
    }
}

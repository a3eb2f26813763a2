//! `execute_sql_query`: run a read query and return its rows.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::db::Database;
use crate::error::{Result, SqlMaticError};
use crate::utils::string::single_line;

use super::{parse_args, Tool, ToolContext};

/// Name the model uses for this tool. The evaluation harness looks for it in
/// session history to recover the last executed query.
pub const EXECUTE_SQL_TOOL: &str = "execute_sql_query";

#[derive(Debug, Deserialize)]
struct ExecuteSqlArgs {
    query: String,
}

/// Executes SQL against the configured database, capped at `max_rows`.
pub struct ExecuteSqlTool {
    db: Database,
    max_rows: usize,
}

impl ExecuteSqlTool {
    pub fn new(db: Database, max_rows: usize) -> Self {
        Self { db, max_rows }
    }

    /// Run `query`. SQL failures come back as `{"error", "query"}` data so
    /// the model can correct itself.
    pub async fn run(&self, query: &str) -> Result<Value> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SqlMaticError::Tool("Query must not be empty".into()));
        }
        debug!(query = %single_line(query), "Executing SQL");

        match self.db.query_async(query.to_string(), self.max_rows).await {
            Ok(result) => {
                let message = if result.truncated {
                    format!(
                        "Query executed successfully. Showing the first {} rows.",
                        result.row_count
                    )
                } else {
                    format!(
                        "Query executed successfully. {} rows returned.",
                        result.row_count
                    )
                };
                Ok(json!({
                    "message": message,
                    "columns": result.columns,
                    "rows": result.rows,
                    "row_count": result.row_count,
                    "truncated": result.truncated,
                }))
            }
            Err(SqlMaticError::Database(e)) => Ok(json!({
                "error": e.to_string(),
                "query": query,
            })),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Tool for ExecuteSqlTool {
    fn name(&self) -> &str {
        EXECUTE_SQL_TOOL
    }

    fn description(&self) -> &str {
        "Execute a SQL query against the database and return the resulting columns and rows. \
         Check the schema first; results are capped and marked truncated when cut short."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The SQL query to execute"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
        let args: ExecuteSqlArgs = parse_args(self.name(), args)?;
        self.run(&args.query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::fixture;

    #[tokio::test]
    async fn test_rows_and_columns() {
        let tool = ExecuteSqlTool::new(fixture(), 100);
        let out = tool
            .execute(
                json!({"query": "SELECT name FROM customers ORDER BY id"}),
                &ToolContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(out["columns"], json!(["name"]));
        assert_eq!(out["rows"], json!([["Ada"], ["Linus"]]));
        assert_eq!(out["row_count"], 2);
        assert_eq!(out["truncated"], false);
        assert_eq!(out["message"], "Query executed successfully. 2 rows returned.");
    }

    #[tokio::test]
    async fn test_truncated_message() {
        let tool = ExecuteSqlTool::new(fixture(), 1);
        let out = tool.run("SELECT id FROM orders").await.unwrap();
        assert_eq!(out["row_count"], 1);
        assert_eq!(out["truncated"], true);
        assert!(out["message"].as_str().unwrap().contains("first 1 rows"));
    }

    #[tokio::test]
    async fn test_sql_error_is_data() {
        let tool = ExecuteSqlTool::new(fixture(), 100);
        let out = tool.run("SELECT * FROM nonexistent").await.unwrap();
        assert!(out["error"].as_str().unwrap().contains("no such table"));
        assert_eq!(out["query"], "SELECT * FROM nonexistent");
    }

    #[tokio::test]
    async fn test_missing_query_argument() {
        let tool = ExecuteSqlTool::new(fixture(), 100);
        assert!(tool
            .execute(json!({}), &ToolContext::new())
            .await
            .is_err());
        assert!(tool.run("   ").await.is_err());
    }
}

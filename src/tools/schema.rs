//! `get_schema`: database schema introspection for the model.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::SchemaToolConfig;
use crate::db::Database;
use crate::error::Result;

use super::{parse_args, Tool, ToolContext};

/// Table name meaning "the whole database".
pub const ALL_TABLES: &str = "all";

#[derive(Debug, Deserialize)]
struct GetSchemaArgs {
    #[serde(default = "default_table_name")]
    table_name: String,
}

fn default_table_name() -> String {
    ALL_TABLES.to_string()
}

/// Reports tables, columns, foreign keys and indexes.
pub struct GetSchemaTool {
    db: Database,
    options: SchemaToolConfig,
}

impl GetSchemaTool {
    pub fn new(db: Database, options: SchemaToolConfig) -> Self {
        Self { db, options }
    }

    /// Build the tool payload for `table_name` (`"all"` for every table).
    ///
    /// An unknown table is a data result carrying the available table names,
    /// not an error.
    pub async fn describe(&self, table_name: &str) -> Result<Value> {
        let schema = self.db.schema_async(self.options.clone()).await?;
        let table_name = table_name.trim();

        if table_name.is_empty() || table_name.eq_ignore_ascii_case(ALL_TABLES) {
            return Ok(json!({
                "message": "Schema retrieved successfully for sqlite database.",
                "schema": schema,
            }));
        }

        match schema.filter_table(table_name) {
            Some(filtered) => Ok(json!({
                "message": format!("Schema retrieved successfully for table {}", table_name),
                "schema": filtered,
            })),
            None => Ok(json!({
                "error": format!("Table '{}' not found in the database schema.", table_name),
                "available_tables": schema.table_names(),
            })),
        }
    }
}

#[async_trait]
impl Tool for GetSchemaTool {
    fn name(&self) -> &str {
        "get_schema"
    }

    fn description(&self) -> &str {
        "Get the schema of the database. Pass a table name to get one table's columns, \
         foreign keys and indexes, or 'all' (the default) for every table."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "table_name": {
                    "type": "string",
                    "description": "Table to describe, or 'all' for the whole database",
                    "default": ALL_TABLES
                }
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
        let args: GetSchemaArgs = parse_args(self.name(), args)?;
        self.describe(&args.table_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::fixture;

    fn tool() -> GetSchemaTool {
        GetSchemaTool::new(fixture(), SchemaToolConfig::default())
    }

    #[tokio::test]
    async fn test_all_tables_by_default() {
        let out = tool().execute(json!({}), &ToolContext::new()).await.unwrap();
        assert_eq!(
            out["message"],
            "Schema retrieved successfully for sqlite database."
        );
        let tables = out["schema"]["tables"].as_array().unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0]["columns"][0]["type"], "INTEGER");
    }

    #[tokio::test]
    async fn test_single_table_case_insensitive() {
        let out = tool()
            .execute(json!({"table_name": "ORDERS"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(out["message"], "Schema retrieved successfully for table ORDERS");
        let tables = out["schema"]["tables"].as_array().unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0]["name"], "orders");
        assert_eq!(tables[0]["foreign_keys"][0]["to_table"], "customers");
        assert!(out["schema"]["indexes"]
            .as_array()
            .unwrap()
            .iter()
            .all(|i| i["table"] == "orders"));
    }

    #[tokio::test]
    async fn test_unknown_table_lists_available() {
        let out = tool()
            .execute(json!({"table_name": "NoSuchTable"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(
            out["error"],
            "Table 'NoSuchTable' not found in the database schema."
        );
        assert_eq!(out["available_tables"], json!(["customers", "orders"]));
    }

    #[tokio::test]
    async fn test_rejects_wrong_argument_type() {
        let err = tool()
            .execute(json!({"table_name": 7}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid arguments for get_schema"));
    }
}

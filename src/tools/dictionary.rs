//! `get_field_definition`: business glossary lookup.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::dictionary::{DataDictionary, DICTIONARY_COLUMNS};
use crate::error::Result;

use super::{parse_args, Tool, ToolContext};

#[derive(Debug, Deserialize)]
struct FieldDefinitionArgs {
    column_name: String,
}

pub struct GetFieldDefinitionTool {
    dictionary: Arc<DataDictionary>,
}

impl GetFieldDefinitionTool {
    pub fn new(dictionary: Arc<DataDictionary>) -> Self {
        Self { dictionary }
    }

    /// Look up `column_name` and build the tool payload.
    pub fn lookup(&self, column_name: &str) -> Value {
        if self.dictionary.is_missing() {
            let path = self
                .dictionary
                .source()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return json!({
                "error": format!("Error reading data dictionary: file not found: {}", path),
            });
        }

        let results = self.dictionary.lookup(column_name);
        if results.is_empty() {
            return json!({
                "error": format!("Field '{}' not found in data dictionary", column_name),
            });
        }

        json!({
            "message": format!("{} results found:", results.len()),
            "row_count": results.len(),
            "columns": DICTIONARY_COLUMNS,
            "results": results,
        })
    }
}

#[async_trait]
impl Tool for GetFieldDefinitionTool {
    fn name(&self) -> &str {
        "get_field_definition"
    }

    fn description(&self) -> &str {
        "Get the business definition of a database field from the data dictionary. \
         Matches any column whose name contains the given text, ignoring case."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "column_name": {
                    "type": "string",
                    "description": "Column name (or part of it), e.g. ACCT_ID"
                }
            },
            "required": ["column_name"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
        let args: FieldDefinitionArgs = parse_args(self.name(), args)?;
        Ok(self.lookup(&args.column_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::FieldDefinition;
    use std::path::Path;

    fn entry(table: &str, column: &str, key: &str) -> FieldDefinition {
        FieldDefinition {
            domain: "Account".into(),
            table: table.into(),
            column: column.into(),
            key_type: key.into(),
            description: format!("{} in {}", column, table),
        }
    }

    fn tool() -> GetFieldDefinitionTool {
        GetFieldDefinitionTool::new(Arc::new(DataDictionary::from_entries(vec![
            entry("CI_ACCT", "ACCT_ID", "PK"),
            entry("CI_BILL", "ACCT_ID", "FK"),
            entry("CI_ACCT", "SETUP_DT", ""),
        ])))
    }

    #[tokio::test]
    async fn test_results_payload() {
        let out = tool()
            .execute(json!({"column_name": "acct"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(out["message"], "2 results found:");
        assert_eq!(out["row_count"], 2);
        assert_eq!(out["columns"][3], "Key_Type");
        assert_eq!(out["results"][1]["Table"], "CI_BILL");
    }

    #[test]
    fn test_not_found() {
        let out = tool().lookup("PREM_ID");
        assert_eq!(out["error"], "Field 'PREM_ID' not found in data dictionary");
    }

    #[test]
    fn test_missing_dictionary_file() {
        let dict = DataDictionary::load(Path::new("/nonexistent/dict.csv")).unwrap();
        let out = GetFieldDefinitionTool::new(Arc::new(dict)).lookup("ACCT_ID");
        assert!(out["error"]
            .as_str()
            .unwrap()
            .contains("/nonexistent/dict.csv"));
    }
}

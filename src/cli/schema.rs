//! Schema and field lookup command handlers.
//!
//! Both go straight through the tool registry, so the output is exactly
//! what the model sees.

use std::path::Path;

use anyhow::Result;
use serde_json::json;

use sqlmatic::tools::schema::ALL_TABLES;

use super::common::{build_tools, load_config, print_json};

pub(crate) async fn cmd_schema(config_path: &Path, table: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let tools = build_tools(&config)?;
    let table = table.unwrap_or_else(|| ALL_TABLES.to_string());

    let payload = tools
        .execute("get_schema", json!({ "table_name": table }))
        .await;
    print_json(&payload)
}

pub(crate) async fn cmd_field(config_path: &Path, column: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let tools = build_tools(&config)?;

    let payload = tools
        .execute("get_field_definition", json!({ "column_name": column }))
        .await;
    print_json(&payload)
}

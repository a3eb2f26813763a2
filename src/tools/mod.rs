//! Tools module - database tools exposed to the model through function calling
//!
//! # Overview
//!
//! - `Tool` trait: the interface every tool implements
//! - `ToolContext`: execution context (session id, cancellation token)
//! - `ToolRegistry`: name -> handler dispatch with structured error results
//!
//! # Built-in Tools
//!
//! - `GetSchemaTool` (`get_schema`): tables, columns, foreign keys, indexes
//! - `ExecuteSqlTool` (`execute_sql_query`): run a query, capped rows
//! - `GetFieldDefinitionTool` (`get_field_definition`): glossary lookup

pub mod dictionary;
mod registry;
pub mod schema;
pub mod sql;
mod types;

use std::sync::Arc;

pub use dictionary::GetFieldDefinitionTool;
pub use registry::ToolRegistry;
pub use schema::GetSchemaTool;
pub use sql::{ExecuteSqlTool, EXECUTE_SQL_TOOL};
pub use types::{parse_args, Tool, ToolContext};

use crate::config::DatabaseConfig;
use crate::db::Database;
use crate::dictionary::DataDictionary;

/// Registry holding the three database tools.
pub fn database_registry(
    db: &Database,
    cfg: &DatabaseConfig,
    dictionary: Arc<DataDictionary>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(GetSchemaTool::new(db.clone(), cfg.schema.clone())));
    registry.register(Box::new(ExecuteSqlTool::new(db.clone(), cfg.max_rows)));
    registry.register(Box::new(GetFieldDefinitionTool::new(dictionary)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::fixture;

    #[test]
    fn test_database_registry_has_all_tools() {
        let registry = database_registry(
            &fixture(),
            &DatabaseConfig::default(),
            Arc::new(DataDictionary::default()),
        );
        assert_eq!(
            registry.names(),
            vec!["execute_sql_query", "get_field_definition", "get_schema"]
        );
    }
}

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::validate::{has_errors, validate_config, DiagnosticLevel};
use crate::config::Config;
use crate::error::SqlMaticError;
use crate::eval::load_questions;
use crate::tools::schema::ALL_TABLES;

use super::AppState;

/// Error response body: `{"error": "..."}` with a status code.
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<Value>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<SqlMaticError> for ApiError {
    fn from(err: SqlMaticError) -> Self {
        let status = match &err {
            SqlMaticError::NotFound(_) | SqlMaticError::Evaluation(_) => StatusCode::NOT_FOUND,
            SqlMaticError::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "error": self.message });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn schema_all(State(state): State<AppState>) -> Response {
    schema_response(&state, ALL_TABLES).await
}

pub async fn schema_table(State(state): State<AppState>, Path(table): Path<String>) -> Response {
    schema_response(&state, &table).await
}

async fn schema_response(state: &AppState, table: &str) -> Response {
    let payload = state
        .agent
        .call_tool("get_schema", json!({ "table_name": table }))
        .await;
    let status = if payload.get("available_tables").is_some() {
        StatusCode::NOT_FOUND
    } else if payload.get("error").is_some() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(payload)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct EvaluateParams {
    num_queries: Option<usize>,
}

pub async fn evaluate(
    State(state): State<AppState>,
    Query(params): Query<EvaluateParams>,
) -> ApiResult<Json<Value>> {
    let path = state.config.questions_path();
    let questions = load_questions(&path)?;
    let limit = params
        .num_queries
        .or(Some(state.config.evaluation.default_limit));
    info!(questions = questions.len(), limit = ?limit, "Evaluation requested");

    let report = state.harness.evaluate(questions, limit).await;
    Ok(Json(serde_json::to_value(report).map_err(SqlMaticError::from)?))
}

pub async fn get_config(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let value: Value = if state.config_path.exists() {
        let raw = tokio::fs::read_to_string(&state.config_path)
            .await
            .map_err(SqlMaticError::from)?;
        serde_json::from_str(&raw).map_err(SqlMaticError::from)?
    } else {
        serde_json::to_value(state.config.as_ref()).map_err(SqlMaticError::from)?
    };
    let content = serde_json::to_string_pretty(&value).map_err(SqlMaticError::from)?;
    Ok(Json(json!({
        "content": content,
        "path": state.config_path.display().to_string(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct SaveConfigRequest {
    content: String,
}

/// Validate and save an edited config file. Takes effect on restart.
pub async fn save_config(
    State(state): State<AppState>,
    Json(req): Json<SaveConfigRequest>,
) -> ApiResult<Json<Value>> {
    let value: Value = serde_json::from_str(&req.content).map_err(|e| {
        ApiError::new(StatusCode::BAD_REQUEST, format!("Config is not valid JSON: {}", e))
    })?;

    let diagnostics = validate_config(&value);
    let to_strings = |level: DiagnosticLevel| -> Vec<String> {
        diagnostics
            .iter()
            .filter(|d| d.level == level)
            .map(|d| d.to_string())
            .collect()
    };
    if has_errors(&diagnostics) {
        return Err(
            ApiError::new(StatusCode::BAD_REQUEST, "Config failed validation")
                .with_details(json!(to_strings(DiagnosticLevel::Error))),
        );
    }

    let config: Config = serde_json::from_value(value).map_err(SqlMaticError::from)?;
    config
        .save_to_path(&state.config_path)
        .map_err(ApiError::from)?;

    let warnings = to_strings(DiagnosticLevel::Warn);
    if !warnings.is_empty() {
        warn!(count = warnings.len(), "Saved config with warnings");
    }
    info!(path = %state.config_path.display(), "Config saved");
    Ok(Json(json!({
        "status": "saved",
        "warnings": warnings,
        "restart_required": true,
    })))
}

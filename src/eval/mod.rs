//! Evaluation harness: replay a question set and score the produced SQL.
//!
//! Every question runs in a fresh `eval-<uuid>` session on its own task,
//! using the evaluator prompt. A failing or panicking item is recorded as a
//! failed case and the rest of the batch carries on.

pub mod sql;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::{AgentLoop, AgentPurpose};
use crate::config::EvaluationConfig;
use crate::error::{Result, SqlMaticError};

pub use sql::{extract_sql, last_executed_query, normalize_sql, sql_similarity};

/// One item of the question set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationQuestion {
    /// Defaults to the 1-based position in the file
    #[serde(default)]
    pub query_id: Option<u64>,
    pub query: String,
    pub ground_truth_sql: String,
}

/// Outcome of one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationCase {
    pub query_id: u64,
    pub query: String,
    pub ground_truth_sql: String,
    pub assistant_sql: String,
    pub similarity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate scores for a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    pub total_queries: usize,
    pub successful_queries: usize,
    pub failed_queries: usize,
    pub average_similarity: f64,
    pub median_similarity: f64,
    pub min_similarity: f64,
    pub max_similarity: f64,
    /// Percentage, 0-100
    pub success_rate: f64,
    pub similarities: Vec<EvaluationCase>,
    pub failed_cases: Vec<EvaluationCase>,
    /// Wall-clock seconds
    pub execution_time: f64,
}

impl EvaluationReport {
    /// Aggregate `cases`. A case succeeds when it has no error and reaches
    /// `pass_threshold`.
    pub fn from_cases(cases: Vec<EvaluationCase>, pass_threshold: f64, execution_time: f64) -> Self {
        let total = cases.len();
        let mut scores: Vec<f64> = cases.iter().map(|c| c.similarity).collect();
        scores.sort_by(|a, b| a.total_cmp(b));

        let (average, median, min, max) = if scores.is_empty() {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            let n = scores.len();
            let median = if n % 2 == 0 {
                (scores[n / 2 - 1] + scores[n / 2]) / 2.0
            } else {
                scores[n / 2]
            };
            (
                scores.iter().sum::<f64>() / n as f64,
                median,
                scores[0],
                scores[n - 1],
            )
        };

        let failed_cases: Vec<EvaluationCase> = cases
            .iter()
            .filter(|c| c.error.is_some() || c.similarity < pass_threshold)
            .cloned()
            .collect();
        let successful = total - failed_cases.len();

        Self {
            total_queries: total,
            successful_queries: successful,
            failed_queries: failed_cases.len(),
            average_similarity: average,
            median_similarity: median,
            min_similarity: min,
            max_similarity: max,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64 * 100.0
            },
            similarities: cases,
            failed_cases,
            execution_time,
        }
    }
}

/// Load a question set from a JSON array file.
pub fn load_questions(path: &Path) -> Result<Vec<EvaluationQuestion>> {
    if !path.exists() {
        return Err(SqlMaticError::Evaluation(format!(
            "Question set not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        SqlMaticError::Evaluation(format!("Invalid question set {}: {}", path.display(), e))
    })
}

/// Runs question sets through the agent with the evaluator prompt.
#[derive(Clone)]
pub struct EvaluationHarness {
    agent: Arc<AgentLoop>,
    pass_threshold: f64,
    concurrency: usize,
}

impl EvaluationHarness {
    pub fn new(agent: Arc<AgentLoop>, cfg: &EvaluationConfig) -> Self {
        Self {
            agent,
            pass_threshold: cfg.pass_threshold,
            concurrency: cfg.concurrency.max(1),
        }
    }

    pub fn pass_threshold(&self) -> f64 {
        self.pass_threshold
    }

    /// Evaluate the first `limit` questions (all when `None` or 0).
    pub async fn evaluate(
        &self,
        questions: Vec<EvaluationQuestion>,
        limit: Option<usize>,
    ) -> EvaluationReport {
        let start = Instant::now();
        let take = match limit {
            Some(n) if n > 0 => n,
            _ => questions.len(),
        };

        let items: Vec<(u64, EvaluationQuestion)> = questions
            .into_iter()
            .take(take)
            .enumerate()
            .map(|(i, q)| (q.query_id.unwrap_or(i as u64 + 1), q))
            .collect();
        info!(items = items.len(), concurrency = self.concurrency, "Starting evaluation");

        let cases: Vec<EvaluationCase> = stream::iter(items)
            .map(|(query_id, question)| self.spawn_item(query_id, question))
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = EvaluationReport::from_cases(
            cases,
            self.pass_threshold,
            start.elapsed().as_secs_f64(),
        );
        info!(
            total = report.total_queries,
            successful = report.successful_queries,
            average_similarity = report.average_similarity,
            execution_time = report.execution_time,
            "Evaluation finished"
        );
        report
    }

    /// Run one question on its own task so a panic stays contained.
    async fn spawn_item(&self, query_id: u64, question: EvaluationQuestion) -> EvaluationCase {
        let agent = Arc::clone(&self.agent);
        let query = question.query.clone();
        let ground_truth_sql = question.ground_truth_sql.clone();
        let threshold = self.pass_threshold;
        let session_id = format!("eval-{}", uuid::Uuid::new_v4());

        let task_agent = Arc::clone(&agent);
        let task_session = session_id.clone();
        let handle = tokio::spawn(async move {
            evaluate_item(&task_agent, task_session, query_id, question, threshold).await
        });

        match handle.await {
            Ok(case) => case,
            Err(e) => {
                let reason = if e.is_panic() {
                    "evaluation task panicked".to_string()
                } else {
                    format!("evaluation task failed: {}", e)
                };
                warn!(query_id, error = %reason, "Evaluation item aborted");
                // The task never reached its own cleanup.
                if let Err(e) = agent.router().evict(&session_id).await {
                    warn!(session_id = %session_id, error = %e, "Failed to evict evaluation session");
                }
                EvaluationCase {
                    query_id,
                    query,
                    ground_truth_sql,
                    assistant_sql: String::new(),
                    similarity: 0.0,
                    error: Some(reason),
                }
            }
        }
    }
}

async fn evaluate_item(
    agent: &AgentLoop,
    session_id: String,
    query_id: u64,
    question: EvaluationQuestion,
    threshold: f64,
) -> EvaluationCase {
    let outcome = agent
        .run_with_purpose(
            &session_id,
            &question.query,
            AgentPurpose::Evaluator,
            CancellationToken::new(),
        )
        .await;

    let history = match agent.sessions().get(&session_id).await {
        Ok(Some(session)) => session.messages,
        _ => Vec::new(),
    };
    let last_query = last_executed_query(&history);
    if let Err(e) = agent.router().evict(&session_id).await {
        warn!(session_id = %session_id, error = %e, "Failed to evict evaluation session");
    }

    let (assistant_sql, error) = match outcome {
        Ok(answer) => (extract_sql(&answer, last_query.as_deref()), None),
        Err(e) => (last_query.unwrap_or_default(), Some(e.to_string())),
    };
    let similarity = if error.is_some() {
        0.0
    } else {
        sql_similarity(&assistant_sql, &question.ground_truth_sql)
    };

    info!(
        query_id,
        similarity,
        passed = error.is_none() && similarity >= threshold,
        "Evaluated question"
    );

    EvaluationCase {
        query_id,
        query: question.query,
        ground_truth_sql: question.ground_truth_sql,
        assistant_sql,
        similarity,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn case(id: u64, similarity: f64, error: Option<&str>) -> EvaluationCase {
        EvaluationCase {
            query_id: id,
            query: format!("q{}", id),
            ground_truth_sql: "SELECT 1".into(),
            assistant_sql: "SELECT 1".into(),
            similarity,
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_report_aggregates() {
        let report = EvaluationReport::from_cases(
            vec![
                case(1, 1.0, None),
                case(2, 0.5, None),
                case(3, 0.9, None),
                case(4, 0.0, Some("boom")),
            ],
            0.8,
            1.5,
        );
        assert_eq!(report.total_queries, 4);
        assert_eq!(report.successful_queries, 2);
        assert_eq!(report.failed_queries, 2);
        assert_eq!(report.success_rate, 50.0);
        assert_eq!(report.min_similarity, 0.0);
        assert_eq!(report.max_similarity, 1.0);
        assert!((report.median_similarity - 0.7).abs() < 1e-9);
        assert!((report.average_similarity - 0.6).abs() < 1e-9);
        assert_eq!(
            report.failed_cases.iter().map(|c| c.query_id).collect::<Vec<_>>(),
            vec![2, 4]
        );
        assert_eq!(report.similarities.len(), 4);
    }

    #[test]
    fn test_empty_report() {
        let report = EvaluationReport::from_cases(Vec::new(), 0.8, 0.0);
        assert_eq!(report.total_queries, 0);
        assert_eq!(report.success_rate, 0.0);
        assert_eq!(report.average_similarity, 0.0);
    }

    #[test]
    fn test_case_omits_empty_error() {
        let json = serde_json::to_value(case(1, 1.0, None)).unwrap();
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_load_questions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"query_id": 7, "query": "How many?", "ground_truth_sql": "SELECT COUNT(*) FROM t"}},
                {{"query": "Names?", "ground_truth_sql": "SELECT name FROM t"}}]"#
        )
        .unwrap();
        let questions = load_questions(file.path()).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].query_id, Some(7));
        assert_eq!(questions[1].query_id, None);
    }

    #[test]
    fn test_load_questions_missing_file() {
        let err = load_questions(Path::new("/nonexistent/questions.json")).unwrap_err();
        assert!(matches!(err, SqlMaticError::Evaluation(_)));
    }
}

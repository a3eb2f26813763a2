//! Evaluate command handler.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use sqlmatic::eval::{load_questions, EvaluationHarness};

use super::common::{create_agent, load_config};

/// Run the question set and print (or write) the JSON report.
pub(crate) async fn cmd_evaluate(
    config_path: &Path,
    questions: Option<PathBuf>,
    limit: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let questions_path = questions.unwrap_or_else(|| config.questions_path());
    let questions = load_questions(&questions_path)
        .with_context(|| format!("Failed to load questions from {}", questions_path.display()))?;

    let agent = create_agent(&config).await?;
    let harness = EvaluationHarness::new(agent, &config.evaluation);
    let limit = limit.or(Some(config.evaluation.default_limit));

    let report = harness.evaluate(questions, limit).await;
    let json = serde_json::to_string_pretty(&report)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "{}/{} successful ({:.1}%), average similarity {:.3}. Report written to {}",
                report.successful_queries,
                report.total_queries,
                report.success_rate,
                report.average_similarity,
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

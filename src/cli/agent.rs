//! Agent command handler (single message + interactive mode).

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use sqlmatic::agent::AgentPurpose;
use sqlmatic::session::SessionRouter;

use super::common::{create_agent, load_config};

const HELP: &str = "\
Ask a question about the database, e.g. \"How many orders shipped last month?\"
Commands:
  help          show this message
  exit, quit    leave the session";

/// `--session` wins over the configured default; a blank choice gets a fresh id.
fn session_for(router: &SessionRouter, requested: Option<&str>, default_id: &str) -> String {
    router.resolve(requested.or(Some(default_id)))
}

/// Interactive or single-message agent mode.
pub(crate) async fn cmd_agent(
    config_path: &Path,
    message: Option<String>,
    session: Option<String>,
    evaluator: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let agent = create_agent(&config).await?;

    let session_id = session_for(
        agent.router(),
        session.as_deref(),
        &config.agents.defaults.default_session_id,
    );
    let purpose = if evaluator {
        AgentPurpose::Evaluator
    } else {
        AgentPurpose::Regular
    };

    if let Some(msg) = message {
        match agent
            .run_with_purpose(&session_id, &msg, purpose, CancellationToken::new())
            .await
        {
            Ok(response) => println!("{}", response),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    println!("SQLMatic ({} assistant, session '{}')", purpose, session_id);
    println!("Type your question and press Enter. Type 'help' for commands, 'quit' or 'exit' to stop.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => {
                // EOF
                println!();
                break;
            }
            Ok(_) => {
                let input = input.trim();
                if input.is_empty() {
                    continue;
                }
                match input {
                    "quit" | "exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    "help" => {
                        println!("{}", HELP);
                        println!();
                        continue;
                    }
                    _ => {}
                }

                // Ctrl-C abandons the current question, not the REPL.
                let cancel = CancellationToken::new();
                let guard = cancel.clone();
                let ctrl_c = tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        guard.cancel();
                    }
                });
                let result = agent
                    .run_with_purpose(&session_id, input, purpose, cancel)
                    .await;
                ctrl_c.abort();

                match result {
                    Ok(response) => {
                        println!();
                        println!("{}", response);
                        println!();
                    }
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        eprintln!();
                    }
                }
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }

    Ok(())
}

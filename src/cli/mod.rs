//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod agent;
pub mod common;
pub mod config;
pub mod evaluate;
pub mod gateway;
pub mod schema;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sqlmatic")]
#[command(version)]
#[command(about = "Ask questions about a SQLite database in plain language", long_about = None)]
struct Cli {
    /// Config file (defaults to $SQLMATIC_CONFIG or ~/.sqlmatic/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant (single message or interactive)
    Agent {
        /// Send one message and exit
        #[arg(short, long)]
        message: Option<String>,
        /// Session to continue (defaults to agents.defaults.default_session_id)
        #[arg(long)]
        session: Option<String>,
        /// Use the evaluator prompt (answers with bare SQL)
        #[arg(long)]
        evaluator: bool,
    },
    /// Start the HTTP and websocket gateway
    Gateway {
        /// Override gateway.host
        #[arg(long)]
        host: Option<String>,
        /// Override gateway.port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Grade the assistant against a question set
    Evaluate {
        /// Question set (defaults to evaluation.questions_path)
        #[arg(long, value_name = "PATH")]
        questions: Option<PathBuf>,
        /// Evaluate only the first N questions
        #[arg(long)]
        limit: Option<usize>,
        /// Write the JSON report to a file instead of stdout
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Print the database schema ("all" tables by default)
    Schema {
        /// Table name
        table: Option<String>,
    },
    /// Look up a column in the data dictionary
    Field {
        /// Column name or fragment
        column: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Check configuration for errors and warnings
    Check,
    /// Print the effective configuration (file + environment overrides)
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Entry point for the CLI, called from main().
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = common::config_path(cli.config.as_deref());

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Agent {
            message,
            session,
            evaluator,
        }) => {
            agent::cmd_agent(&config_path, message, session, evaluator).await?;
        }
        Some(Commands::Gateway { host, port }) => {
            gateway::cmd_gateway(&config_path, host, port).await?;
        }
        Some(Commands::Evaluate {
            questions,
            limit,
            output,
        }) => {
            evaluate::cmd_evaluate(&config_path, questions, limit, output).await?;
        }
        Some(Commands::Schema { table }) => {
            schema::cmd_schema(&config_path, table).await?;
        }
        Some(Commands::Field { column }) => {
            schema::cmd_field(&config_path, &column).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(&config_path, action).await?;
        }
    }

    Ok(())
}

fn cmd_version() {
    println!("sqlmatic {}", env!("CARGO_PKG_VERSION"));
}

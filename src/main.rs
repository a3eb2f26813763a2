//! SQLMatic CLI: natural-language questions over a SQLite database
//!
//! All CLI logic lives in the `cli` module. This file is just the entry point.

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A .env file next to the working directory may carry provider keys.
    let _ = dotenvy::dotenv();
    cli::run().await
}

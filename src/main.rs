//! # cpms entry point
//!
//! Parses the command line, runs one command and prints its JSON result.

use clap::Parser;

use cpms::cli::{self, Cli};

fn main() -> anyhow::Result<()> {
    cpms::init_tracing();

    tracing::debug!("{} v{}", cpms::config::APP_NAME, cpms::config::APP_VERSION);

    let cli = Cli::parse();
    let output = cli::run(cli)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use cqlfilter::app::{Cli, Outcome, run};
use cqlfilter::config::ParserOptions;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("CLI: Failed to initialize thread pool")?;
    }

    let options = ParserOptions::load(cli.config.as_deref())
        .context("Config: Failed to load parser options")?;
    tracing::info!(
        "Parser options: max_depth {}, default unit {}",
        options.max_depth,
        options.default_unit.keyword()
    );

    match run(&cli, options)? {
        Outcome::Success => Ok(ExitCode::SUCCESS),
        Outcome::Failure => Ok(ExitCode::FAILURE),
    }
}

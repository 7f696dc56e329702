//! Runs one corpus-size estimation experiment from the command line.
//!
//! Usage: `fathom <experiment> [iterations]`, for example `fathom solr-mhr 5`.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use fathom::{Executor, FactoryConfig, build_experiment};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let experiment = args
        .get(1)
        .context("usage: fathom <experiment> [iterations]")?;
    let iterations: usize = match args.get(2) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid iteration count \"{raw}\""))?,
        None => 1,
    };

    let bundle = build_experiment(experiment, &FactoryConfig::default())
        .with_context(|| format!("cannot build experiment \"{experiment}\""))?;
    let mut executor = Executor::new(bundle.estimator, bundle.logger, iterations);
    let estimates = executor
        .execute()
        .await
        .with_context(|| format!("experiment \"{experiment}\" aborted"))?;
    tracing::info!(?estimates, "experiment finished");
    Ok(())
}

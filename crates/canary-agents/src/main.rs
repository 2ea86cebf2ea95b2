use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use canary_agents::config::{AnalysisConfig, EngineConfig};
use canary_agents::fetch::DirLogFetcher;
use canary_agents::CanaryAnalyzer;
use clap::Parser;
use coordination::verdict::MeasurementPhase;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Run one canary analysis and print the measurement as JSON.
#[derive(Debug, Parser)]
#[command(name = "canary-agents", version)]
struct Args {
    /// Analysis configuration as a JSON document.
    #[arg(long, default_value = "{}")]
    config: String,

    /// Namespace the stable and canary pods run in.
    #[arg(long, default_value = "default")]
    namespace: String,

    /// Directory holding `{namespace}/{selector}.log` files.
    #[arg(long, default_value = "logs")]
    logs_dir: PathBuf,
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL`, otherwise `info`.
fn init_tracing() {
    let mut invalid_level = None;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match std::env::var("LOG_LEVEL") {
            Ok(level) => {
                let level = level.trim().to_ascii_lowercase();
                if LOG_LEVELS.contains(&level.as_str()) {
                    EnvFilter::new(level)
                } else {
                    invalid_level = Some(level);
                    EnvFilter::new("info")
                }
            }
            Err(_) => EnvFilter::new("info"),
        }
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(level) = invalid_level {
        warn!(level = %level, "Invalid LOG_LEVEL, using info");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let engine = EngineConfig::default();
    engine
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid engine configuration: {e}"))?;
    let analysis =
        AnalysisConfig::from_json(&args.config).context("Failed to parse analysis config")?;

    info!(
        mode = %analysis.mode(),
        model = analysis.model(),
        namespace = %args.namespace,
        agent_url = %engine.agent.base_url,
        metadata = ?analysis.metadata(),
        "Canary analysis starting"
    );

    let fetcher = Arc::new(DirLogFetcher::new(&args.logs_dir));
    let analyzer = CanaryAnalyzer::from_config(&engine, fetcher)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling analysis");
            ctrl_c.cancel();
        }
    });

    let measurement = analyzer.run(&analysis, &args.namespace, &cancel).await;
    println!("{}", serde_json::to_string_pretty(&measurement)?);

    if measurement.phase == MeasurementPhase::Error {
        std::process::exit(1);
    }
    Ok(())
}

//! backtest-runner: batch entry point for the walk-forward engine.
//!
//! Wires the SQLite factor/price tables, the run tables, and the prediction
//! service into one engine invocation, prints the textual report, and
//! optionally writes the archival JSON snapshot.
//!
//! Usage:
//!   cargo run -p backtest-runner -- --model-version ensemble-v3
//!   cargo run -p backtest-runner -- --forward-days 21 --min-tickers 10
//!   cargo run -p backtest-runner -- --dry-run --snapshot out/run.json

use std::sync::Arc;

use async_trait::async_trait;
use model_client::{ModelClient, ModelClientConfig};
use market_store::MarketDb;
use research_core::{
    BacktestConfig, MonthlyMetrics, Outcome, ResearchResult, RunStore, RunSummary,
};
use run_store::RunDb;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;
use walkforward_engine::{render_report, RunSnapshot, WalkForwardEngine};

/// Discards all writes; used for --dry-run.
struct NoopRunStore;

#[async_trait]
impl RunStore for NoopRunStore {
    async fn save_outcomes(&self, _run_id: &str, _outcomes: &[Outcome]) -> ResearchResult<()> {
        Ok(())
    }
    async fn save_monthly(&self, _run_id: &str, _monthly: &[MonthlyMetrics]) -> ResearchResult<()> {
        Ok(())
    }
    async fn save_summary(&self, _summary: &RunSummary) -> ResearchResult<()> {
        Ok(())
    }
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backtest_runner=info,walkforward_engine=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let snapshot_path = arg_value(&args, "--snapshot");

    let mut config = BacktestConfig::default();
    if let Some(days) = arg_value(&args, "--forward-days") {
        config.forward_days = days.parse()?;
    }
    if let Some(min) = arg_value(&args, "--min-tickers") {
        config.min_tickers_per_month = min.parse()?;
    }
    if let Some(version) = arg_value(&args, "--model-version") {
        config.model_version = version;
    }

    let database_url = arg_value(&args, "--db")
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://research.db".to_string());
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect(&database_url)
        .await?;

    let market = Arc::new(MarketDb::new(pool.clone()));

    let runs: Arc<dyn RunStore> = if dry_run {
        info!("dry run: results will not be persisted");
        Arc::new(NoopRunStore)
    } else {
        let run_db = RunDb::new(pool.clone());
        run_db.init_schema().await?;
        Arc::new(run_db)
    };

    let model_config = match arg_value(&args, "--model-url") {
        Some(base_url) => ModelClientConfig {
            base_url,
            ..ModelClientConfig::default()
        },
        None => ModelClientConfig::default(),
    };
    let model = Arc::new(ModelClient::new(model_config));

    info!(
        database = %database_url,
        model_version = %config.model_version,
        forward_days = config.forward_days,
        min_tickers = config.min_tickers_per_month,
        "launching walk-forward backtest"
    );

    let engine = WalkForwardEngine::new(market.clone(), market, model, runs, config);
    let output = engine.run().await?;

    println!("{}", render_report(&output.summary, &output.monthly));

    if let Some(path) = snapshot_path {
        let snapshot = RunSnapshot::new(output.summary, output.monthly);
        std::fs::write(&path, serde_json::to_string_pretty(&snapshot)?)?;
        info!(path = %path, "snapshot written");
    }

    Ok(())
}

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use leadflow::config::EngineConfig;
use leadflow::followup::FollowupScheduler;
use leadflow::outbound::LogSender;
use leadflow::store::{LeadStore, LibSqlStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = EngineConfig::from_env();

    let db_path =
        std::env::var("LEADFLOW_DB_PATH").unwrap_or_else(|_| "./data/leadflow.db".to_string());
    let store: Arc<dyn LeadStore> = Arc::new(
        LibSqlStore::new_local(Path::new(&db_path))
            .await
            .with_context(|| format!("opening database at {db_path}"))?,
    );

    // Every 10 minutes by default; any worker may run any cycle.
    let cron_expr =
        std::env::var("LEADFLOW_CYCLE_CRON").unwrap_or_else(|_| "0 */10 * * * *".to_string());
    let schedule = cron::Schedule::from_str(&cron_expr)
        .with_context(|| format!("invalid LEADFLOW_CYCLE_CRON: {cron_expr}"))?;

    let worker_id = format!(
        "{}-{}",
        std::env::var("HOSTNAME").unwrap_or_else(|_| "worker".to_string()),
        std::process::id()
    );
    let scheduler = FollowupScheduler::new(store, Arc::new(LogSender), config, &worker_id);

    tracing::info!(worker_id, cron = %cron_expr, db = %db_path, "Follow-up worker started");

    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            anyhow::bail!("cron schedule {cron_expr} yields no future runs");
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        if let Err(err) = scheduler.run_cycle(Utc::now()).await {
            tracing::error!(%err, "Follow-up cycle failed");
        }
    }
}

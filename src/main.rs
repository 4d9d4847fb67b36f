use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use whichgame::{
    config::Config,
    db::{create_pool, run_migrations, PgGameStore},
    services::run_batch,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    telemetry::init_tracing()?;

    let pool = create_pool(&config.database_url, config.max_connections).await?;
    if config.run_migrations {
        run_migrations(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    // Ctrl-C stops the run between games
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current game");
            on_signal.cancel();
        }
    });

    let store = Arc::new(PgGameStore::new(pool));
    let report = run_batch(store, &config.batch_options(), cancel).await?;

    if !report.failures.is_empty() {
        tracing::warn!(
            failed = report.failures.len(),
            "Some games kept their previous recommendations"
        );
    }

    println!("Done. {} games updated.", report.updated);
    Ok(())
}

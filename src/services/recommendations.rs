use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    db::GameStore,
    error::{AppError, AppResult},
    models::{GameId, MIN_RATING_COUNT},
    services::similarity::{compute_similarities_with, ComputeOptions, TracingProgress},
    telemetry::{make_run_span, RunId},
};

/// Settings of one recommendation run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Emit a progress line every this many source games (0 disables)
    pub progress_interval: usize,
    /// Worker threads for the scoring pass
    pub workers: Option<usize>,
    /// Time budget of the scoring pass
    pub deadline: Option<Duration>,
    /// Compute without writing anything back
    pub dry_run: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            progress_interval: 100,
            workers: None,
            deadline: None,
            dry_run: false,
        }
    }
}

/// A game whose similar-games list could not be stored
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WriteFailure {
    pub game_id: GameId,
    pub error: String,
}

/// Outcome of one recommendation run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Games in the eligible snapshot
    pub eligible: usize,
    /// Lists written (or that would have been written on a dry run)
    pub updated: usize,
    /// Written lists that ended up empty
    pub empty_lists: usize,
    pub failures: Vec<WriteFailure>,
    pub dry_run: bool,
}

impl BatchReport {
    fn new(run_id: RunId, started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: started_at,
            eligible: 0,
            updated: 0,
            empty_lists: 0,
            failures: Vec::new(),
            dry_run,
        }
    }
}

/// Recomputes and stores the similar-games list of every eligible game
///
/// Loads a snapshot of the eligible catalog, scores it in memory on a blocking
/// thread, then overwrites each game's list one record at a time. A failed
/// write is logged and recorded in the report without stopping the run.
///
/// The scoring pass honours `cancel` and `options.deadline` between source
/// games; an interrupted pass writes nothing. Cancellation is also checked
/// between writes.
pub async fn run_batch(
    store: Arc<dyn GameStore>,
    options: &BatchOptions,
    cancel: CancellationToken,
) -> AppResult<BatchReport> {
    let run_id = RunId::new();
    let span = make_run_span(&run_id);

    execute(store, options, cancel, run_id).instrument(span).await
}

async fn execute(
    store: Arc<dyn GameStore>,
    options: &BatchOptions,
    cancel: CancellationToken,
    run_id: RunId,
) -> AppResult<BatchReport> {
    let clock = Instant::now();
    let mut report = BatchReport::new(run_id, Utc::now(), options.dry_run);

    let games = store.load_eligible(MIN_RATING_COUNT).await?;
    report.eligible = games.len();

    if games.is_empty() {
        tracing::warn!(store = store.name(), "No eligible games found");
        report.finished_at = Utc::now();
        return Ok(report);
    }

    tracing::info!(
        eligible = games.len(),
        store = store.name(),
        dry_run = options.dry_run,
        "Computing recommendations"
    );

    let compute = ComputeOptions {
        workers: options.workers,
        deadline: options.deadline.map(|budget| clock + budget),
        cancel: cancel.clone(),
        progress_interval: options.progress_interval,
        progress: Arc::new(TracingProgress),
    };

    let games = Arc::new(games);
    let similarities = {
        let games = games.clone();
        tokio::task::spawn_blocking(move || compute_similarities_with(&games, &compute))
            .await
            .map_err(|e| AppError::Internal(format!("Scoring task failed: {}", e)))??
    };

    tracing::info!(
        computed = similarities.len(),
        elapsed_ms = clock.elapsed().as_millis(),
        "Scoring pass completed"
    );

    let total = games.len();
    for game in games.iter() {
        if cancel.is_cancelled() {
            tracing::warn!(written = report.updated, total, "Run cancelled during write-back");
            return Err(AppError::Cancelled {
                processed: report.updated,
                total,
            });
        }

        let similar = similarities
            .get(&game.id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        if !options.dry_run {
            if let Err(e) = store.replace_similar_games(game.id, similar).await {
                tracing::error!(game_id = %game.id, error = %e, "Failed to store similar games");
                report.failures.push(WriteFailure {
                    game_id: game.id,
                    error: e.to_string(),
                });
                continue;
            }
        }

        report.updated += 1;
        if similar.is_empty() {
            report.empty_lists += 1;
        }
    }

    report.finished_at = Utc::now();

    tracing::info!(
        eligible = report.eligible,
        updated = report.updated,
        empty_lists = report.empty_lists,
        failed = report.failures.len(),
        dry_run = report.dry_run,
        elapsed_ms = clock.elapsed().as_millis(),
        "Recommendations updated"
    );

    Ok(report)
}

/// Game record store abstraction
///
/// The recommendation batch only needs two things from its backing store: a
/// snapshot of the eligible catalog, and a way to overwrite one game's
/// similar-games list. Implementations exist for Postgres and for an
/// in-process snapshot.
use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{Game, GameId},
};

/// Read/write interface of the recommendation batch
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Loads every game with at least `min_rating_count` votes
    ///
    /// The returned order is the tie-break order of the engine, so it must be
    /// stable between calls on an unchanged catalog.
    async fn load_eligible(&self, min_rating_count: i32) -> AppResult<Vec<Game>>;

    /// Replaces the full similar-games list of one game
    ///
    /// Readers must never observe a partially written list. Fails with
    /// `AppError::NotFound` when the game does not exist.
    async fn replace_similar_games(&self, id: GameId, similar: &[GameId]) -> AppResult<()>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{
    db::GameStore,
    error::{AppError, AppResult},
    models::{Game, GameId},
};

/// In-process catalog snapshot
///
/// Keeps games in insertion order, which is also the order `load_eligible`
/// returns them in. Each list replacement happens under the write lock, so a
/// reader sees either the old list or the new one.
pub struct MemoryGameStore {
    inner: RwLock<MemoryGameStoreInner>,
}

struct MemoryGameStoreInner {
    games: Vec<Game>,
    positions: HashMap<GameId, usize>,
}

impl MemoryGameStore {
    /// Creates a store from a list of games, keeping the first of any duplicate ids
    pub fn new(games: Vec<Game>) -> Self {
        let mut kept = Vec::with_capacity(games.len());
        let mut positions = HashMap::with_capacity(games.len());

        for game in games {
            if positions.contains_key(&game.id) {
                tracing::warn!(game_id = %game.id, "Duplicate game id, keeping the first entry");
                continue;
            }
            positions.insert(game.id, kept.len());
            kept.push(game);
        }

        Self {
            inner: RwLock::new(MemoryGameStoreInner {
                games: kept,
                positions,
            }),
        }
    }

    /// Creates a store from a JSON array of games
    pub fn from_json(json: &str) -> AppResult<Self> {
        let games: Vec<Game> = serde_json::from_str(json)?;
        Ok(Self::new(games))
    }

    /// Current similar-games list of a game, `None` for unknown ids
    pub async fn similar_games(&self, id: GameId) -> Option<Vec<GameId>> {
        let inner = self.inner.read().await;
        inner
            .positions
            .get(&id)
            .map(|&position| inner.games[position].similar_games.clone())
    }

    /// Copy of every stored game, in insertion order
    pub async fn snapshot(&self) -> Vec<Game> {
        self.inner.read().await.games.clone()
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn load_eligible(&self, min_rating_count: i32) -> AppResult<Vec<Game>> {
        let inner = self.inner.read().await;
        Ok(inner
            .games
            .iter()
            .filter(|game| {
                game.total_rating_count
                    .is_some_and(|count| count >= min_rating_count)
            })
            .cloned()
            .collect())
    }

    async fn replace_similar_games(&self, id: GameId, similar: &[GameId]) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let position = *inner
            .positions
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("game {}", id)))?;

        inner.games[position].similar_games = similar.to_vec();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

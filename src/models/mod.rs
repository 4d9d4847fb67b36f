use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Display};

pub mod game;

pub use game::{Game, GameRow, MIN_RATING_COUNT};

/// Stable catalog identifier of a game
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct GameId(pub i64);

impl Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine output: for each processed game, its ranked similar games (best first)
pub type SimilarityMap = HashMap<GameId, Vec<GameId>>;

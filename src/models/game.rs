use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use super::GameId;

/// Vote count a game needs before it takes part in recommendations
pub const MIN_RATING_COUNT: i32 = 5;

/// A catalog entry as seen by the recommendation engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    pub id: GameId,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub release_year: Option<i32>,
    /// Aggregated critic/user score on a 0-100 scale
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub total_rating_count: Option<i32>,
    /// Ranked recommendations, replaced wholesale on every engine run
    #[serde(default)]
    pub similar_games: Vec<GameId>,
}

impl Game {
    /// Creates a game with only an id and a title set
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id: GameId(id),
            title: title.into(),
            summary: None,
            genres: Vec::new(),
            themes: Vec::new(),
            platforms: Vec::new(),
            release_year: None,
            rating: None,
            total_rating_count: None,
            similar_games: Vec::new(),
        }
    }

    /// Whether the game has enough votes to be a source or a candidate
    pub fn is_eligible(&self) -> bool {
        self.total_rating_count
            .is_some_and(|count| count >= MIN_RATING_COUNT)
    }
}

// ============================================================================
// Database Row Types
// ============================================================================

/// Raw row from the `games` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GameRow {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub genres: Json<Vec<String>>,
    pub themes: Json<Vec<String>>,
    pub platforms: Json<Vec<String>>,
    pub release_year: Option<i32>,
    pub rating: Option<f64>,
    pub total_rating_count: Option<i32>,
}

impl From<GameRow> for Game {
    fn from(row: GameRow) -> Self {
        // Blank summaries are stored as '' by some importers
        let summary = row.summary.filter(|s| !s.trim().is_empty());

        Game {
            id: GameId(row.id),
            title: row.title,
            summary,
            genres: row.genres.0,
            themes: row.themes.0,
            platforms: row.platforms.0,
            release_year: row.release_year,
            rating: row.rating,
            total_rating_count: row.total_rating_count,
            similar_games: Vec::new(),
        }
    }
}

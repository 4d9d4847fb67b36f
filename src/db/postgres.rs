use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::GameStore,
    error::{AppError, AppResult},
    models::{Game, GameId, GameRow},
};

/// Creates a PostgreSQL connection pool
///
/// The batch holds at most one connection per in-flight write, so a small
/// pool is enough.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the bundled schema migrations
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Game store backed by the `games` and `game_similar_games` tables
#[derive(Clone)]
pub struct PgGameStore {
    pool: PgPool,
}

impl PgGameStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GameStore for PgGameStore {
    async fn load_eligible(&self, min_rating_count: i32) -> AppResult<Vec<Game>> {
        let rows = sqlx::query_as::<_, GameRow>(
            r#"
            SELECT id, title, summary, genres, themes, platforms,
                   release_year, rating, total_rating_count
            FROM games
            WHERE total_rating_count >= $1
            ORDER BY id
            "#,
        )
        .bind(min_rating_count)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = rows.len(), "Loaded eligible games");

        Ok(rows.into_iter().map(Game::from).collect())
    }

    async fn replace_similar_games(&self, id: GameId, similar: &[GameId]) -> AppResult<()> {
        // One transaction per game: readers see the old list or the new one
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE games SET updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        if touched.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("game {}", id)));
        }

        sqlx::query("DELETE FROM game_similar_games WHERE from_game_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for (position, to_game_id) in similar.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO game_similar_games (from_game_id, to_game_id, position)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(id)
            .bind(*to_game_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(game_id = %id, count = similar.len(), "Stored similar games");

        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

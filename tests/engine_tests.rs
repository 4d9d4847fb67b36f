use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use whichgame::{
    db::{GameStore, MemoryGameStore},
    error::{AppError, AppResult},
    models::{Game, GameId},
    services::{
        normalize::franchise_root,
        run_batch,
        similarity::{score, MAX_SAME_FRANCHISE, MAX_SIMILAR_GAMES, SCORE_THRESHOLD, STRICT_GENRES},
        BatchOptions,
    },
};

fn game(id: i64, title: &str, genres: &[&str], year: Option<i32>, rating: Option<f64>) -> Game {
    let mut game = Game::new(id, title);
    game.genres = genres.iter().map(|g| g.to_string()).collect();
    game.release_year = year;
    game.rating = rating;
    game.total_rating_count = Some(25);
    game
}

/// Deterministic mixed catalog: several franchises, shared themes, a few ineligible games
fn synthetic_catalog() -> Vec<Game> {
    let franchises: [(&str, &[&str]); 6] = [
        ("Mario Kart", &["Racing"]),
        ("Final Fantasy", &["Role-playing (RPG)"]),
        ("Dark Souls", &["Role-playing (RPG)", "Adventure"]),
        ("Street Fighter", &["Fighting"]),
        ("Civilization", &["Strategy"]),
        ("Puzzle Quest", &["Puzzle", "Role-playing (RPG)"]),
    ];
    let themes = ["Fantasy", "Action", "Sci-fi", "Comedy", "Historical"];
    let words = [
        "dragons", "kingdom", "tournament", "empire", "crystals", "warriors", "racing", "ancient",
        "combos", "cities",
    ];
    let platforms = ["PC", "Switch", "PS5", "Xbox Series X"];

    (0..60)
        .map(|i: i64| {
            let (name, genres) = franchises[(i % 6) as usize];
            let idx = i as usize;
            let mut game = Game::new(i + 1, format!("{} {}", name, i / 6 + 1));
            game.genres = genres.iter().map(|g| g.to_string()).collect();
            game.themes = vec![
                themes[idx % 5].to_string(),
                themes[(idx * 3 + 1) % 5].to_string(),
            ];
            game.summary = Some(format!(
                "The {} and the {} of a {}.",
                words[idx % 10],
                words[(idx * 7) % 10],
                words[(idx * 3 + 2) % 10]
            ));
            game.platforms = vec![platforms[idx % 4].to_string()];
            game.release_year = Some(1990 + ((i * 3) % 30) as i32);
            game.rating = if i % 5 == 0 {
                None
            } else {
                Some(55.0 + ((i * 13) % 45) as f64)
            };
            game.total_rating_count = Some(((i * 11) % 40) as i32);
            game
        })
        .collect()
}

async fn run(store: Arc<MemoryGameStore>) -> HashMap<GameId, Vec<GameId>> {
    run_batch(
        store.clone(),
        &BatchOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    store
        .snapshot()
        .await
        .into_iter()
        .map(|g| (g.id, g.similar_games))
        .collect()
}

#[tokio::test]
async fn test_mario_kart_pair_recommends_each_other() {
    let g1 = game(1, "Mario Kart 8", &["Racing"], Some(2014), Some(90.0));
    let g2 = game(2, "Mario Kart 8 Deluxe", &["Racing"], Some(2017), Some(92.0));
    assert_eq!(score(&g1, &g2), Some(31));

    let store = Arc::new(MemoryGameStore::new(vec![g1, g2]));
    let lists = run(store).await;

    assert_eq!(lists[&GameId(1)], vec![GameId(2)]);
    assert_eq!(lists[&GameId(2)], vec![GameId(1)]);
}

#[tokio::test]
async fn test_strict_genre_mismatch_is_never_recommended() {
    let g1 = game(1, "Mario Kart 8", &["Racing"], Some(2014), None);
    let g2 = game(2, "Mario Kart 8 Deluxe", &[], Some(2017), None);

    let store = Arc::new(MemoryGameStore::new(vec![g1, g2]));
    let lists = run(store).await;

    assert!(lists[&GameId(1)].is_empty());
    assert!(lists[&GameId(2)].is_empty());
}

#[tokio::test]
async fn test_game_without_candidates_gets_empty_list() {
    let mut loner = game(1, "Tetris", &["Puzzle"], Some(1984), Some(88.0));
    loner.similar_games = vec![GameId(2)];
    let other = game(2, "Doom", &["Shooter"], Some(1993), Some(90.0));

    let store = Arc::new(MemoryGameStore::new(vec![loner, other]));
    let report = run_batch(
        store.clone(),
        &BatchOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.updated, 2);
    assert_eq!(report.empty_lists, 2);
    // Previous list is overwritten, not merged
    assert_eq!(store.similar_games(GameId(1)).await, Some(vec![]));
}

#[tokio::test]
async fn test_franchise_cap_fills_last_slot_with_outsider() {
    let themed = |id, title: &str, year| {
        let mut g = game(id, title, &["Adventure"], Some(year), None);
        g.themes = vec!["Fantasy".to_string(), "Magic".to_string()];
        g
    };

    let catalog = vec![
        themed(1, "Zelda Quest", 2000),
        themed(2, "Zelda Quest II", 2000),
        themed(3, "Zelda Quest III", 2001),
        themed(4, "Zelda Quest IV", 2005),
        themed(5, "Zelda Quest V", 2020),
        themed(6, "Dragon Saga", 2001),
    ];

    let store = Arc::new(MemoryGameStore::new(catalog));
    let lists = run(store).await;

    assert_eq!(lists[&GameId(1)], vec![GameId(2), GameId(3), GameId(6)]);
}

#[tokio::test]
async fn test_ineligible_games_are_left_alone() {
    let g1 = game(1, "Mario Kart 8", &["Racing"], Some(2014), None);
    let mut hidden = game(2, "Mario Kart 8 Deluxe", &["Racing"], Some(2017), None);
    hidden.total_rating_count = Some(4);
    hidden.similar_games = vec![GameId(1)];

    let store = Arc::new(MemoryGameStore::new(vec![g1, hidden]));
    let report = run_batch(
        store.clone(),
        &BatchOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.eligible, 1);
    assert_eq!(store.similar_games(GameId(1)).await, Some(vec![]));
    assert_eq!(store.similar_games(GameId(2)).await, Some(vec![GameId(1)]));
}

#[tokio::test]
async fn test_empty_catalog_completes() {
    let store = Arc::new(MemoryGameStore::new(vec![]));
    let report = run_batch(store, &BatchOptions::default(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.eligible, 0);
    assert_eq!(report.updated, 0);
}

#[tokio::test]
async fn test_catalog_wide_properties() {
    let catalog = synthetic_catalog();
    let by_id: HashMap<GameId, Game> = catalog.iter().map(|g| (g.id, g.clone())).collect();

    let store = Arc::new(MemoryGameStore::new(catalog.clone()));
    let lists = run(store).await;

    let mut non_empty = 0;
    for source in catalog.iter().filter(|g| g.is_eligible()) {
        let picks = &lists[&source.id];
        let root = franchise_root(&source.title);

        assert!(picks.len() <= MAX_SIMILAR_GAMES);
        assert!(!picks.contains(&source.id), "{} lists itself", source.id);
        if !picks.is_empty() {
            non_empty += 1;
        }

        let family = picks
            .iter()
            .filter(|id| franchise_root(&by_id[*id].title) == root)
            .count();
        assert!(family <= MAX_SAME_FRANCHISE, "{} exceeds franchise cap", source.id);

        for id in picks {
            let candidate = &by_id[id];
            assert!(candidate.is_eligible());
            assert!(
                matches!(score(source, candidate), Some(s) if s > SCORE_THRESHOLD),
                "{} -> {} below threshold",
                source.id,
                id
            );
            for genre in STRICT_GENRES {
                let mine = source.genres.iter().any(|g| g == genre);
                let theirs = candidate.genres.iter().any(|g| g == genre);
                assert_eq!(mine, theirs, "{} -> {} breaks strict genre {}", source.id, id, genre);
            }
        }
    }

    assert!(non_empty > 0);
}

#[tokio::test]
async fn test_runs_are_deterministic() {
    let first = run(Arc::new(MemoryGameStore::new(synthetic_catalog()))).await;
    let second = run(Arc::new(MemoryGameStore::new(synthetic_catalog()))).await;
    assert_eq!(first, second);

    let parallel_store = Arc::new(MemoryGameStore::new(synthetic_catalog()));
    let options = BatchOptions {
        workers: Some(4),
        progress_interval: 7,
        ..BatchOptions::default()
    };
    run_batch(parallel_store.clone(), &options, CancellationToken::new())
        .await
        .unwrap();
    for game in parallel_store.snapshot().await {
        assert_eq!(first[&game.id], game.similar_games);
    }
}

#[tokio::test]
async fn test_rerun_on_same_store_is_idempotent() {
    let store = Arc::new(MemoryGameStore::new(synthetic_catalog()));
    let first = run(store.clone()).await;
    let second = run(store).await;
    assert_eq!(first, second);
}

/// Rejects writes for one game, delegates everything else
struct FlakyStore {
    inner: MemoryGameStore,
    broken: GameId,
}

#[async_trait]
impl GameStore for FlakyStore {
    async fn load_eligible(&self, min_rating_count: i32) -> AppResult<Vec<Game>> {
        self.inner.load_eligible(min_rating_count).await
    }

    async fn replace_similar_games(&self, id: GameId, similar: &[GameId]) -> AppResult<()> {
        if id == self.broken {
            return Err(AppError::Internal("write rejected".to_string()));
        }
        self.inner.replace_similar_games(id, similar).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

#[tokio::test]
async fn test_failed_write_is_reported_and_batch_continues() {
    let g1 = game(1, "Mario Kart 8", &["Racing"], Some(2014), None);
    let g2 = game(2, "Mario Kart 8 Deluxe", &["Racing"], Some(2017), None);
    let g3 = game(3, "Mario Kart Wii", &["Racing"], Some(2008), None);

    let store = Arc::new(FlakyStore {
        inner: MemoryGameStore::new(vec![g1, g2, g3]),
        broken: GameId(2),
    });
    let report = run_batch(
        store.clone(),
        &BatchOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.updated, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].game_id, GameId(2));

    assert_eq!(
        store.inner.similar_games(GameId(3)).await,
        Some(vec![GameId(1), GameId(2)])
    );
    assert_eq!(store.inner.similar_games(GameId(2)).await, Some(vec![]));
}

#[tokio::test]
async fn test_cancelled_run_leaves_lists_untouched() {
    let mut g1 = game(1, "Mario Kart 8", &["Racing"], Some(2014), None);
    g1.similar_games = vec![GameId(42)];
    let g2 = game(2, "Mario Kart 8 Deluxe", &["Racing"], Some(2017), None);

    let store = Arc::new(MemoryGameStore::new(vec![g1, g2]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = run_batch(store.clone(), &BatchOptions::default(), cancel)
        .await
        .unwrap_err();

    assert!(err.is_interrupted());
    assert_eq!(store.similar_games(GameId(1)).await, Some(vec![GameId(42)]));
}

/// Cancels the run right after the first list is stored
struct InterruptingStore {
    inner: MemoryGameStore,
    cancel: CancellationToken,
}

#[async_trait]
impl GameStore for InterruptingStore {
    async fn load_eligible(&self, min_rating_count: i32) -> AppResult<Vec<Game>> {
        self.inner.load_eligible(min_rating_count).await
    }

    async fn replace_similar_games(&self, id: GameId, similar: &[GameId]) -> AppResult<()> {
        self.inner.replace_similar_games(id, similar).await?;
        self.cancel.cancel();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "interrupting"
    }
}

#[tokio::test]
async fn test_cancel_during_write_back_stops_remaining_writes() {
    let g1 = game(1, "Mario Kart 8", &["Racing"], Some(2014), None);
    let mut g2 = game(2, "Mario Kart 8 Deluxe", &["Racing"], Some(2017), None);
    g2.similar_games = vec![GameId(99)];
    let mut g3 = game(3, "Mario Kart Wii", &["Racing"], Some(2008), None);
    g3.similar_games = vec![GameId(98)];

    let cancel = CancellationToken::new();
    let store = Arc::new(InterruptingStore {
        inner: MemoryGameStore::new(vec![g1, g2, g3]),
        cancel: cancel.clone(),
    });

    let err = run_batch(store.clone(), &BatchOptions::default(), cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Cancelled {
            processed: 1,
            total: 3
        }
    ));
    assert_eq!(
        store.inner.similar_games(GameId(1)).await,
        Some(vec![GameId(2), GameId(3)])
    );
    assert_eq!(store.inner.similar_games(GameId(2)).await, Some(vec![GameId(99)]));
    assert_eq!(store.inner.similar_games(GameId(3)).await, Some(vec![GameId(98)]));
}

//! Content-based "similar games" engine.
//!
//! Every eligible game is compared against every other eligible game with a
//! rule-based score over shared genres, themes, summary keywords, franchise
//! and title affinity, release proximity, platforms and rating quality. The
//! best candidates above [`SCORE_THRESHOLD`] are kept, at most
//! [`MAX_SIMILAR_GAMES`] per game and at most [`MAX_SAME_FRANCHISE`] from the
//! source game's own franchise.
//!
//! The computation is a pure function of the catalog snapshot and its order:
//! ties keep enumeration order, so running twice on the same snapshot gives
//! the same lists.

use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{AppError, AppResult},
    models::{Game, GameId, SimilarityMap},
    services::normalize::{extract_keywords, franchise_root, title_similarity},
};

/// Genres whose presence must match exactly between two similar games
pub const STRICT_GENRES: [&str; 6] = [
    "Racing",
    "Sport",
    "Fighting",
    "Puzzle",
    "Strategy",
    "Simulator",
];

/// Candidates must score strictly above this to be recommended
pub const SCORE_THRESHOLD: i32 = 12;

/// Length cap of a similar-games list
pub const MAX_SIMILAR_GAMES: usize = 3;

/// Entries of a list that may share the source game's franchise root
pub const MAX_SAME_FRANCHISE: usize = 2;

const GENRE_WEIGHT: i32 = 2;
const THEME_WEIGHT: i32 = 5;
const KEYWORD_WEIGHT: i32 = 3;
const FRANCHISE_BONUS: i32 = 25;
const TITLE_BONUS: i32 = 10;
const TITLE_SIMILARITY_CUTOFF: f32 = 0.75;
const CLOSE_RELEASE_YEARS: u32 = 3;
const CLOSE_RELEASE_BONUS: i32 = 4;
const NEAR_RELEASE_YEARS: u32 = 7;
const NEAR_RELEASE_BONUS: i32 = 2;
const PLATFORM_BONUS: i32 = 1;
const QUALITY_GAP: f64 = 20.0;
const QUALITY_PENALTY: i32 = 15;

/// A candidate that cleared the threshold for some source game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub id: GameId,
    pub score: i32,
    /// Whether the candidate shares the source game's franchise root
    pub same_franchise: bool,
}

/// Per-game features, computed once before the pairwise loop
struct GameProfile<'a> {
    game: &'a Game,
    genres: HashSet<&'a str>,
    themes: HashSet<&'a str>,
    platforms: HashSet<&'a str>,
    keywords: HashSet<String>,
    franchise_root: String,
    title: String,
}

impl<'a> GameProfile<'a> {
    fn new(game: &'a Game) -> Self {
        Self {
            game,
            genres: game.genres.iter().map(String::as_str).collect(),
            themes: game.themes.iter().map(String::as_str).collect(),
            platforms: game.platforms.iter().map(String::as_str).collect(),
            keywords: extract_keywords(game.summary.as_deref()),
            franchise_root: franchise_root(&game.title),
            title: game.title.to_lowercase(),
        }
    }

    fn is_same_franchise(&self, other: &GameProfile<'_>) -> bool {
        !self.franchise_root.is_empty()
            && !other.franchise_root.is_empty()
            && self.franchise_root == other.franchise_root
    }
}

fn passes_strict_genres(source: &GameProfile<'_>, candidate: &GameProfile<'_>) -> bool {
    STRICT_GENRES
        .iter()
        .all(|genre| source.genres.contains(*genre) == candidate.genres.contains(*genre))
}

fn overlap<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> i32 {
    a.intersection(b).count() as i32
}

/// Scores a candidate against a source game, `None` when the pair is rejected outright
fn score_profiles(source: &GameProfile<'_>, candidate: &GameProfile<'_>) -> Option<i32> {
    if source.game.id == candidate.game.id || !passes_strict_genres(source, candidate) {
        return None;
    }

    let mut score = 0;

    score += overlap(&source.genres, &candidate.genres) * GENRE_WEIGHT;
    score += overlap(&source.themes, &candidate.themes) * THEME_WEIGHT;
    score += overlap(&source.keywords, &candidate.keywords) * KEYWORD_WEIGHT;

    if source.is_same_franchise(candidate) {
        score += FRANCHISE_BONUS;
    } else if title_similarity(&source.title, &candidate.title) > TITLE_SIMILARITY_CUTOFF {
        score += TITLE_BONUS;
    }

    if let (Some(a), Some(b)) = (source.game.release_year, candidate.game.release_year) {
        let gap = a.abs_diff(b);
        if gap <= CLOSE_RELEASE_YEARS {
            score += CLOSE_RELEASE_BONUS;
        } else if gap <= NEAR_RELEASE_YEARS {
            score += NEAR_RELEASE_BONUS;
        }
    }

    if !source.platforms.is_disjoint(&candidate.platforms) {
        score += PLATFORM_BONUS;
    }

    // Directional: only a much worse candidate is penalized
    if let (Some(mine), Some(theirs)) = (source.game.rating, candidate.game.rating) {
        if mine - theirs > QUALITY_GAP {
            score -= QUALITY_PENALTY;
        }
    }

    Some(score)
}

/// Pairwise score of `candidate` from the point of view of `source`
///
/// Returns `None` when the candidate is the source itself or when the two games
/// disagree on any of the [`STRICT_GENRES`].
pub fn score(source: &Game, candidate: &Game) -> Option<i32> {
    score_profiles(&GameProfile::new(source), &GameProfile::new(candidate))
}

/// Precomputed profiles of a catalog snapshot
pub struct SimilarityIndex<'a> {
    profiles: Vec<GameProfile<'a>>,
}

impl<'a> SimilarityIndex<'a> {
    pub fn new(catalog: &'a [Game]) -> Self {
        Self {
            profiles: catalog.iter().map(GameProfile::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Id of the game at `position` in the snapshot
    pub fn id(&self, position: usize) -> GameId {
        self.profiles[position].game.id
    }

    /// All candidates scoring above the threshold for the game at `source`,
    /// best first, ties in snapshot order
    pub fn ranked_candidates(&self, source: usize) -> Vec<ScoredCandidate> {
        let me = &self.profiles[source];

        let mut kept: Vec<ScoredCandidate> = self
            .profiles
            .iter()
            .filter_map(|candidate| {
                let score = score_profiles(me, candidate)?;
                (score > SCORE_THRESHOLD).then(|| ScoredCandidate {
                    id: candidate.game.id,
                    score,
                    same_franchise: candidate.franchise_root == me.franchise_root,
                })
            })
            .collect();

        // sort_by is stable, equal scores keep enumeration order
        kept.sort_by(|a, b| b.score.cmp(&a.score));
        kept
    }

    /// Final similar-games list of the game at `source`
    pub fn select(&self, source: usize) -> Vec<GameId> {
        let ranked = self.ranked_candidates(source);
        let picks = apply_diversity_cap(&ranked);

        tracing::debug!(
            game_id = %self.id(source),
            candidates = ranked.len(),
            picks = ?picks,
            "Selected similar games"
        );

        picks
    }
}

/// Takes the top candidates while allowing at most [`MAX_SAME_FRANCHISE`] of
/// the source's own franchise
///
/// Over-quota franchise entries are passed over without using a slot.
fn apply_diversity_cap(ranked: &[ScoredCandidate]) -> Vec<GameId> {
    let mut picks = Vec::with_capacity(MAX_SIMILAR_GAMES);
    let mut same_franchise = 0;

    for candidate in ranked {
        if picks.len() >= MAX_SIMILAR_GAMES {
            break;
        }

        if candidate.same_franchise {
            if same_franchise >= MAX_SAME_FRANCHISE {
                continue;
            }
            same_franchise += 1;
        }

        picks.push(candidate.id);
    }

    picks
}

/// Computes the similar-games list of every game in the snapshot
///
/// Every game in `catalog` is both a source and a candidate, so callers hand
/// in the eligible games only.
pub fn compute_similarities(catalog: &[Game]) -> SimilarityMap {
    let index = SimilarityIndex::new(catalog);

    (0..index.len())
        .map(|position| (index.id(position), index.select(position)))
        .collect()
}

// ============================================================================
// Parallel computation
// ============================================================================

/// Receives progress updates while the scoring pass runs
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, processed: usize, total: usize);
}

/// Reports progress as `info` log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_progress(&self, processed: usize, total: usize) {
        tracing::info!(processed, total, "Processed {}/{}", processed, total);
    }
}

/// Knobs of [`compute_similarities_with`]
#[derive(Clone)]
pub struct ComputeOptions {
    /// Size of the rayon pool, the global pool when `None`
    pub workers: Option<usize>,
    /// Wall-clock limit, checked before each source game
    pub deadline: Option<Instant>,
    pub cancel: CancellationToken,
    /// Report every this many processed games, 0 disables reporting
    pub progress_interval: usize,
    pub progress: Arc<dyn ProgressSink>,
}

impl Default for ComputeOptions {
    fn default() -> Self {
        Self {
            workers: None,
            deadline: None,
            cancel: CancellationToken::new(),
            progress_interval: 100,
            progress: Arc::new(TracingProgress),
        }
    }
}

impl ComputeOptions {
    fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Parallel, interruptible version of [`compute_similarities`]
///
/// Source games are sharded across a rayon pool; each one only reads the
/// shared profiles, so the result is identical to the sequential version.
/// Fails with [`AppError::Cancelled`] or [`AppError::DeadlineExceeded`] when
/// interrupted, in which case no partial map is returned.
pub fn compute_similarities_with(
    catalog: &[Game],
    options: &ComputeOptions,
) -> AppResult<SimilarityMap> {
    let total = catalog.len();
    if total == 0 {
        return Ok(SimilarityMap::new());
    }

    let index = SimilarityIndex::new(catalog);
    let processed = AtomicUsize::new(0);

    let run = || -> Option<Vec<(GameId, Vec<GameId>)>> {
        (0..total)
            .into_par_iter()
            .map(|position| {
                if options.is_interrupted() {
                    return None;
                }

                let picks = index.select(position);

                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                if options.progress_interval > 0 && done % options.progress_interval == 0 {
                    options.progress.on_progress(done, total);
                }

                Some((index.id(position), picks))
            })
            .collect()
    };

    let outcome = match options.workers {
        Some(workers) => rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build worker pool: {}", e)))?
            .install(run),
        None => run(),
    };

    match outcome {
        Some(assignments) => Ok(assignments.into_iter().collect()),
        None => {
            let processed = processed.load(Ordering::Relaxed);
            if options.cancel.is_cancelled() {
                Err(AppError::Cancelled { processed, total })
            } else {
                Err(AppError::DeadlineExceeded { processed, total })
            }
        }
    }
}

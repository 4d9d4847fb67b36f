//! Text normalization used by the similarity engine.
//!
//! These helpers are pure functions over titles and summaries. Their output is
//! part of the engine's contract: franchise roots in particular must stay
//! byte-for-byte stable between runs, otherwise the diversity cap and the
//! franchise bonus start matching different games.

use once_cell::sync::Lazy;
use regex::Regex;
use similar::TextDiff;
use std::collections::HashSet;

/// Isolated roman numerals I to X, matched as whole words
static RE_ROMAN_NUMERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:i|ii|iii|iv|v|vi|vii|viii|ix|x)\b").expect("valid regex")
});

/// Anything that is neither a word character nor whitespace
static RE_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

/// Prefixes removed from a title before taking its root, tried once each in this order
const TITLE_PREFIXES: [&str; 3] = ["the ", "a ", "super "];

/// Summary tokens this short or shorter never count as keywords
const MIN_KEYWORD_CHARS: usize = 4;

/// Common English words plus filler vocabulary that shows up in almost every game blurb
pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "to", "in", "on", "at", "with", "by", "from", "game",
    "play", "player", "world", "story", "new", "best", "experience", "character", "level", "mode",
    "edition", "version", "series", "explore", "fight", "action", "adventure", "gameplay",
    "system", "features", "time", "original", "classic", "set", "take", "control", "find",
    "make", "use", "get", "one", "two", "three", "first", "second", "third",
];

static STOPWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOPWORDS.iter().copied().collect());

/// Extracts the distinctive words of a summary
///
/// Lowercases, drops punctuation, splits on whitespace and keeps tokens of at
/// least four characters that are not stopwords. A missing or empty summary
/// yields an empty set.
pub fn extract_keywords(summary: Option<&str>) -> HashSet<String> {
    let Some(text) = summary else {
        return HashSet::new();
    };

    let lowered = text.to_lowercase();
    let cleaned = RE_PUNCTUATION.replace_all(&lowered, "");

    cleaned
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|word| !STOPWORD_SET.contains(*word))
        .map(str::to_string)
        .collect()
}

/// Computes the franchise root of a title
///
/// The root is the first two words of the title after lowercasing, removing
/// isolated roman numerals, removing punctuation and stripping a leading
/// "the ", "a " or "super ". Titles that leave no words behind get an empty root.
///
/// ```
/// use whichgame::services::normalize::franchise_root;
///
/// assert_eq!(franchise_root("Final Fantasy VII"), "final fantasy");
/// assert_eq!(franchise_root("Super Mario Bros. 3"), "mario bros");
/// ```
pub fn franchise_root(title: &str) -> String {
    if title.is_empty() {
        return String::new();
    }

    let lowered = title.to_lowercase();
    let without_numerals = RE_ROMAN_NUMERAL.replace_all(&lowered, "");
    let cleaned = RE_PUNCTUATION.replace_all(&without_numerals, "");

    let mut rest: &str = &cleaned;
    for prefix in TITLE_PREFIXES {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
        }
    }

    rest.split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity ratio of two titles in `[0, 1]`
///
/// Case-insensitive, character level: twice the length of the longest common
/// subsequence divided by the combined length of both titles.
pub fn title_similarity(a: &str, b: &str) -> f32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    TextDiff::from_chars(a.as_str(), b.as_str()).ratio()
}

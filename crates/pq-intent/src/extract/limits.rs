use std::sync::LazyLock;

use pq_protocol::{MAX_LIMIT, RankDirection};
use regex::Regex;

static LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(top|bottom|best|worst|highest|lowest|limit|first|last|latest)\s+(\d{1,5})\b(?:\s+([a-z]+))?",
    )
    .unwrap()
});

const TOP_WORDS: [&str; 9] = [
    "top", "highest", "best", "most", "maximum", "max", "largest", "biggest", "peak",
];
const BOTTOM_WORDS: [&str; 7] = [
    "bottom", "lowest", "worst", "least", "minimum", "min", "smallest",
];

fn is_period_word(word: &str) -> bool {
    matches!(
        word,
        "day" | "days" | "week" | "weeks" | "month" | "months" | "year" | "years"
    )
}

/// Numeric limit from "top 5", "bottom 3", "limit 20", "first 10".
///
/// "last 7 days" is a period, not a limit. Values above the row ceiling
/// are clamped to it.
pub fn extract_limit(text: &str) -> Option<u32> {
    LIMIT.captures_iter(text).find_map(|caps| {
        let follower = caps.get(3).map(|m| m.as_str().to_lowercase());
        if follower.as_deref().is_some_and(is_period_word) {
            return None;
        }
        let n = caps[2].parse::<u32>().ok().filter(|n| *n > 0)?;
        Some(n.min(MAX_LIMIT))
    })
}

/// Rank direction from the first superlative word.
pub fn extract_rank(tokens: &[String]) -> Option<RankDirection> {
    tokens.iter().find_map(|token| {
        if TOP_WORDS.contains(&token.as_str()) {
            Some(RankDirection::Top)
        } else if BOTTOM_WORDS.contains(&token.as_str()) {
            Some(RankDirection::Bottom)
        } else {
            None
        }
    })
}

use std::sync::LazyLock;

use pq_protocol::RowOrdinal;
use regex::Regex;

static NUMERIC_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,4})(?:st|nd|rd|th)\s+(?:row|record|entry)\b").unwrap()
});

static ROW_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:row|record|entry)\s*(?:number\s*|no\.?\s*|#\s*)?(\d{1,4})\b").unwrap()
});

static WORD_ORDINAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth)\s+(?:row|record|entry)\b",
    )
    .unwrap()
});

static LAST_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:last|final)\s+(?:row|record|entry)\b").unwrap());

fn word_position(word: &str) -> Option<u32> {
    let n = match word.to_lowercase().as_str() {
        "first" => 1,
        "second" => 2,
        "third" => 3,
        "fourth" => 4,
        "fifth" => 5,
        "sixth" => 6,
        "seventh" => 7,
        "eighth" => 8,
        "ninth" => 9,
        "tenth" => 10,
        _ => return None,
    };
    Some(n)
}

/// Row the question points at ("5th row", "row 5", "fifth row", "last row").
pub fn extract_row_ordinal(text: &str) -> Option<RowOrdinal> {
    if LAST_ROW.is_match(text) {
        return Some(RowOrdinal::Last);
    }
    let position = NUMERIC_SUFFIX
        .captures(text)
        .or_else(|| ROW_NUMBER.captures(text))
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .or_else(|| {
            WORD_ORDINAL
                .captures(text)
                .and_then(|caps| word_position(&caps[1]))
        })?;
    RowOrdinal::nth(position).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_forms() {
        assert_eq!(extract_row_ordinal("show the 5th row"), Some(RowOrdinal::Nth(5)));
        assert_eq!(extract_row_ordinal("row 12 please"), Some(RowOrdinal::Nth(12)));
        assert_eq!(extract_row_ordinal("record number 3"), Some(RowOrdinal::Nth(3)));
    }

    #[test]
    fn word_and_last_forms() {
        assert_eq!(extract_row_ordinal("fifth row of data"), Some(RowOrdinal::Nth(5)));
        assert_eq!(extract_row_ordinal("the last record"), Some(RowOrdinal::Last));
    }

    #[test]
    fn zero_and_absent() {
        assert_eq!(extract_row_ordinal("row 0"), None);
        assert_eq!(extract_row_ordinal("top 5 rows"), None);
        assert_eq!(extract_row_ordinal("production for january"), None);
    }
}

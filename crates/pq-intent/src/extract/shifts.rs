use std::sync::LazyLock;

use pq_protocol::Shift;
use regex::Regex;

// "shift A", "shifts a, b and c", "shift-B"
static SHIFT_THEN_LETTERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bshifts?[\s\-_]*([abc](?:(?:\s*(?:,|&|/|\band\b|\bor\b)\s*|\s+)[abc])*)\b",
    )
    .unwrap()
});

// "A shift", "A and B shifts", "C-shift". The letter must be upper-case so
// the article in "a shift" is not read as shift A.
static LETTERS_THEN_SHIFT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([ABC](?:\s*(?:,|&|/|and|or)\s*[ABC])*)[\s\-_]+(?i:shifts?)\b").unwrap()
});

fn letters(group: &str, out: &mut Vec<Shift>) {
    let chars: Vec<char> = group.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        // Skip letters that belong to "and" / "or".
        let alpha_at = |j: Option<usize>| {
            j.and_then(|j| chars.get(j))
                .is_some_and(|c| c.is_ascii_alphabetic())
        };
        let standalone =
            c.is_ascii_alphabetic() && !alpha_at(i.checked_sub(1)) && !alpha_at(Some(i + 1));
        if !standalone {
            continue;
        }
        if let Some(shift) = Shift::from_letter(c)
            && !out.contains(&shift)
        {
            out.push(shift);
        }
    }
}

/// Shift codes mentioned in `text`, in first-mention order.
pub fn extract_shifts(text: &str) -> Vec<Shift> {
    let mut found = Vec::new();
    let mut matches: Vec<(usize, &str)> = SHIFT_THEN_LETTERS
        .captures_iter(text)
        .chain(LETTERS_THEN_SHIFT.captures_iter(text))
        .filter_map(|caps| caps.get(1).map(|m| (m.start(), m.as_str())))
        .collect();
    matches.sort_by_key(|(start, _)| *start);
    for (_, group) in matches {
        letters(group, &mut found);
    }
    found
}

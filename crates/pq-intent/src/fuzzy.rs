//! Typo-tolerant term matching.
//!
//! The contract: a candidate matches a target when their restricted
//! Damerau-Levenshtein distance (insertions, deletions, substitutions and
//! adjacent transpositions) is within [`max_edits`] of the target length, or
//! when their phonetic keys are. Anything beyond the bound is rejected,
//! never guessed.

/// Score deducted per edit.
pub const EDIT_PENALTY: f64 = 0.12;

/// Result of a successful fuzzy comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatch {
    /// Edits needed (phonetic-only matches count as at least one).
    pub distance: usize,
    /// True when the match only holds after phonetic normalization.
    pub phonetic: bool,
}

impl FuzzyMatch {
    pub const EXACT: FuzzyMatch = FuzzyMatch {
        distance: 0,
        phonetic: false,
    };

    /// Match quality in [0, 1]: 1.0 exact, minus [`EDIT_PENALTY`] per edit.
    pub fn score(&self) -> f64 {
        (1.0 - EDIT_PENALTY * self.distance as f64).max(0.0)
    }
}

/// A phrase located in a token stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseMatch {
    /// Index of the first matching token.
    pub start: usize,
    /// Number of tokens covered.
    pub len: usize,
    pub matched: FuzzyMatch,
}

/// Edit budget for a target of `len` characters (spaces excluded).
pub fn max_edits(len: usize) -> usize {
    match len {
        0..=4 => 0,
        5..=7 => 1,
        8..=12 => 2,
        _ => 3,
    }
}

/// Lowercase, turn punctuation into single spaces, trim.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Normalized whitespace tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Restricted Damerau-Levenshtein (optimal string alignment) distance.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());
    let mut dp = vec![vec![0usize; n + 1]; m + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in dp[0].iter_mut().enumerate() {
        *val = j;
    }
    for i in 1..=m {
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(dp[i - 2][j - 2] + 1);
            }
            dp[i][j] = best;
        }
    }
    dp[m][n]
}

/// Collapse common English sound-alike spellings to one key.
pub fn phonetic_key(word: &str) -> String {
    let lower = word.to_lowercase();
    let replaced = lower
        .replace("ph", "f")
        .replace("ck", "k")
        .replace("qu", "kw")
        .replace('q', "k")
        .replace('x', "ks")
        .replace('z', "s")
        .replace("wh", "w");

    let chars: Vec<char> = replaced.chars().collect();
    let mut key = String::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        let mapped = if c == 'c' {
            match chars.get(i + 1) {
                Some('e' | 'i' | 'y') => 's',
                _ => 'k',
            }
        } else {
            c
        };
        if key.ends_with(mapped) {
            continue;
        }
        key.push(mapped);
    }
    key
}

fn letter_count(s: &str) -> usize {
    s.chars().filter(|c| !c.is_whitespace()).count()
}

/// Compare a normalized candidate with a normalized target.
pub fn match_term(candidate: &str, target: &str) -> Option<FuzzyMatch> {
    if candidate == target {
        return Some(FuzzyMatch::EXACT);
    }
    if candidate.strip_suffix('s') == Some(target) {
        return Some(FuzzyMatch::EXACT);
    }
    // Numbers only ever match literally.
    if candidate.chars().any(|c| c.is_ascii_digit()) != target.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }

    let bound = max_edits(letter_count(target));
    let raw = edit_distance(candidate, target);
    if raw <= bound {
        return Some(FuzzyMatch {
            distance: raw,
            phonetic: false,
        });
    }

    let phonetic = edit_distance(&phonetic_key(candidate), &phonetic_key(target));
    if phonetic <= bound {
        return Some(FuzzyMatch {
            distance: phonetic.max(1),
            phonetic: true,
        });
    }
    None
}

/// Best occurrence of `phrase` in `tokens`.
///
/// Multi-word phrases are compared against equally long token windows and
/// against single tokens spelled without spaces ("shiftwise").
pub fn find_phrase(tokens: &[String], phrase: &str) -> Option<PhraseMatch> {
    let target = normalize(phrase);
    if target.is_empty() {
        return None;
    }
    let words = target.split(' ').count();
    let mut best: Option<PhraseMatch> = None;

    let mut consider = |candidate: PhraseMatch| {
        let better = match &best {
            None => true,
            Some(current) => candidate.matched.distance < current.matched.distance,
        };
        if better {
            best = Some(candidate);
        }
    };

    if tokens.len() >= words {
        for start in 0..=tokens.len() - words {
            let candidate = tokens[start..start + words].join(" ");
            if let Some(matched) = match_term(&candidate, &target) {
                consider(PhraseMatch {
                    start,
                    len: words,
                    matched,
                });
            }
        }
    }

    if words > 1 {
        let compact = target.replace(' ', "");
        for (start, token) in tokens.iter().enumerate() {
            if let Some(matched) = match_term(token, &compact) {
                consider(PhraseMatch {
                    start,
                    len: 1,
                    matched,
                });
            }
        }
    }

    best
}

/// True when `phrase` occurs in `tokens` within the edit bound.
pub fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    find_phrase(tokens, phrase).is_some()
}

/// First phrase of `phrases` that occurs in `tokens`.
pub fn first_match<'a>(tokens: &[String], phrases: &[&'a str]) -> Option<&'a str> {
    phrases
        .iter()
        .copied()
        .find(|phrase| contains_phrase(tokens, phrase))
}

/// True when any phrase occurs in `tokens`.
pub fn contains_any(tokens: &[String], phrases: &[&str]) -> bool {
    first_match(tokens, phrases).is_some()
}

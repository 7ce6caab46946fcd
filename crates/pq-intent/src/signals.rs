use crate::fuzzy::{self, contains_any};
use crate::vocab;

/// Vocabulary families present in a question, as consumed by the rule router
/// and the query builders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub visualization: bool,
    pub aggregation: bool,
    pub advisory: bool,
    pub optimization: bool,
    pub combination: bool,
    pub shift: bool,
    pub date_range: bool,
    pub period_summary: bool,
    pub listing: bool,
    pub superlative: bool,
    pub efficiency: bool,
    pub general_stats: bool,
    pub data_noun: bool,
    pub comparison_connective: bool,
    /// Comparison connective together with shift language.
    pub shift_comparison: bool,
}

impl Signals {
    pub fn detect(text: &str) -> Self {
        Self::from_tokens(&fuzzy::tokenize(text))
    }

    pub fn from_tokens(tokens: &[String]) -> Self {
        let shift = contains_any(tokens, vocab::SHIFT);
        let comparison_connective = contains_any(tokens, vocab::COMPARISON_CONNECTIVES);
        Self {
            visualization: contains_any(tokens, vocab::VISUALIZATION),
            aggregation: contains_any(tokens, vocab::AGGREGATION),
            advisory: contains_any(tokens, vocab::ADVISORY),
            optimization: contains_any(tokens, vocab::OPTIMIZATION),
            combination: contains_any(tokens, vocab::COMBINATION),
            shift,
            date_range: contains_any(tokens, vocab::DATE_RANGE),
            period_summary: contains_any(tokens, vocab::PERIOD_SUMMARY),
            listing: contains_any(tokens, vocab::LISTING),
            superlative: contains_any(tokens, vocab::SUPERLATIVE),
            efficiency: contains_any(tokens, vocab::EFFICIENCY),
            general_stats: contains_any(tokens, vocab::GENERAL_STATS)
                || tokens.iter().any(|t| t == "stats"),
            data_noun: contains_any(tokens, vocab::DATA_NOUNS),
            comparison_connective,
            shift_comparison: shift && comparison_connective,
        }
    }

    /// Names of the families present, for decision reasons.
    pub fn names(&self) -> Vec<&'static str> {
        [
            (self.visualization, "visualization"),
            (self.aggregation, "aggregation"),
            (self.advisory, "advisory"),
            (self.optimization, "optimization"),
            (self.combination, "combination"),
            (self.shift, "shift"),
            (self.date_range, "date_range"),
            (self.period_summary, "period_summary"),
            (self.listing, "listing"),
            (self.superlative, "superlative"),
            (self.efficiency, "efficiency"),
            (self.general_stats, "general_stats"),
            (self.data_noun, "data_noun"),
            (self.shift_comparison, "shift_comparison"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}

//! Keyword phrase tables.
//!
//! All phrases are lower-case and matched through [`crate::fuzzy`], so they
//! list canonical spellings only. Plural forms are matched automatically.

use pq_protocol::{Intent, IntentTier};

/// Phrases owned by one intent.
#[derive(Debug, Clone, Copy)]
pub struct IntentVocabulary {
    pub intent: Intent,
    pub phrases: &'static [&'static str],
}

/// Score multiplier applied to a tier's best phrase score.
pub fn tier_weight(tier: IntentTier) -> f64 {
    match tier {
        IntentTier::Specific => 1.0,
        IntentTier::Moderate => 0.92,
        IntentTier::Generic => 0.6,
    }
}

pub const INTENT_VOCABULARY: &[IntentVocabulary] = &[
    // Tier 1
    IntentVocabulary {
        intent: Intent::EquipmentOptimization,
        phrases: &[
            "forecast",
            "forecasting",
            "predict",
            "prediction",
            "projection",
            "optimize",
            "optimise",
            "optimization",
            "optimal",
            "allocation",
            "next week",
            "next month",
            "next shift",
            "tomorrow",
        ],
    },
    IntentVocabulary {
        intent: Intent::OrdinalRow,
        phrases: &["row number", "record number", "entry number"],
    },
    IntentVocabulary {
        intent: Intent::EquipmentCombination,
        phrases: &[
            "combination",
            "pairing",
            "paired with",
            "tipper and excavator",
            "excavator and tipper",
            "which tipper with which excavator",
            "match up",
        ],
    },
    IntentVocabulary {
        intent: Intent::StatisticalAnalysis,
        phrases: &[
            "standard deviation",
            "std dev",
            "stddev",
            "median",
            "mode",
            "mean",
            "variance",
            "statistics",
            "statistical analysis",
            "descriptive statistics",
            "distribution",
        ],
    },
    IntentVocabulary {
        intent: Intent::Comparison,
        phrases: &[
            "compare",
            "comparison",
            "compared to",
            "versus",
            "vs",
            "difference between",
        ],
    },
    // Tier 2
    IntentVocabulary {
        intent: Intent::Visualization,
        phrases: &[
            "chart",
            "graph",
            "plot",
            "visualize",
            "visualise",
            "visualization",
            "bar chart",
            "line chart",
            "pie chart",
            "trend",
            "diagram",
            "different color",
            "different colour",
        ],
    },
    IntentVocabulary {
        intent: Intent::ShiftProduction,
        phrases: &["shift", "shift wise", "per shift", "by shift"],
    },
    IntentVocabulary {
        intent: Intent::DateRangeProduction,
        phrases: &[
            "date range",
            "between dates",
            "last week",
            "this week",
            "past week",
            "weekly",
            "daily",
        ],
    },
    IntentVocabulary {
        intent: Intent::EquipmentProduction,
        phrases: &[
            "excavator",
            "tipper",
            "equipment",
            "dumper",
            "truck",
            "loader",
            "shovel",
        ],
    },
    IntentVocabulary {
        intent: Intent::EfficiencyAnalysis,
        phrases: &[
            "efficiency",
            "productivity",
            "utilization",
            "utilisation",
            "tons per trip",
            "tons per hour",
            "per trip",
            "per hour",
        ],
    },
    IntentVocabulary {
        intent: Intent::Ranking,
        phrases: &[
            "top",
            "bottom",
            "highest",
            "lowest",
            "rank",
            "ranking",
            "worst",
            "maximum",
            "minimum",
            "most",
            "least",
        ],
    },
    IntentVocabulary {
        intent: Intent::PeriodSummary,
        phrases: &[
            "monthly",
            "yearly",
            "annual",
            "summary",
            "summarize",
            "summarise",
            "overview",
            "year to date",
            "month",
            "report",
        ],
    },
    IntentVocabulary {
        intent: Intent::ProductionQuery,
        phrases: &[
            "production",
            "tonnage",
            "tons",
            "tonnes",
            "output",
            "trip",
            "trip count",
            "hauled",
            "operating hours",
        ],
    },
    IntentVocabulary {
        intent: Intent::KnowledgeLookup,
        phrases: &[
            "how to",
            "how do i",
            "how should",
            "best practice",
            "guideline",
            "procedure",
            "policy",
            "sop",
            "operating manual",
            "safety guidelines",
            "regulation",
            "explain",
        ],
    },
    // Tier 3
    IntentVocabulary {
        intent: Intent::DataRetrieval,
        phrases: &[
            "show", "list", "display", "data", "records", "details", "fetch", "get", "give me",
        ],
    },
];

/// Phrases for `intent`, empty when the intent owns none.
pub fn phrases_for(intent: Intent) -> &'static [&'static str] {
    INTENT_VOCABULARY
        .iter()
        .find(|v| v.intent == intent)
        .map(|v| v.phrases)
        .unwrap_or(&[])
}

// ── Routing signal vocabularies ────────────────────────────────

pub const VISUALIZATION: &[&str] = &[
    "chart",
    "graph",
    "plot",
    "visualize",
    "visualise",
    "visualization",
    "trend",
    "diagram",
    "histogram",
    "different color",
    "different colour",
];

pub const AGGREGATION: &[&str] = &[
    "total",
    "sum",
    "average",
    "avg",
    "mean",
    "median",
    "mode",
    "count",
    "how many",
    "how much",
    "aggregate",
    "standard deviation",
    "std dev",
    "stddev",
    "variance",
    "statistics",
    "maximum",
    "minimum",
];

pub const ADVISORY: &[&str] = &[
    "how to",
    "how do i",
    "how do we",
    "how should",
    "how can i",
    "best practice",
    "guideline",
    "procedure",
    "policy",
    "sop",
    "operating manual",
    "instruction",
    "regulation",
    "what is the process",
];

pub const OPTIMIZATION: &[&str] = &[
    "forecast",
    "forecasting",
    "predict",
    "prediction",
    "projection",
    "optimize",
    "optimise",
    "optimization",
    "optimal",
    "allocation",
    "recommend equipment",
    "which equipment should",
    "next week",
    "next month",
    "next shift",
    "tomorrow",
];

pub const COMBINATION: &[&str] = &[
    "combination",
    "pairing",
    "paired with",
    "tipper and excavator",
    "excavator and tipper",
    "match up",
];

pub const SHIFT: &[&str] = &["shift", "shift wise", "per shift", "by shift", "each shift"];

pub const DATE_RANGE: &[&str] = &[
    "date range",
    "between dates",
    "last week",
    "this week",
    "past week",
    "weekly",
    "daily",
    "day wise",
];

pub const PERIOD_SUMMARY: &[&str] = &[
    "monthly",
    "yearly",
    "annual",
    "summary",
    "summarize",
    "summarise",
    "overview",
    "year to date",
    "month",
    "report",
];

pub const LISTING: &[&str] = &[
    "show",
    "list",
    "display",
    "give me",
    "fetch",
    "get",
    "records",
    "entries",
    "table",
    "data",
    "details",
];

pub const SUPERLATIVE: &[&str] = &[
    "highest",
    "lowest",
    "best",
    "worst",
    "most",
    "least",
    "maximum",
    "minimum",
    "max",
    "min",
    "top",
    "bottom",
    "peak",
    "largest",
    "smallest",
];

pub const DATA_NOUNS: &[&str] = &[
    "production",
    "tons",
    "tonnes",
    "tonnage",
    "trip",
    "output",
    "hours",
    "operating hours",
    "excavator",
    "tipper",
    "equipment",
    "shift",
    "hauled",
    "load",
];

pub const EFFICIENCY: &[&str] = &[
    "efficiency",
    "efficient",
    "productivity",
    "utilization",
    "utilisation",
    "tons per trip",
    "tons per hour",
    "per trip",
    "per hour",
];

pub const GENERAL_STATS: &[&str] = &[
    "statistics",
    "statistical analysis",
    "descriptive statistics",
    "descriptive stats",
    "statistical summary",
    "full statistics",
];

/// Words that put two entities in opposition.
pub const COMPARISON_CONNECTIVES: &[&str] = &[
    "vs",
    "versus",
    "or",
    "compare",
    "compared to",
    "compared with",
    "comparing",
    "against",
    "difference between",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_intent_has_vocabulary() {
        for intent in Intent::ALL {
            assert!(!phrases_for(intent).is_empty(), "{intent} has no phrases");
        }
    }

    #[test]
    fn phrases_are_lower_case() {
        let all = INTENT_VOCABULARY.iter().flat_map(|v| v.phrases.iter());
        for phrase in all.chain(ADVISORY).chain(AGGREGATION).chain(VISUALIZATION) {
            assert_eq!(*phrase, phrase.to_lowercase());
        }
    }

    #[test]
    fn tier_weights_descend() {
        assert!(tier_weight(IntentTier::Specific) > tier_weight(IntentTier::Moderate));
        assert!(tier_weight(IntentTier::Moderate) > tier_weight(IntentTier::Generic));
    }
}

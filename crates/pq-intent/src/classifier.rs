//! Typo-tolerant intent classification.

use chrono::{Local, NaiveDate};
use pq_protocol::{Classification, Intent, Parameters};
use tracing::debug;

use crate::extract;
use crate::fuzzy::{self, find_phrase};
use crate::vocab::{INTENT_VOCABULARY, tier_weight};

/// Confidence assigned to the generic fallback intent.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;
/// Bonus per additional matched phrase of the same intent.
pub const EXTRA_PHRASE_BONUS: f64 = 0.03;
pub const MAX_PHRASE_BONUS: f64 = 0.06;
pub const MAX_CONFIDENCE: f64 = 0.99;

/// Scores granted by structural parameter signals.
pub const ORDINAL_BOOST: f64 = 0.95;
pub const COMPARISON_BOOST: f64 = 0.9;
pub const DATE_RANGE_BOOST: f64 = 0.88;
pub const EQUIPMENT_BOOST: f64 = 0.85;
pub const MONTH_BOOST: f64 = 0.8;

/// Tunable classifier thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    /// Below this, the question falls back to generic data retrieval.
    pub min_confidence: f64,
    /// Scores closer than this are ties, resolved by tier.
    pub tie_margin: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            tie_margin: 0.05,
        }
    }
}

/// Score of one candidate intent.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentScore {
    pub intent: Intent,
    pub score: f64,
    pub matched: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IntentClassifier {
    config: ClassifierConfig,
}

impl IntentClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify against the local calendar date.
    pub fn classify(&self, text: &str) -> Classification {
        self.classify_at(text, Local::now().date_naive())
    }

    /// Classify with relative dates resolved against `today`.
    pub fn classify_at(&self, text: &str, today: NaiveDate) -> Classification {
        let parameters = extract::extract(text, today);
        let tokens = fuzzy::tokenize(text);
        let scores = score_intents(&tokens, &parameters);

        let Some(winner) = self.pick(&scores) else {
            debug!(text, "no intent cleared the minimum confidence");
            return Classification {
                intent: Intent::DataRetrieval,
                confidence: FALLBACK_CONFIDENCE,
                matched_keywords: Vec::new(),
                parameters,
            };
        };

        debug!(
            intent = %winner.intent,
            confidence = winner.score,
            keywords = ?winner.matched,
            "intent classified"
        );
        Classification {
            intent: winner.intent,
            confidence: winner.score,
            matched_keywords: winner.matched.clone(),
            parameters,
        }
    }

    /// Best candidate: highest score, except that any candidate within the
    /// tie margin from a more specific tier wins.
    fn pick<'a>(&self, scores: &'a [IntentScore]) -> Option<&'a IntentScore> {
        let best = scores
            .iter()
            .filter(|s| s.score >= self.config.min_confidence)
            .max_by(|a, b| a.score.total_cmp(&b.score))?;
        scores
            .iter()
            .filter(|s| s.score >= self.config.min_confidence)
            .filter(|s| best.score - s.score <= self.config.tie_margin)
            .min_by(|a, b| {
                a.intent
                    .tier()
                    .cmp(&b.intent.tier())
                    .then(b.score.total_cmp(&a.score))
            })
    }
}

/// Score every intent that matched at least one phrase or structural signal,
/// in vocabulary order.
pub fn score_intents(tokens: &[String], parameters: &Parameters) -> Vec<IntentScore> {
    let mut scores = Vec::new();
    for vocab in INTENT_VOCABULARY {
        let mut best = 0.0_f64;
        let mut matched = Vec::new();
        for phrase in vocab.phrases {
            if let Some(m) = find_phrase(tokens, phrase) {
                best = best.max(m.matched.score());
                matched.push((*phrase).to_string());
            }
        }

        let mut score = 0.0;
        if !matched.is_empty() {
            let extra = (matched.len() - 1) as f64 * EXTRA_PHRASE_BONUS;
            score = best * tier_weight(vocab.intent.tier()) + extra.min(MAX_PHRASE_BONUS);
        }
        if let Some(boost) = structural_boost(vocab.intent, parameters) {
            score = score.max(boost);
        }
        if score > 0.0 {
            scores.push(IntentScore {
                intent: vocab.intent,
                score: score.min(MAX_CONFIDENCE),
                matched,
            });
        }
    }
    scores
}

fn structural_boost(intent: Intent, parameters: &Parameters) -> Option<f64> {
    match intent {
        Intent::OrdinalRow if parameters.row_ordinal.is_some() => Some(ORDINAL_BOOST),
        Intent::Comparison if parameters.comparison.is_some() => Some(COMPARISON_BOOST),
        Intent::DateRangeProduction if parameters.date_range.is_some() => Some(DATE_RANGE_BOOST),
        Intent::EquipmentProduction if !parameters.equipment.is_empty() => Some(EQUIPMENT_BOOST),
        Intent::PeriodSummary if parameters.month.is_some() => Some(MONTH_BOOST),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pq_protocol::IntentTier;

    fn classify(text: &str) -> Classification {
        IntentClassifier::default().classify_at(text, NaiveDate::from_ymd_opt(2025, 3, 12).unwrap())
    }

    // ── exact phrases ────────────────────────────────────────────

    #[test]
    fn forecast_is_optimization() {
        let c = classify("forecast next week production");
        assert_eq!(c.intent, Intent::EquipmentOptimization);
        assert!(c.confidence >= 0.95);
        assert!(c.matched_keywords.contains(&"forecast".to_string()));
    }

    #[test]
    fn chart_question_is_visualization() {
        let c = classify("have shift A, B, C production data with different color");
        assert_eq!(c.intent, Intent::Visualization);
        assert_eq!(c.parameters.shifts.len(), 3);
    }

    #[test]
    fn advisory_question_is_knowledge_lookup() {
        let c = classify("what is the best practice for haul road maintenance");
        assert_eq!(c.intent, Intent::KnowledgeLookup);
    }

    // ── typo tolerance ───────────────────────────────────────────

    #[test]
    fn single_edit_tier_one_variants_clear_floor() {
        let cases = [
            ("forcast production", Intent::EquipmentOptimization),
            ("predcit output", Intent::EquipmentOptimization),
            ("best combinaton of tipper", Intent::EquipmentCombination),
            ("standard deviaton of tons", Intent::StatisticalAnalysis),
            ("medain trips", Intent::StatisticalAnalysis),
            ("comapre shifts", Intent::Comparison),
            ("row numbr 4", Intent::OrdinalRow),
        ];
        for (text, expected) in cases {
            let c = classify(text);
            assert_eq!(c.intent, expected, "{text}");
            assert!(c.confidence >= 0.80, "{text}: {}", c.confidence);
        }
    }

    #[test]
    fn typo_beyond_bound_is_rejected() {
        let c = classify("mdoe");
        assert_eq!(c.intent, Intent::DataRetrieval);
        assert_eq!(c.confidence, FALLBACK_CONFIDENCE);
    }

    // ── tie-break and structural signals ─────────────────────────

    #[test]
    fn tie_prefers_more_specific_tier() {
        // "forcast" (one edit, tier 1) against exact "production" (tier 2).
        let c = classify("forcast production");
        assert_eq!(c.intent.tier(), IntentTier::Specific);
    }

    #[test]
    fn ordinal_parameter_boosts_ordinal_intent() {
        let c = classify("show me the 5th row");
        assert_eq!(c.intent, Intent::OrdinalRow);
        assert_eq!(c.confidence, ORDINAL_BOOST);
    }

    #[test]
    fn comparison_parameter_boosts_comparison_intent() {
        let c = classify("shift A or shift B production");
        assert_eq!(c.intent, Intent::Comparison);
    }

    #[test]
    fn unknown_text_falls_back() {
        let c = classify("hello there");
        assert_eq!(c.intent, Intent::DataRetrieval);
        assert!(c.matched_keywords.is_empty());
    }

    #[test]
    fn confidence_never_exceeds_cap() {
        let c = classify("compare versus comparison difference between vs");
        assert!(c.confidence <= MAX_CONFIDENCE);
    }
}

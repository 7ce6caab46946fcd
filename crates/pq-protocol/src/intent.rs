use serde::{Deserialize, Serialize};

use crate::params::Parameters;

/// Specificity tier of an intent. Lower rank wins ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTier {
    /// Narrow, high-specificity question shapes.
    Specific,
    /// Broader production / equipment questions.
    Moderate,
    /// Catch-all data retrieval.
    Generic,
}

impl IntentTier {
    /// Numeric tier (1 = most specific).
    pub fn rank(self) -> u8 {
        match self {
            IntentTier::Specific => 1,
            IntentTier::Moderate => 2,
            IntentTier::Generic => 3,
        }
    }
}

/// Closed classification of what kind of question was asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    // Tier 1
    EquipmentOptimization,
    OrdinalRow,
    EquipmentCombination,
    StatisticalAnalysis,
    Comparison,
    // Tier 2
    Visualization,
    ShiftProduction,
    DateRangeProduction,
    EquipmentProduction,
    EfficiencyAnalysis,
    Ranking,
    PeriodSummary,
    ProductionQuery,
    KnowledgeLookup,
    // Tier 3
    DataRetrieval,
}

impl Intent {
    /// Every intent, in declaration order.
    pub const ALL: [Intent; 15] = [
        Intent::EquipmentOptimization,
        Intent::OrdinalRow,
        Intent::EquipmentCombination,
        Intent::StatisticalAnalysis,
        Intent::Comparison,
        Intent::Visualization,
        Intent::ShiftProduction,
        Intent::DateRangeProduction,
        Intent::EquipmentProduction,
        Intent::EfficiencyAnalysis,
        Intent::Ranking,
        Intent::PeriodSummary,
        Intent::ProductionQuery,
        Intent::KnowledgeLookup,
        Intent::DataRetrieval,
    ];

    pub fn tier(self) -> IntentTier {
        match self {
            Intent::EquipmentOptimization
            | Intent::OrdinalRow
            | Intent::EquipmentCombination
            | Intent::StatisticalAnalysis
            | Intent::Comparison => IntentTier::Specific,
            Intent::DataRetrieval => IntentTier::Generic,
            _ => IntentTier::Moderate,
        }
    }

    /// Stable snake_case name, identical to the serde form.
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::EquipmentOptimization => "equipment_optimization",
            Intent::OrdinalRow => "ordinal_row",
            Intent::EquipmentCombination => "equipment_combination",
            Intent::StatisticalAnalysis => "statistical_analysis",
            Intent::Comparison => "comparison",
            Intent::Visualization => "visualization",
            Intent::ShiftProduction => "shift_production",
            Intent::DateRangeProduction => "date_range_production",
            Intent::EquipmentProduction => "equipment_production",
            Intent::EfficiencyAnalysis => "efficiency_analysis",
            Intent::Ranking => "ranking",
            Intent::PeriodSummary => "period_summary",
            Intent::ProductionQuery => "production_query",
            Intent::KnowledgeLookup => "knowledge_lookup",
            Intent::DataRetrieval => "data_retrieval",
        }
    }

    /// True for the generic catch-all.
    pub fn is_generic(self) -> bool {
        self.tier() == IntentTier::Generic
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the intent classifier for one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Vocabulary phrases that contributed to the winning intent.
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    /// Parameters extracted independently of the winning intent.
    #[serde(default)]
    pub parameters: Parameters,
}

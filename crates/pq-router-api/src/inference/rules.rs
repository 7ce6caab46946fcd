//! Deterministic rule router.
//!
//! Rules are data: an ordered table of predicates, each naming the task it
//! routes to and the confidence it reports. One loop evaluates them in
//! priority order and the first match wins. When nothing matches, the
//! catch-all stage always produces a decision.

use pq_intent::Signals;
use pq_intent::fuzzy::{self, contains_any};
use pq_protocol::{Classification, Intent, RouterDecision, Task};
use tracing::debug;

/// Everything a rule may look at.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub text: &'a str,
    pub tokens: Vec<String>,
    pub signals: Signals,
    pub classification: &'a Classification,
}

impl<'a> RuleContext<'a> {
    pub fn new(text: &'a str, classification: &'a Classification) -> Self {
        let tokens = fuzzy::tokenize(text);
        let signals = Signals::from_tokens(&tokens);
        Self {
            text,
            tokens,
            signals,
            classification,
        }
    }

    fn intent(&self) -> Intent {
        self.classification.intent
    }
}

/// One routing rule.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    /// 1 is evaluated first.
    pub priority: u8,
    pub task: Task,
    pub confidence: f64,
    /// Returns the reason when the rule applies.
    pub matches: fn(&RuleContext<'_>) -> Option<&'static str>,
}

/// Rules in priority order.
pub const RULES: &[Rule] = &[
    Rule {
        name: "optimization",
        priority: 1,
        task: Task::OptimizationAdvice,
        confidence: 0.9,
        matches: optimization,
    },
    Rule {
        name: "ordinal_row",
        priority: 2,
        task: Task::StructuredQuery,
        confidence: 0.92,
        matches: ordinal_row,
    },
    Rule {
        name: "equipment_combination",
        priority: 3,
        task: Task::StructuredQuery,
        confidence: 0.9,
        matches: equipment_combination,
    },
    Rule {
        name: "visualization",
        priority: 4,
        task: Task::StructuredQuery,
        confidence: 0.88,
        matches: visualization,
    },
    Rule {
        name: "aggregation",
        priority: 5,
        task: Task::StructuredQuery,
        confidence: 0.86,
        matches: aggregation,
    },
    Rule {
        name: "shift_or_date_range",
        priority: 6,
        task: Task::StructuredQuery,
        confidence: 0.84,
        matches: shift_or_date_range,
    },
    Rule {
        name: "specific_intent",
        priority: 7,
        task: Task::StructuredQuery,
        confidence: 0.8,
        matches: specific_intent,
    },
    Rule {
        name: "period_summary",
        priority: 8,
        task: Task::StructuredQuery,
        confidence: 0.78,
        matches: period_summary,
    },
    Rule {
        name: "advisory",
        priority: 9,
        task: Task::Retrieval,
        confidence: 0.85,
        matches: advisory,
    },
    Rule {
        name: "data_listing",
        priority: 10,
        task: Task::StructuredQuery,
        confidence: 0.72,
        matches: data_listing,
    },
];

fn optimization(ctx: &RuleContext<'_>) -> Option<&'static str> {
    let s = &ctx.signals;
    let asked = s.optimization || ctx.intent() == Intent::EquipmentOptimization;
    (asked && !s.advisory && !s.visualization && !s.aggregation)
        .then_some("equipment optimization or forecasting language")
}

fn ordinal_row(ctx: &RuleContext<'_>) -> Option<&'static str> {
    let asked = ctx.classification.parameters.row_ordinal.is_some()
        || ctx.intent() == Intent::OrdinalRow;
    (asked && !ctx.signals.advisory).then_some("ordinal row selection")
}

fn equipment_combination(ctx: &RuleContext<'_>) -> Option<&'static str> {
    let asked = ctx.signals.combination || ctx.intent() == Intent::EquipmentCombination;
    (asked && !ctx.signals.advisory).then_some("equipment combination language")
}

fn visualization(ctx: &RuleContext<'_>) -> Option<&'static str> {
    ctx.signals
        .visualization
        .then_some("visualization or chart language")
}

fn aggregation(ctx: &RuleContext<'_>) -> Option<&'static str> {
    let s = &ctx.signals;
    (s.aggregation || s.general_stats || ctx.intent() == Intent::StatisticalAnalysis)
        .then_some("aggregation or statistical language")
}

fn shift_or_date_range(ctx: &RuleContext<'_>) -> Option<&'static str> {
    let s = &ctx.signals;
    let params = &ctx.classification.parameters;
    if s.advisory {
        return None;
    }
    if s.shift || !params.shifts.is_empty() {
        return Some("shift-specific language");
    }
    (s.date_range || params.date_range.is_some()).then_some("date range language")
}

fn specific_intent(ctx: &RuleContext<'_>) -> Option<&'static str> {
    if ctx.signals.advisory {
        return None;
    }
    match ctx.intent() {
        Intent::Comparison
        | Intent::ShiftProduction
        | Intent::DateRangeProduction
        | Intent::EquipmentProduction
        | Intent::EfficiencyAnalysis
        | Intent::Ranking
        | Intent::ProductionQuery => Some("specific production or equipment intent"),
        _ => None,
    }
}

fn period_summary(ctx: &RuleContext<'_>) -> Option<&'static str> {
    let params = &ctx.classification.parameters;
    let asked = ctx.signals.period_summary
        || ctx.intent() == Intent::PeriodSummary
        || params.month.is_some()
        || params.year.is_some();
    (asked && !ctx.signals.advisory).then_some("monthly or yearly summary language")
}

fn advisory(ctx: &RuleContext<'_>) -> Option<&'static str> {
    (ctx.signals.advisory || ctx.intent() == Intent::KnowledgeLookup)
        .then_some("advisory or procedural language")
}

fn data_listing(ctx: &RuleContext<'_>) -> Option<&'static str> {
    let s = &ctx.signals;
    (s.listing && s.data_noun && !s.advisory).then_some("data listing language")
}

/// Openers of open-ended questions that lean toward documents.
const QUESTION_OPENERS: &[&str] = &["what", "why", "explain", "describe", "tell me about"];

/// Catch-all confidence when the text names production data.
const CATCH_ALL_DATA: f64 = 0.5;
/// Catch-all confidence for open questions.
const CATCH_ALL_QUESTION: f64 = 0.45;

#[derive(Debug, Clone)]
pub struct RuleRouter {
    rules: &'static [Rule],
    rule_floor: f64,
    catch_all_floor: f64,
}

impl Default for RuleRouter {
    fn default() -> Self {
        Self::new(0.7, 0.3)
    }
}

impl RuleRouter {
    pub fn new(rule_floor: f64, catch_all_floor: f64) -> Self {
        Self {
            rules: RULES,
            rule_floor,
            catch_all_floor,
        }
    }

    pub fn rules(&self) -> &'static [Rule] {
        self.rules
    }

    /// First matching rule, if any.
    pub fn route_rules(&self, ctx: &RuleContext<'_>) -> Option<RouterDecision> {
        self.rules.iter().find_map(|rule| {
            let reason = (rule.matches)(ctx)?;
            let confidence = rule.confidence.max(self.rule_floor);
            debug!(
                rule = rule.name,
                priority = rule.priority,
                task = %rule.task,
                confidence,
                "routing rule matched"
            );
            let mut decision =
                RouterDecision::new(rule.task, confidence, reason, ctx.classification);
            decision.matched_rule = Some(rule.name.to_string());
            Some(decision)
        })
    }

    /// Final heuristic stage. Never fails to decide.
    pub fn catch_all(&self, ctx: &RuleContext<'_>) -> RouterDecision {
        let (task, confidence, reason) = if ctx.signals.data_noun {
            (
                Task::StructuredQuery,
                CATCH_ALL_DATA,
                "catch-all: mentions production data",
            )
        } else if contains_any(&ctx.tokens, QUESTION_OPENERS) || ctx.text.trim_end().ends_with('?')
        {
            (
                Task::Retrieval,
                CATCH_ALL_QUESTION,
                "catch-all: open question without data terms",
            )
        } else {
            (
                Task::StructuredQuery,
                self.catch_all_floor,
                "catch-all: no rule matched",
            )
        };
        debug!(task = %task, confidence, "catch-all routing");
        let mut decision = RouterDecision::new(
            task,
            confidence.max(self.catch_all_floor),
            reason,
            ctx.classification,
        );
        decision.matched_rule = Some("catch_all".to_string());
        decision
    }

    pub fn route(&self, ctx: &RuleContext<'_>) -> RouterDecision {
        self.route_rules(ctx).unwrap_or_else(|| self.catch_all(ctx))
    }
}

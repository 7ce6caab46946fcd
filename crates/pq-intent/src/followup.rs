//! Follow-up detection and parameter inheritance across turns.

use chrono::NaiveDate;
use pq_protocol::{Classification, ConversationTurn, EquipmentId, Intent, Parameters, Shift, Task};
use tracing::debug;

use crate::classifier::IntentClassifier;
use crate::fuzzy::{self, contains_any};

const CONTINUATION_OPENERS: &[&str] = &[
    "and",
    "also",
    "what about",
    "how about",
    "same for",
    "now for",
    "then",
];

const MODIFICATION_CUES: &[&str] = &[
    "instead",
    "only for",
    "but for",
    "exclude",
    "except",
    "excluding",
    "switch to",
    "make it",
    "same but",
    "without",
    "change to",
];

const EXCLUSION_CUES: &[&str] = &["exclude", "except", "excluding", "without"];

const PRONOUNS: &[&str] = &["it", "that", "those", "them", "this", "these", "same"];

/// Nouns that turn a preceding "this"/"that" into a time determiner.
const PERIOD_NOUNS: &[&str] = &[
    "day", "days", "week", "weeks", "month", "months", "year", "years", "shift", "shifts",
];

/// How a question refers back to the previous turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpKind {
    /// Leading connective: "and for shift B?"
    Continuation,
    /// Explicit change of prior constraints: "only for March instead".
    Modification,
    /// Short text that leans on a pronoun or only restates a parameter.
    PronounDelta,
}

/// State of the turn a follow-up refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorTurn {
    pub intent: Intent,
    pub parameters: Parameters,
    pub question: String,
    pub task: Option<Task>,
}

/// A resolved follow-up.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowUpContext {
    pub kind: FollowUpKind,
    /// Detection confidence in [0, 1].
    pub confidence: f64,
    pub prior: PriorTurn,
    /// Intent after inheritance.
    pub intent: Intent,
    pub inherited_intent: bool,
    /// Parameters stated in this turn only.
    pub delta: Parameters,
    /// Deterministic merge of `delta` over the prior parameters.
    pub parameters: Parameters,
    /// True when an external model should be asked to refine the merge.
    pub needs_model_merge: bool,
    /// Excluded equipment with no inherited equipment set to subtract from.
    pub unapplied_exclusions: Vec<EquipmentId>,
}

/// Tunable follow-up thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowUpConfig {
    /// Detection confidences in `[assist_low, assist_high)` ask for model help.
    pub assist_low: f64,
    pub assist_high: f64,
    /// Current intents below this confidence yield to the prior intent.
    pub inherit_below: f64,
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            assist_low: 0.5,
            assist_high: 0.75,
            inherit_below: 0.6,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FollowUpResolver {
    config: FollowUpConfig,
}

impl FollowUpResolver {
    pub fn new(config: FollowUpConfig) -> Self {
        Self { config }
    }

    /// Detect whether `text` continues `prior` and merge parameters if so.
    pub fn resolve(
        &self,
        text: &str,
        current: &Classification,
        prior: Option<&PriorTurn>,
    ) -> Option<FollowUpContext> {
        let prior = prior?;
        let (kind, confidence) = detect(text, current)?;

        // Intents carried only by parameters (no phrase matched) yield too.
        let inherited_intent = current.intent.is_generic()
            || current.confidence < self.config.inherit_below
            || current.matched_keywords.is_empty();
        let intent = if inherited_intent {
            prior.intent
        } else {
            current.intent
        };

        let delta = current.parameters.clone();
        let parameters = merge(text, &delta, &prior.parameters);
        let unapplied_exclusions = unapplied_exclusions(text, &delta, &prior.parameters);
        let needs_model_merge = kind == FollowUpKind::Modification
            || (self.config.assist_low..self.config.assist_high).contains(&confidence);

        debug!(
            ?kind,
            confidence,
            intent = %intent,
            inherited_intent,
            needs_model_merge,
            "follow-up resolved"
        );

        Some(FollowUpContext {
            kind,
            confidence,
            prior: prior.clone(),
            intent,
            inherited_intent,
            delta,
            parameters,
            needs_model_merge,
            unapplied_exclusions,
        })
    }

    /// Rebuild the prior turn from conversation history by re-classifying
    /// its question.
    pub fn prior_from_history(
        &self,
        classifier: &IntentClassifier,
        history: &[ConversationTurn],
        today: NaiveDate,
    ) -> Option<PriorTurn> {
        let last = history.iter().rev().find(|t| !t.question.trim().is_empty())?;
        let classification = classifier.classify_at(&last.question, today);
        Some(PriorTurn {
            intent: classification.intent,
            parameters: classification.parameters,
            question: last.question.clone(),
            task: last.task,
        })
    }
}

fn detect(text: &str, current: &Classification) -> Option<(FollowUpKind, f64)> {
    let tokens = fuzzy::tokenize(text);
    if tokens.is_empty() {
        return None;
    }

    if contains_any(&tokens, MODIFICATION_CUES) {
        return Some((FollowUpKind::Modification, 0.8));
    }

    let opens_with = |opener: &str| {
        let words: Vec<&str> = opener.split(' ').collect();
        tokens.len() >= words.len()
            && tokens.iter().zip(words.iter()).all(|(t, w)| t == w)
    };
    if CONTINUATION_OPENERS.iter().any(|o| opens_with(o)) {
        return Some((FollowUpKind::Continuation, 0.85));
    }

    let short = tokens.len() <= 6;
    if short && leans_on_pronoun(&tokens) {
        return Some((FollowUpKind::PronounDelta, 0.65));
    }
    // Only a restated parameter, no phrase of its own: "february?".
    if tokens.len() <= 5
        && current.intent.is_generic()
        && current.matched_keywords.is_empty()
        && !current.parameters.is_empty()
    {
        return Some((FollowUpKind::PronounDelta, 0.6));
    }
    None
}

/// A pronoun that is not the determiner of a period ("this month").
fn leans_on_pronoun(tokens: &[String]) -> bool {
    tokens.iter().enumerate().any(|(i, token)| {
        PRONOUNS.contains(&token.as_str())
            && !tokens
                .get(i + 1)
                .is_some_and(|next| PERIOD_NOUNS.contains(&next.as_str()))
    })
}

/// Deterministic merge: new fields override, unset fields inherit, and
/// "except"/"exclude" subtracts the named shifts or equipment from the
/// inherited set. Shifts subtract from all shifts when none were inherited;
/// equipment has no such universe, so an exclusion with nothing inherited
/// leaves the equipment filter empty (see [`unapplied_exclusions`]).
pub fn merge(text: &str, delta: &Parameters, inherited: &Parameters) -> Parameters {
    let tokens = fuzzy::tokenize(text);
    let excluding = contains_any(&tokens, EXCLUSION_CUES);
    if !excluding {
        return delta.merged_over(inherited);
    }

    let mut newer = delta.clone();
    newer.shifts.clear();
    newer.equipment.clear();
    let mut merged = newer.merged_over(inherited);

    if !delta.shifts.is_empty() {
        let base: Vec<Shift> = if inherited.shifts.is_empty() {
            Shift::ALL.to_vec()
        } else {
            inherited.shifts.clone()
        };
        merged.shifts = base
            .into_iter()
            .filter(|s| !delta.shifts.contains(s))
            .collect();
    }
    if !delta.equipment.is_empty() {
        merged.equipment = inherited
            .equipment
            .iter()
            .filter(|e| !delta.equipment.contains(e))
            .cloned()
            .collect();
    }
    merged
}

/// Equipment named in an exclusion that [`merge`] could not apply because
/// the prior turn carried no equipment filter.
pub fn unapplied_exclusions(
    text: &str,
    delta: &Parameters,
    inherited: &Parameters,
) -> Vec<EquipmentId> {
    let excluding = contains_any(&fuzzy::tokenize(text), EXCLUSION_CUES);
    if excluding && inherited.equipment.is_empty() {
        delta.equipment.clone()
    } else {
        Vec::new()
    }
}

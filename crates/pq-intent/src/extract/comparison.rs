use chrono::NaiveDate;
use pq_protocol::{Comparison, ComparisonKind, EquipmentId, Month, Shift};

use crate::fuzzy;
use crate::vocab::COMPARISON_CONNECTIVES;

/// Entities available to a comparison.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonInputs<'a> {
    pub dates: &'a [NaiveDate],
    pub equipment: &'a [EquipmentId],
    pub months: &'a [Month],
    pub shifts: &'a [Shift],
}

/// True when the text contains a comparison connective.
pub fn has_connective(tokens: &[String]) -> bool {
    fuzzy::contains_any(tokens, COMPARISON_CONNECTIVES)
}

/// Exactly two entities; a longer list is a filter, not a comparison.
fn pair<T>(items: &[T], render: impl Fn(&T) -> String, kind: ComparisonKind) -> Option<Comparison> {
    match items {
        [a, b] => Some(Comparison {
            entity_a: render(a),
            entity_b: render(b),
            kind,
        }),
        _ => None,
    }
}

/// Build a comparison when a connective and exactly two entities of one
/// kind exist.
///
/// Kind precedence: date, equipment, month, shift.
pub fn extract_comparison(tokens: &[String], inputs: ComparisonInputs<'_>) -> Option<Comparison> {
    if !has_connective(tokens) {
        return None;
    }
    pair(inputs.dates, |d| d.format("%Y-%m-%d").to_string(), ComparisonKind::Date)
        .or_else(|| pair(inputs.equipment, |e| e.to_string(), ComparisonKind::Equipment))
        .or_else(|| pair(inputs.months, |m| m.number().to_string(), ComparisonKind::Month))
        .or_else(|| pair(inputs.shifts, |s| s.as_str().to_string(), ComparisonKind::Shift))
}

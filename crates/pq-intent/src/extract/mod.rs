//! Intent-independent parameter extraction.
//!
//! Each sub-extractor looks for one kind of constraint; [`extract`] merges
//! their findings into a validated [`Parameters`] record.

pub mod comparison;
pub mod dates;
pub mod equipment;
pub mod limits;
pub mod ordinal;
pub mod shifts;
pub mod stats;

use chrono::NaiveDate;
use pq_protocol::Parameters;

use crate::fuzzy;

pub use comparison::{ComparisonInputs, extract_comparison, has_connective};
pub use dates::{DateMentions, extract_dates, month_from_name};
pub use equipment::{EQUIPMENT_PREFIXES, extract_equipment};
pub use limits::{extract_limit, extract_rank};
pub use ordinal::extract_row_ordinal;
pub use shifts::extract_shifts;
pub use stats::extract_stats;

/// Extract every recognizable constraint from `text`.
///
/// Relative dates resolve against `today`. A month is only set when exactly
/// one distinct month is named and no explicit date or range is present.
pub fn extract(text: &str, today: NaiveDate) -> Parameters {
    let tokens = fuzzy::tokenize(text);
    let comparing = has_connective(&tokens);

    let mentions = extract_dates(text, today, !comparing);
    let shifts = extract_shifts(text);
    let equipment = extract_equipment(text);

    let mut params = Parameters {
        date_range: mentions.range,
        year: mentions.year,
        row_ordinal: extract_row_ordinal(text),
        limit: extract_limit(text),
        rank: extract_rank(&tokens),
        ..Parameters::default()
    };

    if mentions.dates.len() == 1 {
        params.date = mentions.dates.first().copied();
    }
    if let [month] = mentions.months.as_slice()
        && params.date.is_none()
        && params.date_range.is_none()
    {
        params.month = Some(*month);
    }
    for shift in &shifts {
        params.add_shift(*shift);
    }
    for id in &equipment {
        params.add_equipment(id.clone());
    }

    params.comparison = extract_comparison(
        &tokens,
        ComparisonInputs {
            dates: &mentions.dates,
            equipment: &equipment,
            months: &mentions.months,
            shifts: &shifts,
        },
    );
    params.stats = extract_stats(&tokens, &params);
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use pq_protocol::{ComparisonKind, RankDirection, RowOrdinal, Shift};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()
    }

    #[test]
    fn chart_question_parameters() {
        let params = extract("have shift A, B, C production data with different color", today());
        assert_eq!(params.shifts, vec![Shift::A, Shift::B, Shift::C]);
        assert!(params.comparison.is_none());
        assert!(params.month.is_none());
        assert!(params.stats.is_none());
    }

    #[test]
    fn single_month_with_year() {
        let params = extract("total production for january 2025", today());
        assert_eq!(params.month.unwrap().number(), 1);
        assert_eq!(params.year, Some(2025));
    }

    #[test]
    fn two_months_compared() {
        let params = extract("january vs february tonnage", today());
        assert!(params.month.is_none());
        let cmp = params.comparison.unwrap();
        assert_eq!(cmp.kind, ComparisonKind::Month);
    }

    #[test]
    fn two_dates_compared_not_ranged() {
        let params = extract("compare 2025-01-03 and 2025-01-04", today());
        assert!(params.date_range.is_none());
        assert!(params.date.is_none());
        assert_eq!(params.comparison.unwrap().kind, ComparisonKind::Date);
    }

    #[test]
    fn ranking_parameters() {
        let params = extract("top 5 tippers by trips last week", today());
        assert_eq!(params.limit, Some(5));
        assert_eq!(params.rank, Some(RankDirection::Top));
        assert!(params.date_range.is_some());
    }

    #[test]
    fn ordinal_and_equipment() {
        let params = extract("show the 3rd row for EX-189", today());
        assert_eq!(params.row_ordinal, Some(RowOrdinal::Nth(3)));
        assert_eq!(params.equipment[0].as_str(), "EX-189");
    }

    #[test]
    fn three_shifts_joined_by_or_stay_a_filter() {
        let params = extract("total production for shift A, B or C", today());
        assert_eq!(params.shifts, vec![Shift::A, Shift::B, Shift::C]);
        assert!(params.comparison.is_none());
    }

    #[test]
    fn three_machines_joined_by_or_stay_a_filter() {
        let params = extract("trips for EX-1, EX-2 or EX-3", today());
        assert_eq!(params.equipment.len(), 3);
        assert!(params.comparison.is_none());
    }

    #[test]
    fn two_shifts_joined_by_or_compare() {
        let params = extract("production for shift A or B", today());
        let cmp = params.comparison.unwrap();
        assert_eq!(cmp.kind, ComparisonKind::Shift);
        assert_eq!((cmp.entity_a.as_str(), cmp.entity_b.as_str()), ("A", "B"));
    }

    #[test]
    fn empty_text() {
        assert!(extract("", today()).is_empty());
    }
}

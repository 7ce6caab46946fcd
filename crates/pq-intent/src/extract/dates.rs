//! Explicit dates, relative periods, month names and years.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Datelike, Days, Months, NaiveDate};
use pq_protocol::{DateRange, Month};
use regex::Regex;

use crate::fuzzy::{self, match_term};

const MONTH_ALTERNATION: &str = "january|february|march|april|may|june|july|august|september|october|november|december|sept|jan|feb|mar|apr|jun|jul|aug|sep|oct|nov|dec";

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());

static NUMERIC_DMY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b").unwrap());

static DAY_MONTH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({MONTH_ALTERNATION})\b\.?,?(?:\s+(\d{{4}})\b)?"
    ))
    .unwrap()
});

static MONTH_NAME_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b({MONTH_ALTERNATION})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(\d{{4}})\b)?"
    ))
    .unwrap()
});

static LAST_N_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:last|past|previous)\s+(\d{1,3})\s+days?\b").unwrap());

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());

static RANGE_CONNECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:from|between|to|till|until|through)\b|\s[-–]\s").unwrap());

/// Everything date-like found in one question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateMentions {
    /// Explicit calendar dates, in text order, without duplicates.
    pub dates: Vec<NaiveDate>,
    pub range: Option<DateRange>,
    /// Month names outside explicit dates, in text order, without duplicates.
    pub months: Vec<Month>,
    pub year: Option<i32>,
}

/// Month number for a full or abbreviated name.
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let number = match lower.trim_end_matches('.') {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(number)
}

// Long names tolerate typos; short ones collide with ordinary words
// ("march" / "match") so they must be spelled exactly.
const FUZZY_MONTHS: [(&str, u32); 7] = [
    ("january", 1),
    ("february", 2),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

fn month_from_token(token: &str) -> Option<u32> {
    if token == "may" {
        return None;
    }
    if let Some(n) = month_from_name(token) {
        return Some(n);
    }
    FUZZY_MONTHS
        .iter()
        .find(|(name, _)| match_term(token, name).is_some())
        .map(|(_, n)| *n)
}

fn parse_u32(s: &str) -> Option<u32> {
    s.parse().ok()
}

/// Collect explicit dates, relative periods, months and years.
///
/// `range_allowed` is false when the text compares two dates, in which case
/// two explicit dates stay separate instead of forming a range.
pub fn extract_dates(text: &str, today: NaiveDate, range_allowed: bool) -> DateMentions {
    let lower = text.to_lowercase();
    let mut found: Vec<(Range<usize>, NaiveDate)> = Vec::new();

    let mut record = |date: Option<NaiveDate>, span: Range<usize>| {
        let taken = found
            .iter()
            .any(|(s, _)| s.start < span.end && span.start < s.end);
        if let Some(d) = date
            && !taken
        {
            found.push((span, d));
        }
    };

    for caps in ISO_DATE.captures_iter(&lower) {
        let date = (|| {
            let y = caps[1].parse::<i32>().ok()?;
            NaiveDate::from_ymd_opt(y, parse_u32(&caps[2])?, parse_u32(&caps[3])?)
        })();
        record(date, caps.get(0).map_or(0..0, |m| m.range()));
    }
    for caps in NUMERIC_DMY.captures_iter(&lower) {
        let date = (|| {
            let y = caps[3].parse::<i32>().ok()?;
            NaiveDate::from_ymd_opt(y, parse_u32(&caps[2])?, parse_u32(&caps[1])?)
        })();
        record(date, caps.get(0).map_or(0..0, |m| m.range()));
    }
    for caps in DAY_MONTH_NAME.captures_iter(&lower) {
        let date = (|| {
            let year = match caps.get(3) {
                Some(y) => y.as_str().parse::<i32>().ok()?,
                None => today.year(),
            };
            NaiveDate::from_ymd_opt(year, month_from_name(&caps[2])?, parse_u32(&caps[1])?)
        })();
        record(date, caps.get(0).map_or(0..0, |m| m.range()));
    }
    for caps in MONTH_NAME_DAY.captures_iter(&lower) {
        let date = (|| {
            let year = match caps.get(3) {
                Some(y) => y.as_str().parse::<i32>().ok()?,
                None => today.year(),
            };
            NaiveDate::from_ymd_opt(year, month_from_name(&caps[1])?, parse_u32(&caps[2])?)
        })();
        record(date, caps.get(0).map_or(0..0, |m| m.range()));
    }

    // Text order, regardless of which pattern found each date.
    found.sort_by_key(|(span, _)| span.start);
    let spans: Vec<Range<usize>> = found.iter().map(|(span, _)| span.clone()).collect();
    let mut dates: Vec<NaiveDate> = Vec::new();
    for (_, date) in &found {
        if !dates.contains(date) {
            dates.push(*date);
        }
    }

    let mut range = None;
    if range_allowed && dates.len() == 2 && RANGE_CONNECTIVE.is_match(&lower) {
        let (a, b) = (dates[0], dates[1]);
        range = DateRange::new(a.min(b), a.max(b)).ok();
        dates.clear();
    }

    if range.is_none() && dates.is_empty() {
        range = relative_range(&lower, today);
        if range.is_none()
            && let Some(date) = relative_date(&lower, today)
        {
            dates.push(date);
        }
    }

    // Blank out consumed spans before looking for bare months and years.
    let mut residual = lower.clone();
    for span in &spans {
        residual.replace_range(span.clone(), &" ".repeat(span.len()));
    }

    let months = bare_months(&residual);
    let year = YEAR
        .captures(&residual)
        .and_then(|caps| caps[1].parse::<i32>().ok());

    DateMentions {
        dates,
        range,
        months,
        year,
    }
}

fn bare_months(residual: &str) -> Vec<Month> {
    let tokens = fuzzy::tokenize(residual);
    let mut months = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        let number = if token == "may" {
            let prev = i.checked_sub(1).and_then(|p| tokens.get(p));
            let next = tokens.get(i + 1);
            let next_to_number = prev.is_some_and(|t| t.chars().all(|c| c.is_ascii_digit()))
                || next.is_some_and(|t| t.chars().all(|c| c.is_ascii_digit()));
            let after_preposition =
                prev.is_some_and(|t| matches!(t.as_str(), "in" | "for" | "of" | "during"));
            (next_to_number || after_preposition).then_some(5)
        } else {
            month_from_token(token)
        };
        if let Some(month) = number.and_then(|n| Month::new(n).ok())
            && !months.contains(&month)
        {
            months.push(month);
        }
    }
    months
}

fn relative_range(lower: &str, today: NaiveDate) -> Option<DateRange> {
    let yesterday = today.checked_sub_days(Days::new(1))?;

    if let Some(caps) = LAST_N_DAYS.captures(lower) {
        let n = caps[1].parse::<u64>().ok().filter(|n| *n > 0)?;
        let start = today.checked_sub_days(Days::new(n))?;
        return DateRange::new(start, yesterday).ok();
    }

    let tokens = fuzzy::tokenize(lower);
    let has = |phrase: &str| fuzzy::find_phrase(&tokens, phrase).is_some_and(|m| m.matched.distance == 0);

    if has("last week") || has("past week") || has("previous week") {
        let start = today.checked_sub_days(Days::new(7))?;
        return DateRange::new(start, yesterday).ok();
    }
    if has("this week") {
        let offset = u64::from(today.weekday().num_days_from_monday());
        let start = today.checked_sub_days(Days::new(offset))?;
        return DateRange::new(start, today).ok();
    }
    if has("this month") {
        let start = today.with_day(1)?;
        return DateRange::new(start, today).ok();
    }
    if has("last month") || has("previous month") {
        let first_this = today.with_day(1)?;
        let start = first_this.checked_sub_months(Months::new(1))?;
        let end = first_this.checked_sub_days(Days::new(1))?;
        return DateRange::new(start, end).ok();
    }
    None
}

fn relative_date(lower: &str, today: NaiveDate) -> Option<NaiveDate> {
    let tokens = fuzzy::tokenize(lower);
    if tokens.iter().any(|t| t == "yesterday") {
        return today.checked_sub_days(Days::new(1));
    }
    if tokens.iter().any(|t| t == "today") {
        return Some(today);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2025, 3, 12)
    }

    #[test]
    fn explicit_formats() {
        let m = extract_dates("production on 2025-01-05", today(), true);
        assert_eq!(m.dates, vec![date(2025, 1, 5)]);

        let m = extract_dates("trips on 05/01/2025", today(), true);
        assert_eq!(m.dates, vec![date(2025, 1, 5)]);

        let m = extract_dates("output on 5th jan 2025", today(), true);
        assert_eq!(m.dates, vec![date(2025, 1, 5)]);

        let m = extract_dates("output on January 7", today(), true);
        assert_eq!(m.dates, vec![date(2025, 1, 7)]);
    }

    #[test]
    fn dates_do_not_leak_into_months() {
        let m = extract_dates("output on 5th jan 2025", today(), true);
        assert!(m.months.is_empty());
        assert!(m.year.is_none());
    }

    #[test]
    fn two_dates_with_connective_form_range() {
        let m = extract_dates("from 2025-01-10 to 2025-01-03", today(), true);
        let range = m.range.unwrap();
        assert_eq!(range.start(), date(2025, 1, 3));
        assert_eq!(range.end(), date(2025, 1, 10));
        assert!(m.dates.is_empty());
    }

    #[test]
    fn compared_dates_stay_separate() {
        let m = extract_dates("2025-01-03 vs 2025-01-04", today(), false);
        assert_eq!(m.dates.len(), 2);
        assert!(m.range.is_none());
    }

    #[test]
    fn relative_periods() {
        let m = extract_dates("production last week", today(), true);
        let range = m.range.unwrap();
        assert_eq!(range.start(), date(2025, 3, 5));
        assert_eq!(range.end(), date(2025, 3, 11));

        let m = extract_dates("trips in the last 3 days", today(), true);
        assert_eq!(m.range.unwrap().start(), date(2025, 3, 9));

        let m = extract_dates("tons last month", today(), true);
        let range = m.range.unwrap();
        assert_eq!(range.start(), date(2025, 2, 1));
        assert_eq!(range.end(), date(2025, 2, 28));

        let m = extract_dates("what did we haul yesterday", today(), true);
        assert_eq!(m.dates, vec![date(2025, 3, 11)]);
    }

    #[test]
    fn month_names_with_typos_and_abbreviations() {
        let m = extract_dates("production for janaury and feb", today(), true);
        assert_eq!(
            m.months,
            vec![Month::new(1).unwrap(), Month::new(2).unwrap()]
        );
    }

    #[test]
    fn may_needs_context() {
        assert!(extract_dates("may I see the data", today(), true).months.is_empty());
        let m = extract_dates("production in may", today(), true);
        assert_eq!(m.months, vec![Month::new(5).unwrap()]);
    }

    #[test]
    fn match_is_not_march() {
        assert!(extract_dates("best tipper match up", today(), true).months.is_empty());
    }

    #[test]
    fn bare_year() {
        let m = extract_dates("monthly production 2024", today(), true);
        assert_eq!(m.year, Some(2024));
    }
}

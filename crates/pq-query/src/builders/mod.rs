//! Shape-specific query builders.
//!
//! Each builder looks at the extracted parameters and the raw question and
//! either returns a query for its shape or declines with `None`. Builders
//! are tried in [`BUILDERS`] order and the first one that applies wins;
//! ambiguity between shapes is settled by that order alone.

pub mod comparison;
pub mod efficiency;
pub mod equipment;
pub mod ordinal;
pub mod ranking;
pub mod shift;
pub mod statistical;
pub mod summary;

use chrono::{Datelike, NaiveDate};
use pq_intent::Signals;
use pq_intent::extract::stats;
use pq_intent::fuzzy::{self, contains_any};
use pq_protocol::{Parameters, Shift};
use tracing::{debug, info};

use crate::error::BuildError;
use crate::ir::{DatePart, Expr, Literal, Predicate, SelectQuery};
use crate::safety::SafetyValidator;
use crate::schema::{PRODUCTION_TABLE, TRIP_TABLE, date_column, equipment_column};

/// Row count of the fallback listing when no limit was asked for.
pub const DEFAULT_LISTING_ROWS: u32 = 100;

/// Everything a builder may look at.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    pub params: &'a Parameters,
    pub text: &'a str,
    pub tokens: Vec<String>,
    pub signals: Signals,
    /// Reference date for "current year" defaults.
    pub today: NaiveDate,
}

impl<'a> BuildRequest<'a> {
    pub fn new(params: &'a Parameters, text: &'a str, today: NaiveDate) -> Self {
        let tokens = fuzzy::tokenize(text);
        let signals = Signals::from_tokens(&tokens);
        Self {
            params,
            text,
            tokens,
            signals,
            today,
        }
    }

    pub fn mentions(&self, phrases: &[&str]) -> bool {
        contains_any(&self.tokens, phrases)
    }

    /// Explicit year, or the current one.
    pub fn year(&self) -> i32 {
        self.params.year.unwrap_or_else(|| self.today.year())
    }

    pub fn mentions_shifts(&self) -> bool {
        self.signals.shift || !self.params.shifts.is_empty()
    }

    pub fn mentions_equipment(&self) -> bool {
        !self.params.equipment.is_empty()
            || self.mentions(&["tipper", "truck", "excavator", "shovel", "equipment"])
    }

    /// Metric column the question is about, mapped onto `table`.
    pub fn metric(&self, table: &str) -> Option<&'static str> {
        metric_on(stats::target_column(&self.tokens), table)
    }
}

/// Map a production metric onto `table`. Trip rows carry no operating hours.
pub fn metric_on(column: &str, table: &str) -> Option<&'static str> {
    match (table, column) {
        (TRIP_TABLE, "production_tons" | "total_tons") => Some("total_tons"),
        (TRIP_TABLE, "trip_count") => Some("trip_count"),
        (TRIP_TABLE, _) => None,
        (_, "production_tons" | "total_tons") => Some("production_tons"),
        (_, "trip_count") => Some("trip_count"),
        (_, "operating_hours") => Some("operating_hours"),
        _ => None,
    }
}

pub type Builder = fn(&BuildRequest<'_>) -> Option<SelectQuery>;

/// Builders in priority order.
pub const BUILDERS: &[(&str, Builder)] = &[
    ("ordinal_row", ordinal::ordinal_row),
    ("equipment_ranking", equipment::equipment_ranking),
    ("statistical", statistical::statistical),
    ("comparison", comparison::comparison),
    ("shift_series", shift::shift_series),
    ("shift_aggregation", shift::shift_aggregation),
    ("efficiency", efficiency::efficiency),
    ("top_n", ranking::top_n),
    ("period_summary", summary::period_summary),
];

/// First builder that applies, with its name.
pub fn dispatch(req: &BuildRequest<'_>) -> Option<(&'static str, SelectQuery)> {
    BUILDERS.iter().find_map(|(name, build)| {
        let query = build(req)?;
        debug!(builder = name, "query builder applied");
        Some((*name, query))
    })
}

/// Latest rows honoring whatever filters were extracted.
pub fn listing_query(req: &BuildRequest<'_>) -> SelectQuery {
    let table = if req.params.equipment.is_empty() {
        PRODUCTION_TABLE
    } else {
        TRIP_TABLE
    };
    apply_filters(SelectQuery::from_table(table), req, Handled::default())
        .order(Expr::col(date_column(table)), true)
        .limit(req.params.limit.unwrap_or(DEFAULT_LISTING_ROWS))
}

/// Validated query text and the builder that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub builder: &'static str,
    pub query: String,
}

fn validated(
    builder: &'static str,
    query: &SelectQuery,
    validator: &SafetyValidator,
) -> Result<BuiltQuery, BuildError> {
    let query = validator
        .validate(&query.to_string())
        .map_err(|source| BuildError::Unsafe { builder, source })?;
    info!(builder, query = %query, "query built");
    Ok(BuiltQuery { builder, query })
}

/// Run the builders and validate the winner.
pub fn build_validated(
    req: &BuildRequest<'_>,
    validator: &SafetyValidator,
) -> Result<BuiltQuery, BuildError> {
    let (builder, query) = dispatch(req).ok_or(BuildError::NoBuilder)?;
    validated(builder, &query, validator)
}

/// Like [`build_validated`], but falls back to the listing query.
pub fn build_or_list(
    req: &BuildRequest<'_>,
    validator: &SafetyValidator,
) -> Result<BuiltQuery, BuildError> {
    match dispatch(req) {
        Some((builder, query)) => validated(builder, &query, validator),
        None => validated("listing", &listing_query(req), validator),
    }
}

// ── Shared filter helpers ──────────────────────────────────────

/// Filter dimensions a builder already constrained itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Handled {
    pub date: bool,
    /// Month and year.
    pub month: bool,
    pub shifts: bool,
    pub equipment: bool,
}

fn text_values<I, S>(values: I) -> Vec<Literal>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(|v| Literal::Text(v.into())).collect()
}

/// `expr = v` for one value, `expr IN (..)` for several.
pub fn eq_or_in(expr: Expr, mut values: Vec<Literal>) -> Option<Predicate> {
    match values.len() {
        0 => None,
        1 => values.pop().map(|v| Predicate::Eq(expr, v)),
        _ => Some(Predicate::In(expr, values)),
    }
}

pub fn shift_predicate(shifts: &[Shift]) -> Option<Predicate> {
    eq_or_in(
        Expr::col("shift"),
        text_values(shifts.iter().map(|s| s.as_str())),
    )
}

/// Add the extracted constraints not in `handled` as WHERE predicates.
///
/// A month without a year is pinned to the current year. Equipment filters
/// only apply to the trip table.
pub fn apply_filters(mut query: SelectQuery, req: &BuildRequest<'_>, handled: Handled) -> SelectQuery {
    let params = req.params;
    let date = date_column(&query.from);

    if !handled.date {
        if let Some(day) = params.date {
            query = query.filter(Predicate::Eq(Expr::col(date), Literal::Date(day)));
        }
        if let Some(range) = params.date_range {
            query = query.filter(Predicate::Between(
                Expr::col(date),
                Literal::Date(range.start()),
                Literal::Date(range.end()),
            ));
        }
    }

    if !handled.month {
        if let Some(month) = params.month {
            query = query
                .filter(Predicate::Eq(
                    Expr::extract(DatePart::Month, date),
                    Literal::Int(i64::from(month.number())),
                ))
                .filter(Predicate::Eq(
                    Expr::extract(DatePart::Year, date),
                    Literal::Int(i64::from(req.year())),
                ));
        } else if let Some(year) = params.year {
            query = query.filter(Predicate::Eq(
                Expr::extract(DatePart::Year, date),
                Literal::Int(i64::from(year)),
            ));
        }
    }

    if !handled.shifts
        && let Some(predicate) = shift_predicate(&params.shifts)
    {
        query = query.filter(predicate);
    }

    if !handled.equipment && query.from == TRIP_TABLE {
        for column in ["tipper_id", "excavator"] {
            let ids = params
                .equipment
                .iter()
                .filter(|id| equipment_column(id.prefix()) == column)
                .map(|id| id.as_str().to_string());
            if let Some(predicate) = eq_or_in(Expr::col(column), text_values(ids)) {
                query = query.filter(predicate);
            }
        }
    }

    query
}

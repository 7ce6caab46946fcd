//! Shift-level series and aggregates.

use pq_protocol::RankDirection;

use super::{BuildRequest, Handled, apply_filters};
use crate::ir::{AggFunc, Expr, SelectQuery};
use crate::schema::PRODUCTION_TABLE;

/// Chart data per date and shift. Rows stay unaggregated so each shift can
/// be drawn as its own series.
pub fn shift_series(req: &BuildRequest<'_>) -> Option<SelectQuery> {
    if !req.signals.visualization || !req.mentions_shifts() {
        return None;
    }
    let metric = req.metric(PRODUCTION_TABLE)?;
    let query = SelectQuery::from_table(PRODUCTION_TABLE).select_columns(&["date", "shift", metric]);
    Some(
        apply_filters(query, req, Handled::default())
            .order(Expr::col("date"), false)
            .order(Expr::col("shift"), false),
    )
}

/// Totals (or averages) per shift; with a superlative, only the best or
/// worst shifts.
pub fn shift_aggregation(req: &BuildRequest<'_>) -> Option<SelectQuery> {
    if !req.mentions_shifts() || !(req.signals.aggregation || req.signals.superlative) {
        return None;
    }
    let metric = req.metric(PRODUCTION_TABLE)?;
    let (func, prefix) = if req.mentions(&["average", "avg", "mean"]) {
        (AggFunc::Avg, "avg")
    } else {
        (AggFunc::Sum, "total")
    };
    let alias = format!("{prefix}_{metric}");

    let query = SelectQuery::from_table(PRODUCTION_TABLE)
        .select(Expr::col("shift"))
        .select_as(Expr::agg(func, Expr::col(metric)), &alias);
    let query = apply_filters(query, req, Handled::default()).group(Expr::col("shift"));

    let query = if req.signals.superlative {
        query
            .order(
                Expr::col(&alias),
                req.params.rank != Some(RankDirection::Bottom),
            )
            .limit(req.params.limit.unwrap_or(1))
    } else {
        query.order(Expr::col("shift"), false)
    };
    Some(query)
}

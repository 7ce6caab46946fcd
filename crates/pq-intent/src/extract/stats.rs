use pq_protocol::{FilterDim, GroupDim, Parameters, SortOrder, StatOp, StatQueryType, StatTemplate};

use crate::fuzzy::{contains_any, contains_phrase};
use crate::vocab::GENERAL_STATS;

const OPERATION_PHRASES: [(StatOp, &[&str]); 8] = [
    (StatOp::Count, &["count", "number of"]),
    (StatOp::Mean, &["mean", "average", "avg"]),
    (StatOp::Median, &["median"]),
    (StatOp::Mode, &["mode"]),
    (
        StatOp::StdDev,
        &["standard deviation", "std dev", "stddev", "std deviation"],
    ),
    (StatOp::Min, &["minimum", "min"]),
    (StatOp::Max, &["maximum", "max"]),
    (StatOp::Sum, &["sum", "total"]),
];

const GROUPINGS: [(GroupDim, &[&str]); 5] = [
    (
        GroupDim::Shift,
        &["by shift", "per shift", "shift wise", "each shift", "for every shift"],
    ),
    (
        GroupDim::Month,
        &["by month", "per month", "monthly", "month wise", "each month"],
    ),
    (
        GroupDim::Date,
        &["by date", "per day", "by day", "daily", "day wise", "each day"],
    ),
    (
        GroupDim::Tipper,
        &["by tipper", "per tipper", "tipper wise", "each tipper"],
    ),
    (
        GroupDim::Excavator,
        &["by excavator", "per excavator", "excavator wise", "each excavator"],
    ),
];

/// Operations that make a request statistical on their own.
const DISTRIBUTION_OPS: [StatOp; 4] = [StatOp::Mean, StatOp::Median, StatOp::Mode, StatOp::StdDev];

/// Column the statistics are computed over.
pub fn target_column(tokens: &[String]) -> &'static str {
    if contains_any(tokens, &["trip", "trip count", "loads"]) {
        "trip_count"
    } else if contains_any(tokens, &["operating hours", "hours", "hour"]) {
        "operating_hours"
    } else {
        "production_tons"
    }
}

/// Grouping dimension requested by the text.
pub fn group_by(tokens: &[String]) -> Option<GroupDim> {
    GROUPINGS
        .iter()
        .find(|(_, phrases)| contains_any(tokens, phrases))
        .map(|(dim, _)| *dim)
}

fn explicit_operations(tokens: &[String]) -> Vec<StatOp> {
    OPERATION_PHRASES
        .iter()
        .filter(|(_, phrases)| phrases.iter().any(|p| contains_phrase(tokens, p)))
        .map(|(op, _)| *op)
        .collect()
}

fn filters(params: &Parameters) -> Vec<FilterDim> {
    let mut out = Vec::new();
    if params.date.is_some() {
        out.push(FilterDim::Date);
    }
    if params.date_range.is_some() {
        out.push(FilterDim::DateRange);
    }
    if params.month.is_some() {
        out.push(FilterDim::Month);
    }
    if params.year.is_some() {
        out.push(FilterDim::Year);
    }
    if !params.shifts.is_empty() {
        out.push(FilterDim::Shift);
    }
    if !params.equipment.is_empty() {
        out.push(FilterDim::Equipment);
    }
    out
}

/// Statistical template, present only for distribution statistics
/// (mean, median, mode, standard deviation) or a general "statistics"
/// request. A general request with no explicit operation expands to the
/// full operation set.
pub fn extract_stats(tokens: &[String], params: &Parameters) -> Option<StatTemplate> {
    let general = contains_any(tokens, GENERAL_STATS) || tokens.iter().any(|t| t == "stats");
    let explicit = explicit_operations(tokens);
    let distribution = explicit.iter().any(|op| DISTRIBUTION_OPS.contains(op));
    if !general && !distribution {
        return None;
    }

    let operations = if explicit.is_empty() {
        StatOp::FULL.to_vec()
    } else {
        explicit
    };

    let group_by = group_by(tokens);
    let order_by = if contains_any(tokens, &["ascending", "asc", "lowest first"]) {
        Some(SortOrder::Asc)
    } else if contains_any(tokens, &["descending", "desc", "highest first"]) {
        Some(SortOrder::Desc)
    } else {
        None
    };

    Some(StatTemplate {
        operations,
        target_column: target_column(tokens).to_string(),
        group_by,
        filters: filters(params),
        query_type: if group_by.is_some() {
            StatQueryType::Grouped
        } else {
            StatQueryType::Aggregate
        },
        order_by,
    })
}

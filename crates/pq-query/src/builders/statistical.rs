//! Descriptive statistics over one metric, optionally grouped.

use pq_protocol::{GroupDim, SortOrder, StatOp, StatQueryType};

use super::{BuildRequest, Handled, apply_filters, metric_on};
use crate::ir::{AggFunc, DatePart, Expr, SelectQuery};
use crate::schema::{PRODUCTION_TABLE, TRIP_TABLE, date_column};

fn stat_expr(op: StatOp, column: &str) -> Expr {
    let func = match op {
        StatOp::Count => AggFunc::Count,
        StatOp::Mean => AggFunc::Avg,
        StatOp::Median => AggFunc::Median,
        StatOp::Mode => AggFunc::Mode,
        StatOp::StdDev => AggFunc::StddevPop,
        StatOp::Min => AggFunc::Min,
        StatOp::Max => AggFunc::Max,
        StatOp::Sum => AggFunc::Sum,
    };
    Expr::agg(func, Expr::col(column))
}

fn group_expr(dim: GroupDim, table: &str) -> (Expr, &'static str) {
    match dim {
        GroupDim::Shift => (Expr::col("shift"), "shift"),
        GroupDim::Month => (Expr::extract(DatePart::Month, date_column(table)), "month"),
        GroupDim::Date => (Expr::col(date_column(table)), date_column(table)),
        GroupDim::Tipper => (Expr::col("tipper_id"), "tipper_id"),
        GroupDim::Excavator => (Expr::col("excavator"), "excavator"),
    }
}

/// Statistics from the extracted template. Declines when the metric does
/// not exist on the table the grouping needs.
pub fn statistical(req: &BuildRequest<'_>) -> Option<SelectQuery> {
    let template = req.params.stats.as_ref()?;
    let needs_trips = matches!(
        template.group_by,
        Some(GroupDim::Tipper | GroupDim::Excavator)
    ) || !req.params.equipment.is_empty();
    let table = if needs_trips { TRIP_TABLE } else { PRODUCTION_TABLE };
    let column = metric_on(&template.target_column, table)?;

    let mut query = SelectQuery::from_table(table);
    let group = template
        .group_by
        .filter(|_| template.query_type == StatQueryType::Grouped)
        .map(|dim| group_expr(dim, table));
    if let Some((expr, alias)) = &group {
        query = match expr {
            Expr::Column(_) => query.select(expr.clone()),
            _ => query.select_as(expr.clone(), alias),
        }
        .group(expr.clone());
    }
    for op in &template.operations {
        query = query.select_as(stat_expr(*op, column), &format!("{}_{column}", op.as_str()));
    }
    query = apply_filters(query, req, Handled::default());

    if let Some((expr, _)) = group {
        query = query.order(expr, template.order_by == Some(SortOrder::Desc));
    }
    Some(query)
}

#[cfg(test)]
mod tests {
    use crate::builders::tests::build;

    #[test]
    fn general_request_expands_to_full_set() {
        let (name, sql) = build("statistical analysis of production by shift").unwrap();
        assert_eq!(name, "statistical");
        assert_eq!(
            sql,
            "SELECT shift, COUNT(production_tons) AS count_production_tons, \
             AVG(production_tons) AS mean_production_tons, \
             PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY production_tons) AS median_production_tons, \
             MODE() WITHIN GROUP (ORDER BY production_tons) AS mode_production_tons, \
             STDDEV_POP(production_tons) AS std_dev_production_tons, \
             MIN(production_tons) AS min_production_tons, \
             MAX(production_tons) AS max_production_tons, \
             SUM(production_tons) AS sum_production_tons \
             FROM production_summary GROUP BY shift ORDER BY shift"
        );
    }

    #[test]
    fn explicit_operations_only() {
        let (_, sql) = build("median and standard deviation of trips in january").unwrap();
        assert_eq!(
            sql,
            "SELECT PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY trip_count) AS median_trip_count, \
             STDDEV_POP(trip_count) AS std_dev_trip_count FROM production_summary \
             WHERE EXTRACT(MONTH FROM date) = 1 AND EXTRACT(YEAR FROM date) = 2025"
        );
    }

    #[test]
    fn tipper_grouping_moves_to_trip_table() {
        let (_, sql) = build("average tons by tipper").unwrap();
        assert_eq!(
            sql,
            "SELECT tipper_id, AVG(total_tons) AS mean_total_tons \
             FROM trip_summary GROUP BY tipper_id ORDER BY tipper_id"
        );
    }

    #[test]
    fn hours_per_tipper_is_declined() {
        let built = build("mean operating hours by tipper");
        assert!(built.is_none_or(|(name, _)| name != "statistical"));
    }
}

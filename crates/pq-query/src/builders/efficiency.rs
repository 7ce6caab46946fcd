//! Tons-per-trip and tons-per-hour ratios.

use pq_intent::extract::stats;
use pq_protocol::GroupDim;

use super::{BuildRequest, Handled, apply_filters};
use crate::ir::{DatePart, Expr, SelectQuery};
use crate::schema::{PRODUCTION_TABLE, TRIP_TABLE, date_column, tons_column};

const RATIO_PLACES: u32 = 2;

fn ratio(numerator: &str, denominator: &str) -> Expr {
    Expr::round(
        Expr::ratio(Expr::sum(numerator), Expr::sum(denominator)),
        RATIO_PLACES,
    )
}

pub fn efficiency(req: &BuildRequest<'_>) -> Option<SelectQuery> {
    if !req.signals.efficiency {
        return None;
    }
    let grouping = stats::group_by(&req.tokens);
    let per_equipment = matches!(grouping, Some(GroupDim::Tipper | GroupDim::Excavator))
        || !req.params.equipment.is_empty();
    let table = if per_equipment { TRIP_TABLE } else { PRODUCTION_TABLE };
    let date = date_column(table);

    let group = grouping.map(|dim| match dim {
        GroupDim::Shift => (Expr::col("shift"), None),
        GroupDim::Month => (Expr::extract(DatePart::Month, date), Some("month")),
        GroupDim::Date => (Expr::col(date), None),
        GroupDim::Tipper => (Expr::col("tipper_id"), None),
        GroupDim::Excavator => (Expr::col("excavator"), None),
    });

    let mut query = SelectQuery::from_table(table);
    if let Some((expr, alias)) = &group {
        query = match alias {
            Some(alias) => query.select_as(expr.clone(), alias),
            None => query.select(expr.clone()),
        };
    }
    query = query.select_as(ratio(tons_column(table), "trip_count"), "tons_per_trip");
    // Trip rows carry no operating hours.
    if table == PRODUCTION_TABLE {
        query = query.select_as(ratio("production_tons", "operating_hours"), "tons_per_hour");
    }
    query = apply_filters(query, req, Handled::default());

    if let Some((expr, _)) = group {
        query = query.group(expr.clone()).order(expr, false);
    }
    Some(query)
}

#[cfg(test)]
mod tests {
    use crate::builders::tests::build;

    #[test]
    fn monthly_efficiency() {
        let (name, sql) = build("tons per trip efficiency by month").unwrap();
        assert_eq!(name, "efficiency");
        assert_eq!(
            sql,
            "SELECT EXTRACT(MONTH FROM date) AS month, \
             ROUND(CAST(SUM(production_tons) / NULLIF(SUM(trip_count), 0) AS NUMERIC), 2) AS tons_per_trip, \
             ROUND(CAST(SUM(production_tons) / NULLIF(SUM(operating_hours), 0) AS NUMERIC), 2) AS tons_per_hour \
             FROM production_summary GROUP BY EXTRACT(MONTH FROM date) \
             ORDER BY EXTRACT(MONTH FROM date)"
        );
    }

    #[test]
    fn per_tipper_efficiency_has_no_hours() {
        let (_, sql) = build("productivity per tipper").unwrap();
        assert!(sql.starts_with("SELECT tipper_id, ROUND("), "{sql}");
        assert!(sql.contains("SUM(total_tons)"), "{sql}");
        assert!(!sql.contains("operating_hours"), "{sql}");
        assert!(sql.ends_with("GROUP BY tipper_id ORDER BY tipper_id"), "{sql}");
    }
}

//! Month, year and period summaries.

use super::{BuildRequest, Handled, apply_filters};
use crate::ir::{DatePart, Expr, Literal, Predicate, SelectQuery};
use crate::schema::{PRODUCTION_TABLE, date_column};

fn totals(query: SelectQuery) -> SelectQuery {
    query
        .select_as(Expr::sum("production_tons"), "total_tons")
        .select_as(Expr::sum("trip_count"), "total_trips")
        .select_as(Expr::sum("operating_hours"), "total_hours")
}

/// Totals for a month, a filtered period, or month by month for a year.
///
/// Declines on superlative or shift-comparison language, which the more
/// specific builders own.
pub fn period_summary(req: &BuildRequest<'_>) -> Option<SelectQuery> {
    let signals = &req.signals;
    if signals.superlative || signals.shift_comparison {
        return None;
    }
    let base = SelectQuery::from_table(PRODUCTION_TABLE);

    if req.params.month.is_some() {
        return Some(apply_filters(totals(base), req, Handled::default()));
    }

    let dated = req.params.date.is_some() || req.params.date_range.is_some();
    if signals.period_summary && !dated {
        let date = date_column(PRODUCTION_TABLE);
        let month = Expr::extract(DatePart::Month, date);
        let query = totals(base.select_as(month.clone(), "month")).filter(Predicate::Eq(
            Expr::extract(DatePart::Year, date),
            Literal::Int(i64::from(req.year())),
        ));
        let handled = Handled {
            month: true,
            ..Handled::default()
        };
        return Some(
            apply_filters(query, req, handled)
                .group(month.clone())
                .order(month, false),
        );
    }

    if signals.period_summary || signals.aggregation {
        return Some(apply_filters(totals(base), req, Handled::default()));
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;
    use pq_protocol::Parameters;

    use super::*;
    use crate::builders::tests::{build, today};

    #[test]
    fn month_filters_month_and_current_year() {
        let (name, sql) = build("monthly summary for march").unwrap();
        assert_eq!(name, "period_summary");
        assert_eq!(
            sql,
            "SELECT SUM(production_tons) AS total_tons, SUM(trip_count) AS total_trips, \
             SUM(operating_hours) AS total_hours FROM production_summary \
             WHERE EXTRACT(MONTH FROM date) = 3 AND EXTRACT(YEAR FROM date) = 2025"
        );
    }

    #[test]
    fn any_month_without_superlative_builds() {
        for number in 1..=12 {
            let params = Parameters::default().with_month(number).unwrap();
            for text in ["production", "how did we do", "monthly report"] {
                let req = BuildRequest::new(&params, text, today());
                let sql = period_summary(&req).unwrap().to_string();
                assert!(sql.contains(&format!("EXTRACT(MONTH FROM date) = {number}")));
                assert!(sql.contains(&format!("EXTRACT(YEAR FROM date) = {}", today().year())));
            }
        }
    }

    #[test]
    fn superlative_or_shift_comparison_declines() {
        let params = Parameters::default().with_month(3).unwrap();
        for text in ["highest production in march", "shift A vs B in march"] {
            let req = BuildRequest::new(&params, text, today());
            assert!(period_summary(&req).is_none(), "{text}");
        }
    }

    #[test]
    fn year_summary_is_broken_down_by_month() {
        let (_, sql) = build("production summary for 2024").unwrap();
        assert_eq!(
            sql,
            "SELECT EXTRACT(MONTH FROM date) AS month, SUM(production_tons) AS total_tons, \
             SUM(trip_count) AS total_trips, SUM(operating_hours) AS total_hours \
             FROM production_summary WHERE EXTRACT(YEAR FROM date) = 2024 \
             GROUP BY EXTRACT(MONTH FROM date) ORDER BY EXTRACT(MONTH FROM date)"
        );
    }

    #[test]
    fn aggregation_over_a_range() {
        let (_, sql) = build("total tonnage from 2025-01-01 to 2025-01-31").unwrap();
        assert!(sql.ends_with(
            "FROM production_summary WHERE date BETWEEN DATE '2025-01-01' AND DATE '2025-01-31'"
        ));
    }
}

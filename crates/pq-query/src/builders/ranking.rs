//! Top/bottom-N production rows.

use pq_protocol::RankDirection;

use super::{BuildRequest, Handled, apply_filters};
use crate::ir::{Expr, SelectQuery};
use crate::schema::{PRODUCTION_TABLE, TRIP_TABLE, date_column};

pub fn top_n(req: &BuildRequest<'_>) -> Option<SelectQuery> {
    let direction = req.params.rank?;
    let table = if req.params.equipment.is_empty() {
        PRODUCTION_TABLE
    } else {
        TRIP_TABLE
    };
    let metric = req.metric(table)?;
    let query = SelectQuery::from_table(table).select_columns(&[date_column(table), "shift", metric]);
    Some(
        apply_filters(query, req, Handled::default())
            .order(Expr::col(metric), direction == RankDirection::Top)
            .limit(req.params.limit.unwrap_or(1)),
    )
}

#[cfg(test)]
mod tests {
    use crate::builders::tests::build;

    #[test]
    fn top_five_days() {
        let (name, sql) = build("top 5 production days").unwrap();
        assert_eq!(name, "top_n");
        assert_eq!(
            sql,
            "SELECT date, shift, production_tons FROM production_summary \
             ORDER BY production_tons DESC LIMIT 5"
        );
    }

    #[test]
    fn lowest_hours_defaults_to_one_row() {
        let (_, sql) = build("lowest operating hours in 2024").unwrap();
        assert_eq!(
            sql,
            "SELECT date, shift, operating_hours FROM production_summary \
             WHERE EXTRACT(YEAR FROM date) = 2024 ORDER BY operating_hours LIMIT 1"
        );
    }
}

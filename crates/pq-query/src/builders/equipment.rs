//! Equipment rankings and tipper/excavator pairings.

use pq_protocol::RankDirection;

use super::{BuildRequest, Handled, apply_filters};
use crate::ir::{Expr, SelectQuery};
use crate::schema::TRIP_TABLE;

/// Rows returned for a ranking or pairing when no limit was asked for.
const DEFAULT_RANKING_ROWS: u32 = 10;

fn ranked_by_trips(req: &BuildRequest<'_>) -> bool {
    req.mentions(&["trip", "trips", "loads"])
}

/// Per-equipment totals ordered by trips or tonnage.
pub fn equipment_ranking(req: &BuildRequest<'_>) -> Option<SelectQuery> {
    let base = apply_filters(SelectQuery::from_table(TRIP_TABLE), req, Handled::default());
    let metric = if ranked_by_trips(req) {
        "total_trips"
    } else {
        "total_tons"
    };

    if req.signals.combination {
        let query = base
            .select_columns(&["tipper_id", "excavator"])
            .select_as(Expr::sum("trip_count"), "total_trips")
            .select_as(Expr::sum("total_tons"), "total_tons")
            .group(Expr::col("tipper_id"))
            .group(Expr::col("excavator"))
            .order(Expr::col(metric), true)
            .limit(req.params.limit.unwrap_or(DEFAULT_RANKING_ROWS));
        return Some(query);
    }

    let column = if req.mentions(&["tipper", "tippers", "truck", "trucks"]) {
        "tipper_id"
    } else if req.mentions(&["excavator", "excavators", "shovel"]) {
        "excavator"
    } else {
        return None;
    };
    if !req.signals.superlative && req.params.rank.is_none() {
        return None;
    }

    let descending = req.params.rank != Some(RankDirection::Bottom);
    let limit = req.params.limit.unwrap_or(if req.mentions(&["which"]) {
        1
    } else {
        DEFAULT_RANKING_ROWS
    });
    let query = base
        .select(Expr::col(column))
        .select_as(Expr::sum("trip_count"), "total_trips")
        .select_as(Expr::sum("total_tons"), "total_tons")
        .group(Expr::col(column))
        .order(Expr::col(metric), descending)
        .limit(limit);
    Some(query)
}

#[cfg(test)]
mod tests {
    use crate::builders::tests::build;

    #[test]
    fn which_tipper_returns_single_row() {
        let (name, sql) = build("which tipper hauled the most tons").unwrap();
        assert_eq!(name, "equipment_ranking");
        assert_eq!(
            sql,
            "SELECT tipper_id, SUM(trip_count) AS total_trips, SUM(total_tons) AS total_tons \
             FROM trip_summary GROUP BY tipper_id ORDER BY total_tons DESC LIMIT 1"
        );
    }

    #[test]
    fn bottom_excavators_by_trips() {
        let (_, sql) = build("bottom 3 excavators by trips in shift C").unwrap();
        assert!(sql.starts_with("SELECT excavator, "), "{sql}");
        assert!(sql.contains("WHERE shift = 'C'"), "{sql}");
        assert!(sql.ends_with("ORDER BY total_trips LIMIT 3"), "{sql}");
    }

    #[test]
    fn combination_groups_both_columns() {
        let (_, sql) = build("tipper and excavator combination with most trips").unwrap();
        assert!(sql.contains("GROUP BY tipper_id, excavator"), "{sql}");
        assert!(sql.ends_with("ORDER BY total_trips DESC LIMIT 10"), "{sql}");
    }

    #[test]
    fn equipment_without_superlative_declines() {
        let built = build("show tipper data");
        assert!(built.is_none_or(|(name, _)| name != "equipment_ranking"));
    }
}

//! Side-by-side totals for two months, shifts, machines or dates.

use chrono::NaiveDate;
use pq_protocol::{Comparison, ComparisonKind, EquipmentId, Month, Shift};

use super::{BuildRequest, Handled, apply_filters, eq_or_in};
use crate::ir::{DatePart, Expr, Literal, Predicate, SelectQuery};
use crate::schema::{PRODUCTION_TABLE, TRIP_TABLE, date_column, equipment_column};

fn production_totals(query: SelectQuery) -> SelectQuery {
    query
        .select_as(Expr::sum("production_tons"), "total_tons")
        .select_as(Expr::sum("trip_count"), "total_trips")
        .select_as(Expr::sum("operating_hours"), "total_hours")
}

fn trip_totals(query: SelectQuery) -> SelectQuery {
    query
        .select_as(Expr::sum("trip_count"), "total_trips")
        .select_as(Expr::sum("total_tons"), "total_tons")
}

fn months(cmp: &Comparison) -> Option<[Month; 2]> {
    let parse = |s: &str| s.parse::<u32>().ok().and_then(|n| Month::new(n).ok());
    Some([parse(&cmp.entity_a)?, parse(&cmp.entity_b)?])
}

fn compare_months(req: &BuildRequest<'_>, cmp: &Comparison) -> Option<SelectQuery> {
    let [a, b] = months(cmp)?;
    let date = date_column(PRODUCTION_TABLE);
    let month = Expr::extract(DatePart::Month, date);
    let query = production_totals(
        SelectQuery::from_table(PRODUCTION_TABLE).select_as(month.clone(), "month"),
    )
    .filter(Predicate::In(
        month.clone(),
        vec![
            Literal::Int(i64::from(a.number())),
            Literal::Int(i64::from(b.number())),
        ],
    ))
    .filter(Predicate::Eq(
        Expr::extract(DatePart::Year, date),
        Literal::Int(i64::from(req.year())),
    ));
    let handled = Handled {
        month: true,
        ..Handled::default()
    };
    Some(
        apply_filters(query, req, handled)
            .group(month.clone())
            .order(month, false),
    )
}

fn compare_shifts(req: &BuildRequest<'_>, cmp: &Comparison) -> Option<SelectQuery> {
    let a: Shift = cmp.entity_a.parse().ok()?;
    let b: Shift = cmp.entity_b.parse().ok()?;
    let query = production_totals(SelectQuery::from_table(PRODUCTION_TABLE).select(Expr::col("shift")))
        .filter(Predicate::In(
            Expr::col("shift"),
            vec![
                Literal::Text(a.as_str().into()),
                Literal::Text(b.as_str().into()),
            ],
        ));
    let handled = Handled {
        shifts: true,
        ..Handled::default()
    };
    Some(
        apply_filters(query, req, handled)
            .group(Expr::col("shift"))
            .order(Expr::col("shift"), false),
    )
}

fn compare_equipment(req: &BuildRequest<'_>, cmp: &Comparison) -> Option<SelectQuery> {
    let a = EquipmentId::parse(&cmp.entity_a).ok()?;
    let b = EquipmentId::parse(&cmp.entity_b).ok()?;
    let column = equipment_column(a.prefix());
    // Mixed tipper/excavator pairs have no common grouping column.
    if equipment_column(b.prefix()) != column {
        return None;
    }
    let predicate = eq_or_in(
        Expr::col(column),
        vec![
            Literal::Text(a.as_str().into()),
            Literal::Text(b.as_str().into()),
        ],
    )?;
    let query = trip_totals(SelectQuery::from_table(TRIP_TABLE).select(Expr::col(column)))
        .filter(predicate);
    let handled = Handled {
        equipment: true,
        ..Handled::default()
    };
    Some(
        apply_filters(query, req, handled)
            .group(Expr::col(column))
            .order(Expr::col(column), false),
    )
}

fn compare_dates(req: &BuildRequest<'_>, cmp: &Comparison) -> Option<SelectQuery> {
    let parse = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
    let a = parse(&cmp.entity_a)?;
    let b = parse(&cmp.entity_b)?;
    let table = if req.params.equipment.is_empty() {
        PRODUCTION_TABLE
    } else {
        TRIP_TABLE
    };
    let date = date_column(table);
    let base = SelectQuery::from_table(table).select(Expr::col(date));
    let query = if table == TRIP_TABLE {
        trip_totals(base)
    } else {
        production_totals(base)
    }
    .filter(Predicate::In(
        Expr::col(date),
        vec![Literal::Date(a), Literal::Date(b)],
    ));
    let handled = Handled {
        date: true,
        ..Handled::default()
    };
    Some(
        apply_filters(query, req, handled)
            .group(Expr::col(date))
            .order(Expr::col(date), false),
    )
}

/// Totals per compared entity.
pub fn comparison(req: &BuildRequest<'_>) -> Option<SelectQuery> {
    let cmp = req.params.comparison.as_ref()?;
    match cmp.kind {
        ComparisonKind::Month => compare_months(req, cmp),
        ComparisonKind::Shift => compare_shifts(req, cmp),
        ComparisonKind::Equipment => compare_equipment(req, cmp),
        ComparisonKind::Date => compare_dates(req, cmp),
    }
}

//! "Show the 5th row" / "last row".

use pq_protocol::RowOrdinal;

use super::{BuildRequest, Handled, apply_filters};
use crate::ir::{Expr, SelectQuery};
use crate::schema::{PRODUCTION_TABLE, TRIP_TABLE, date_column};

/// One row at a position of the date/shift ordered listing.
pub fn ordinal_row(req: &BuildRequest<'_>) -> Option<SelectQuery> {
    let ordinal = req.params.row_ordinal?;
    let table = if req.mentions_equipment() {
        TRIP_TABLE
    } else {
        PRODUCTION_TABLE
    };
    let date = date_column(table);
    let query = apply_filters(SelectQuery::from_table(table), req, Handled::default());

    let query = match ordinal {
        RowOrdinal::Nth(n) => {
            let query = query
                .order(Expr::col(date), false)
                .order(Expr::col("shift"), false)
                .limit(1);
            if n > 1 { query.offset(n - 1) } else { query }
        }
        RowOrdinal::Last => query
            .order(Expr::col(date), true)
            .order(Expr::col("shift"), true)
            .limit(1),
    };
    Some(query)
}

//! Schema dictionary from the live database.

use pq_query::{SchemaDictionary, TableSchema};
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
struct ColumnRow {
    table_name: String,
    column_name: String,
}

/// Columns of `tables` as reported by `information_schema`, in table order.
///
/// Tables that do not exist are skipped.
pub async fn load_dictionary(
    pool: &PgPool,
    tables: &[String],
) -> Result<SchemaDictionary, sqlx::Error> {
    let rows = sqlx::query_as::<_, ColumnRow>(
        "SELECT table_name::text AS table_name, column_name::text AS column_name
         FROM information_schema.columns
         WHERE table_schema = current_schema() AND table_name = ANY($1)
         ORDER BY table_name, ordinal_position",
    )
    .bind(tables)
    .fetch_all(pool)
    .await?;

    Ok(group_columns(tables, rows))
}

fn group_columns(tables: &[String], rows: Vec<ColumnRow>) -> SchemaDictionary {
    let schemas = tables
        .iter()
        .filter_map(|table| {
            let columns: Vec<String> = rows
                .iter()
                .filter(|r| &r.table_name == table)
                .map(|r| r.column_name.clone())
                .collect();
            (!columns.is_empty()).then(|| TableSchema {
                name: table.clone(),
                columns,
            })
        })
        .collect();
    SchemaDictionary::new(schemas)
}

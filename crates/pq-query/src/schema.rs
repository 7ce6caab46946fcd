//! Table/column dictionary the generated queries must stay within.

use serde::{Deserialize, Serialize};

pub const PRODUCTION_TABLE: &str = "production_summary";
pub const TRIP_TABLE: &str = "trip_summary";

/// Equipment prefixes stored in the `excavator` column; every other prefix
/// is a hauling unit stored in `tipper_id`.
const LOADING_PREFIXES: [&str; 3] = ["EX", "PC", "SHV"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableSchema {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDictionary {
    tables: Vec<TableSchema>,
}

impl Default for SchemaDictionary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SchemaDictionary {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    /// The production reporting tables.
    pub fn builtin() -> Self {
        Self::new(vec![
            TableSchema::new(
                PRODUCTION_TABLE,
                &["date", "shift", "production_tons", "trip_count", "operating_hours"],
            ),
            TableSchema::new(
                TRIP_TABLE,
                &[
                    "trip_date",
                    "shift",
                    "tipper_id",
                    "excavator",
                    "route_or_face",
                    "trip_count",
                    "total_tons",
                ],
            ),
        ])
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Dictionary limited to `names`; unknown names are ignored.
    pub fn restricted_to(&self, names: &[String]) -> SchemaDictionary {
        SchemaDictionary::new(
            self.tables
                .iter()
                .filter(|t| names.iter().any(|n| n.eq_ignore_ascii_case(&t.name)))
                .cloned()
                .collect(),
        )
    }

    /// One line per table: `name(col, col, ...)`.
    pub fn describe(&self) -> String {
        self.tables
            .iter()
            .map(|t| format!("{}({})", t.name, t.columns.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Date column of a known table.
pub fn date_column(table: &str) -> &'static str {
    if table == TRIP_TABLE { "trip_date" } else { "date" }
}

/// Column holding an equipment id with the given prefix.
pub fn equipment_column(prefix: &str) -> &'static str {
    if LOADING_PREFIXES.contains(&prefix) {
        "excavator"
    } else {
        "tipper_id"
    }
}

/// Tonnage column of a known table.
pub fn tons_column(table: &str) -> &'static str {
    if table == TRIP_TABLE {
        "total_tons"
    } else {
        "production_tons"
    }
}

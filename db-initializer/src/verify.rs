//! Diagnostic read-back of the schema tables.
//!
//! Purely informational: a failing count is logged and skipped.

use crate::db::Connection;
use crate::schema::TABLES;
use tracing::{info, warn};

/// Row count of one schema table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}

/// Count rows in every schema table, logging each result.
pub async fn table_counts<C>(conn: &mut C) -> Vec<TableCount>
where
    C: Connection + ?Sized,
{
    let mut counts = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        match conn.count_rows(table.name).await {
            Ok(rows) => {
                info!(table = table.name, rows, "Table verified");
                counts.push(TableCount {
                    table: table.name,
                    rows,
                });
            }
            Err(e) => warn!(table = table.name, error = %e, "Could not read table"),
        }
    }
    counts
}

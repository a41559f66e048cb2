//! Stable identity for tables and columns
//!
//! Externally produced schemas (AI edits, DDL import, share codes) carry no
//! notion of our identifiers. Name is the only correlation key available, so
//! a table that is renamed and changed in the same revision comes back as a
//! brand new table.

use std::collections::HashMap;

use uuid::Uuid;

use crate::core::schema::{Schema, Table};

/// Mints identifiers for every table and column that lacks one
pub fn assign_identities(mut schema: Schema) -> Schema {
    for table in &mut schema.tables {
        if table.id.is_nil() {
            table.id = Uuid::new_v4();
        }
        for column in &mut table.columns {
            if column.id.is_nil() {
                column.id = Uuid::new_v4();
            }
        }
    }
    schema
}

/// Carries identifiers and layout from `old` onto a full replacement schema
///
/// Tables match by name, columns by name within a matched table. Matched
/// tables keep their old position; the new one is used only when the old
/// table had none. Unmatched entities get fresh identifiers and unmatched
/// old entities are dropped.
pub fn reconcile(new: Schema, old: &Schema) -> Schema {
    let old_tables: HashMap<&str, &Table> =
        old.tables.iter().map(|t| (t.name.as_str(), t)).collect();

    let mut matched = 0usize;
    let tables = new
        .tables
        .into_iter()
        .map(|mut table| {
            match old_tables.get(table.name.as_str()) {
                Some(previous) => {
                    matched += 1;
                    table.id = previous.id;
                    table.position = previous.position.or(table.position);
                    for column in &mut table.columns {
                        column.id = previous
                            .find_column(&column.name)
                            .map(|(_, c)| c.id)
                            .unwrap_or_else(Uuid::new_v4);
                    }
                }
                None => {
                    table.id = Uuid::new_v4();
                    for column in &mut table.columns {
                        column.id = Uuid::new_v4();
                    }
                }
            }
            table
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        "Reconciled schema: {} tables, {} matched by name, {} dropped",
        tables.len(),
        matched,
        old.tables.len().saturating_sub(matched)
    );

    Schema { tables }
}

//! Structured schema model: tables, primary keys, declared columns and
//! foreign-key edges.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A `table.column` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Directed reference `(child.column) -> (parent.column)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    pub child: ColumnRef,
    pub parent: ColumnRef,
}

impl ForeignKeyEdge {
    pub fn new(child: ColumnRef, parent: ColumnRef) -> Self {
        Self { child, parent }
    }
}

/// A column line decoded from a table block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
    pub primary_key: bool,
    pub not_null: bool,
}

/// Everything the parser could extract from a schema text.
///
/// `tables` is the union of declared table blocks and every table named by a
/// reference, so an edge never points at an unknown table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub tables: BTreeSet<String>,
    pub primary_keys: BTreeMap<String, BTreeSet<String>>,
    pub columns: BTreeMap<String, Vec<ColumnDef>>,
    pub foreign_keys: Vec<ForeignKeyEdge>,
}

impl SchemaModel {
    /// Register a table name (idempotent).
    pub fn add_table(&mut self, table: &str) {
        if !self.tables.contains(table) {
            self.tables.insert(table.to_string());
        }
        self.primary_keys.entry(table.to_string()).or_default();
    }

    /// Record a reference, registering both endpoint tables.
    pub fn add_foreign_key(&mut self, edge: ForeignKeyEdge) {
        self.add_table(&edge.child.table);
        self.add_table(&edge.parent.table);
        self.foreign_keys.push(edge);
    }

    /// Primary-key columns declared for `table` (possibly empty).
    pub fn primary_key_columns(&self, table: &str) -> impl Iterator<Item = &str> {
        self.primary_keys
            .get(table)
            .into_iter()
            .flat_map(|cols| cols.iter().map(String::as_str))
    }

    /// The primary-key column of `table`, only when exactly one is declared.
    pub fn primary_key(&self, table: &str) -> Option<&str> {
        let cols = self.primary_keys.get(table)?;
        if cols.len() == 1 {
            cols.iter().next().map(String::as_str)
        } else {
            None
        }
    }

    /// Tables that declare more than one primary-key column.
    pub fn multi_key_tables(&self) -> Vec<&str> {
        self.primary_keys
            .iter()
            .filter(|(_, cols)| cols.len() > 1)
            .map(|(table, _)| table.as_str())
            .collect()
    }

    /// Edges where `table` is the referencing (child) side.
    pub fn parent_edges<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a ForeignKeyEdge> {
        self.foreign_keys
            .iter()
            .filter(move |edge| edge.child.table == table)
    }

    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnDef> {
        self.columns
            .get(table)?
            .iter()
            .find(|col| col.name == column)
    }

    /// A reference is mandatory when its child column is declared `not null`.
    /// Undeclared columns are optional.
    pub fn is_mandatory(&self, edge: &ForeignKeyEdge) -> bool {
        self.column(&edge.child.table, &edge.child.column)
            .is_some_and(|col| col.not_null)
    }
}

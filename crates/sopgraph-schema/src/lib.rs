//! Schema notation for sopgraph.
//!
//! Parses the compact `Table name { column type [settings] }` / `Ref: child.col > parent.col`
//! notation into a [`SchemaModel`]: table names, primary-key columns per table,
//! declared columns, and foreign-key edges.
//!
//! Parsing is best-effort. Malformed declarations are skipped, never reported
//! as errors; the worst case is an empty model.

pub mod model;
pub mod parser;

pub use model::{ColumnDef, ColumnRef, ForeignKeyEdge, SchemaModel};
pub use parser::{blank_multiline_strings, parse_schema, strip_comments};

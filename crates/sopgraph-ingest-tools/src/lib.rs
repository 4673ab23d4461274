//! Tool-to-table resolution for sopgraph.
//!
//! A "tool" is an operation exposed to a procedure (e.g. `create_branch`). This crate
//! answers which tables each tool reads or writes, using two strategies:
//!
//! - a fixed, immutable [`ToolCatalog`] lookup (`tool -> tables`);
//! - a [`SourceScanner`] over tool source text, which splits the text into per-tool
//!   segments, collects literal table accesses, and maps exposed names to internal
//!   identifiers.
//!
//! Both produce a [`ToolTableMap`]; maps from several sources are combined with
//! [`ToolTableMap::merge`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub mod catalog;
pub mod scanner;
pub mod sources;

pub use catalog::{CatalogError, ToolCatalog};
pub use scanner::{resolve_from_source, PythonToolScanner, SourceScanner, GLOBAL_TOOL};
pub use sources::{collect_tool_sources, scan_tool_sources, ToolSourceFile, ToolSourceOptions};

/// Tables touched per tool identifier, plus exposed-name aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolTableMap {
    pub tables_by_tool: BTreeMap<String, BTreeSet<String>>,
    /// Exposed operation name -> internal tool identifier.
    pub aliases: BTreeMap<String, String>,
}

impl ToolTableMap {
    pub fn is_empty(&self) -> bool {
        self.tables_by_tool.is_empty() && self.aliases.is_empty()
    }

    /// Register a tool; tables are unioned with any already known for it.
    pub fn insert_tool<I, S>(&mut self, tool: &str, tables: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables_by_tool
            .entry(tool.to_string())
            .or_default()
            .extend(tables.into_iter().map(Into::into));
    }

    pub fn add_alias(&mut self, exposed_name: &str, tool: &str) {
        self.aliases
            .insert(exposed_name.to_string(), tool.to_string());
    }

    pub fn tool_ids(&self) -> impl Iterator<Item = &str> {
        self.tables_by_tool.keys().map(String::as_str)
    }

    pub fn tables_for(&self, tool: &str) -> Option<&BTreeSet<String>> {
        self.tables_by_tool.get(tool)
    }

    /// Every tool identifier `name` answers to: the identifier itself and the
    /// tool it is an exposed alias of. A catalog entry and a scanned class may
    /// share a name, so both can match.
    pub fn resolve(&self, name: &str) -> BTreeSet<&str> {
        let mut ids = BTreeSet::new();
        if let Some((id, _)) = self.tables_by_tool.get_key_value(name) {
            ids.insert(id.as_str());
        }
        if let Some(target) = self.aliases.get(name) {
            ids.insert(target.as_str());
        }
        ids
    }

    /// Union of the tables of every tool `name` resolves to.
    pub fn tables_for_name(&self, name: &str) -> BTreeSet<String> {
        self.resolve(name)
            .into_iter()
            .filter_map(|id| self.tables_for(id))
            .flat_map(|tables| tables.iter().cloned())
            .collect()
    }

    /// Union of every table touched by any tool.
    pub fn all_tables(&self) -> BTreeSet<String> {
        self.tables_by_tool
            .values()
            .flat_map(|tables| tables.iter().cloned())
            .collect()
    }

    /// Fold `other` into `self`. Table sets of shared identifiers are unioned;
    /// on alias collisions the incoming mapping wins.
    pub fn merge(&mut self, other: ToolTableMap) {
        for (tool, tables) in other.tables_by_tool {
            self.tables_by_tool.entry(tool).or_default().extend(tables);
        }
        self.aliases.extend(other.aliases);
    }
}

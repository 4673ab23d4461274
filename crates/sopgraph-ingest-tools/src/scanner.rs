//! Source scanning: which tables does each tool's code touch?
//!
//! The scanner is a trait so other tool dialects can plug in; the shipped
//! implementation understands Python tool classes of the form
//!
//! ```text
//! class CreateBranch(Tool):
//!     def invoke(data, ...):
//!         branches = data.get("branches", {})
//!     def get_info():
//!         return {"function": {"name": "create_branch", ...}}
//! ```

use crate::ToolTableMap;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Pseudo-tool that owns table accesses found outside any tool declaration.
pub const GLOBAL_TOOL: &str = "<global>";

pub trait SourceScanner {
    /// Extract tool -> tables and exposed-name -> tool mappings from one source text.
    fn scan(&self, source: &str) -> ToolTableMap;
}

/// Scanner for Python tool classes reading tables through `data.get("<table>", {})`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonToolScanner;

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*class\s+([A-Za-z_][A-Za-z0-9_]*)\s*[(:]")
            .expect("class pattern is valid")
    })
}

fn table_access_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\bdata\.get\(\s*["']([A-Za-z_][A-Za-z0-9_]*)["']\s*,\s*\{\s*\}\s*\)"#)
            .expect("table access pattern is valid")
    })
}

fn exposed_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"["']name["']\s*:\s*["']([^"'\n]+)["']"#).expect("name pattern is valid")
    })
}

fn tables_in(segment: &str) -> BTreeSet<String> {
    table_access_re()
        .captures_iter(segment)
        .map(|caps| caps[1].to_string())
        .collect()
}

impl SourceScanner for PythonToolScanner {
    fn scan(&self, source: &str) -> ToolTableMap {
        let mut map = ToolTableMap::default();

        let classes: Vec<(usize, &str)> = class_re()
            .captures_iter(source)
            .filter_map(|caps| Some((caps.get(0)?.start(), caps.get(1)?.as_str())))
            .collect();

        if classes.is_empty() {
            let tables = tables_in(source);
            if !tables.is_empty() {
                map.insert_tool(GLOBAL_TOOL, tables);
            }
            return map;
        }

        for (idx, &(start, class_name)) in classes.iter().enumerate() {
            let end = classes
                .get(idx + 1)
                .map(|&(next, _)| next)
                .unwrap_or(source.len());
            let segment = &source[start..end];

            let tables = tables_in(segment);
            tracing::debug!(tool = class_name, tables = tables.len(), "scanned tool segment");
            map.insert_tool(class_name, tables);

            for caps in exposed_name_re().captures_iter(segment) {
                map.add_alias(caps[1].trim(), class_name);
            }
        }

        map
    }
}

/// Scan a single source text with the default Python scanner.
pub fn resolve_from_source(source: &str) -> ToolTableMap {
    PythonToolScanner.scan(source)
}

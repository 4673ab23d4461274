//! Which tables does a procedure document care about?
//!
//! Best-effort: the text is tokenized into identifiers, tokens naming a schema
//! table count as direct mentions, and tokens naming a known tool (identifier or
//! exposed alias) pull in that tool's tables. When nothing is found the working
//! set widens to every tool-touched table the schema declares, then to the
//! whole schema.

use regex::Regex;
use serde::Serialize;
use sopgraph_ingest_tools::ToolTableMap;
use sopgraph_schema::SchemaModel;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("word pattern is valid"))
}

/// `using create_branch` / ``using `create_branch` ``: an explicit operation reference.
fn using_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\busing\s+`?([a-z_][a-z0-9_]*_[a-z0-9_]*)`?")
            .expect("using pattern is valid")
    })
}

/// Where the final working set came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestSource {
    /// Tables mentioned by the procedure and tables of tools it references.
    Procedure,
    /// Tables of an explicitly supplied tool list.
    ExplicitTools,
    /// Fallback: every table touched by any known tool.
    AllTools,
    /// Fallback: every table in the schema.
    #[default]
    AllTables,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcedureAnalysis {
    pub mentioned_tables: BTreeSet<String>,
    /// Tool identifiers referenced by the procedure (after alias resolution).
    pub used_tools: BTreeSet<String>,
    pub tool_tables: BTreeSet<String>,
    /// `using <name>` references that match no known tool.
    pub unresolved_tools: BTreeSet<String>,
    /// Tables named by tools but not declared in the schema; left out of scope.
    pub undeclared_tables: BTreeSet<String>,
    pub tables_of_interest: BTreeSet<String>,
    pub source: InterestSource,
}

/// Tables named directly in `text`. Matching is exact, or on the lowercased
/// token so sentence-initial capitals still count.
pub fn tables_mentioned(text: &str, tables: &BTreeSet<String>) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for m in word_re().find_iter(text) {
        let word = m.as_str();
        if tables.contains(word) {
            found.insert(word.to_string());
            continue;
        }
        let lowered = word.to_ascii_lowercase();
        if tables.contains(&lowered) {
            found.insert(lowered);
        }
    }
    found
}

/// Tool identifiers referenced in `text`, plus `using` references that did not resolve.
pub fn tools_referenced(text: &str, tools: &ToolTableMap) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut used = BTreeSet::new();
    for m in word_re().find_iter(text) {
        used.extend(tools.resolve(m.as_str()).into_iter().map(str::to_string));
    }

    let mut unresolved = BTreeSet::new();
    for caps in using_re().captures_iter(text) {
        let name = &caps[1];
        if tools.resolve(name).is_empty() {
            unresolved.insert(name.to_string());
        }
    }

    (used, unresolved)
}

fn tables_of_tools<'a>(
    tools: &ToolTableMap,
    ids: impl IntoIterator<Item = &'a String>,
) -> BTreeSet<String> {
    ids.into_iter()
        .filter_map(|id| tools.tables_for(id))
        .flat_map(|tables| tables.iter().cloned())
        .collect()
}

/// Keep the schema's tables; remember the rest in `undeclared_tables`.
fn declared_only(
    tables: BTreeSet<String>,
    schema: &SchemaModel,
    analysis: &mut ProcedureAnalysis,
) -> BTreeSet<String> {
    let (declared, undeclared): (BTreeSet<String>, BTreeSet<String>) = tables
        .into_iter()
        .partition(|t| schema.tables.contains(t));
    analysis.undeclared_tables.extend(undeclared);
    declared
}

/// Infer the entities of interest for a procedure.
pub fn infer_entities_of_interest(
    procedure: &str,
    schema: &SchemaModel,
    tools: &ToolTableMap,
) -> ProcedureAnalysis {
    let mut analysis = ProcedureAnalysis::default();

    if !procedure.trim().is_empty() {
        analysis.mentioned_tables = tables_mentioned(procedure, &schema.tables);
        let (used, unresolved) = tools_referenced(procedure, tools);
        let tool_tables = declared_only(tables_of_tools(tools, &used), schema, &mut analysis);
        analysis.tool_tables = tool_tables;
        analysis.used_tools = used;
        analysis.unresolved_tools = unresolved;
    }

    analysis.tables_of_interest = analysis
        .mentioned_tables
        .union(&analysis.tool_tables)
        .cloned()
        .collect();
    analysis.source = InterestSource::Procedure;

    widen_if_empty(analysis, schema, Some(tools))
}

/// Scope to an explicit tool list; procedure mentions are ignored.
/// Names resolve through identifiers and aliases like procedure tokens do.
/// When no name resolves the scope falls back to the schema directly, never
/// to every known tool.
pub fn entities_for_tools(
    tool_names: &[String],
    schema: &SchemaModel,
    tools: &ToolTableMap,
) -> ProcedureAnalysis {
    let mut analysis = ProcedureAnalysis::default();

    for name in tool_names {
        let ids = tools.resolve(name);
        if ids.is_empty() {
            analysis.unresolved_tools.insert(name.clone());
        }
        analysis
            .used_tools
            .extend(ids.into_iter().map(str::to_string));
    }

    let tool_tables = tables_of_tools(tools, &analysis.used_tools);
    let tool_tables = declared_only(tool_tables, schema, &mut analysis);
    analysis.tool_tables = tool_tables;
    analysis.tables_of_interest = analysis.tool_tables.clone();
    analysis.source = InterestSource::ExplicitTools;

    widen_if_empty(analysis, schema, None)
}

fn widen_if_empty(
    mut analysis: ProcedureAnalysis,
    schema: &SchemaModel,
    tools: Option<&ToolTableMap>,
) -> ProcedureAnalysis {
    if analysis.tables_of_interest.is_empty() {
        if let Some(tools) = tools {
            let declared = declared_only(tools.all_tables(), schema, &mut analysis);
            analysis.tables_of_interest = declared;
            analysis.source = InterestSource::AllTools;
        }
    }
    if analysis.tables_of_interest.is_empty() {
        analysis.tables_of_interest = schema.tables.clone();
        analysis.source = InterestSource::AllTables;
    }
    tracing::debug!(
        source = ?analysis.source,
        tables = analysis.tables_of_interest.len(),
        "selected entities of interest"
    );
    analysis
}

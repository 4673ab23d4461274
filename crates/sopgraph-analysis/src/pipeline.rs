//! Schema + tools + procedure -> scoped graph, reachable set and leaves.

use crate::graph::DependencyGraph;
use crate::procedure::{entities_for_tools, infer_entities_of_interest, ProcedureAnalysis};
use sopgraph_ingest_tools::ToolTableMap;
use sopgraph_schema::SchemaModel;
use std::collections::BTreeSet;

/// How the entities of interest are chosen.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// Infer from procedure text (may be empty).
    Procedure(&'a str),
    /// Use exactly these tools.
    Tools(&'a [String]),
}

#[derive(Debug, Clone)]
pub struct GraphAnalysis {
    pub procedure: ProcedureAnalysis,
    pub graph: DependencyGraph,
    pub reachable: BTreeSet<String>,
    pub leaves: BTreeSet<String>,
}

pub fn analyze_graph(schema: &SchemaModel, tools: &ToolTableMap, scope: Scope<'_>) -> GraphAnalysis {
    let procedure = match scope {
        Scope::Procedure(text) => infer_entities_of_interest(text, schema, tools),
        Scope::Tools(names) => entities_for_tools(names, schema, tools),
    };

    let graph = DependencyGraph::build(schema, &procedure.tables_of_interest);
    let reachable = graph.reachable_from_roots();
    let leaves = graph.leaf_nodes(&reachable);

    tracing::debug!(
        nodes = graph.node_count(),
        reachable = reachable.len(),
        leaves = leaves.len(),
        "analyzed dependency graph"
    );

    GraphAnalysis {
        procedure,
        graph,
        reachable,
        leaves,
    }
}

/// Non-fatal findings worth surfacing next to the result.
pub fn collect_warnings(
    schema: &SchemaModel,
    analysis: &GraphAnalysis,
    missing_tables: &BTreeSet<String>,
) -> Vec<String> {
    let mut warnings = Vec::new();

    for table in schema.multi_key_tables() {
        if !analysis.procedure.tables_of_interest.contains(table) {
            continue;
        }
        let cols: Vec<&str> = schema.primary_key_columns(table).collect();
        tracing::warn!(table, columns = ?cols, "table declares several primary-key columns");
        warnings.push(format!(
            "table '{table}' declares {} primary-key columns ({}); none is treated as authoritative",
            cols.len(),
            cols.join(", ")
        ));
    }

    for tool in &analysis.procedure.unresolved_tools {
        warnings.push(format!("procedure references unknown tool '{tool}'"));
    }

    if !analysis.procedure.undeclared_tables.is_empty() {
        let tables: Vec<&str> = analysis
            .procedure
            .undeclared_tables
            .iter()
            .map(String::as_str)
            .collect();
        warnings.push(format!(
            "tools touch tables the schema does not declare ({}); left out of scope",
            tables.join(", ")
        ));
    }

    for table in missing_tables {
        warnings.push(format!("no seeded data file for table '{table}'; treated as empty"));
    }

    warnings
}

//! JSON report shapes for the `details` and `leaf_count` output modes.

use crate::pipeline::GraphAnalysis;
use crate::procedure::InterestSource;
use crate::scenarios::{LeafScenarioCount, ScenarioCount};
use serde::Serialize;
use sopgraph_schema::SchemaModel;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportInputs {
    pub schema_file: String,
    pub sop_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sop_name: Option<String>,
    pub tools_paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub used_tools: BTreeSet<String>,
    pub mentioned_tables: BTreeSet<String>,
    pub tables_of_interest: BTreeSet<String>,
    pub interest_source: InterestSource,
    pub reachable_from_roots: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub parent_table: String,
    pub parent_pk: String,
    pub child_table: String,
    pub child_fk: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphSection {
    pub adjacency: BTreeMap<String, BTreeSet<String>>,
    pub reverse_adjacency: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSection {
    pub leaf_nodes: BTreeSet<String>,
    pub leaf_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSection {
    pub total_scenarios: usize,
    pub by_leaf: BTreeMap<String, LeafScenarioCount>,
    pub missing_tables: BTreeSet<String>,
}

/// Full diagnostic output (`details` mode).
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub inputs: ReportInputs,
    pub selection: Selection,
    pub primary_keys: BTreeMap<String, BTreeSet<String>>,
    pub relationships: Vec<Relationship>,
    pub graph: GraphSection,
    pub analysis: AnalysisSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<ScenarioSection>,
    pub warnings: Vec<String>,
}

/// Minimal output (`leaf_count` mode).
#[derive(Debug, Clone, Serialize)]
pub struct LeafCountReport {
    pub leaf_count: usize,
    pub leaf_nodes: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_scenarios: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenarios_by_leaf: Option<BTreeMap<String, usize>>,
}

/// References with both endpoints in `tables`, in schema order.
pub fn relationships_within(schema: &SchemaModel, tables: &BTreeSet<String>) -> Vec<Relationship> {
    schema
        .foreign_keys
        .iter()
        .filter(|e| tables.contains(&e.parent.table) && tables.contains(&e.child.table))
        .map(|e| Relationship {
            parent_table: e.parent.table.clone(),
            parent_pk: e.parent.column.clone(),
            child_table: e.child.table.clone(),
            child_fk: e.child.column.clone(),
        })
        .collect()
}

impl AnalysisReport {
    pub fn build(
        inputs: ReportInputs,
        schema: &SchemaModel,
        analysis: &GraphAnalysis,
        scenarios: Option<(&ScenarioCount, &BTreeSet<String>)>,
        warnings: Vec<String>,
    ) -> Self {
        let tables = &analysis.procedure.tables_of_interest;

        let primary_keys = tables
            .iter()
            .map(|t| {
                let cols = schema.primary_key_columns(t).map(str::to_string).collect();
                (t.clone(), cols)
            })
            .collect();

        Self {
            inputs,
            selection: Selection {
                used_tools: analysis.procedure.used_tools.clone(),
                mentioned_tables: analysis.procedure.mentioned_tables.clone(),
                tables_of_interest: tables.clone(),
                interest_source: analysis.procedure.source,
                reachable_from_roots: analysis.reachable.clone(),
            },
            primary_keys,
            relationships: relationships_within(schema, tables),
            graph: GraphSection {
                adjacency: analysis.graph.adjacency().clone(),
                reverse_adjacency: analysis.graph.reverse_adjacency().clone(),
            },
            analysis: AnalysisSection {
                leaf_nodes: analysis.leaves.clone(),
                leaf_count: analysis.leaves.len(),
            },
            scenarios: scenarios.map(|(count, missing)| ScenarioSection {
                total_scenarios: count.total,
                by_leaf: count.by_leaf.clone(),
                missing_tables: missing.clone(),
            }),
            warnings,
        }
    }
}

impl LeafCountReport {
    pub fn build(analysis: &GraphAnalysis, scenarios: Option<&ScenarioCount>) -> Self {
        Self {
            leaf_count: analysis.leaves.len(),
            leaf_nodes: analysis.leaves.clone(),
            total_scenarios: scenarios.map(|s| s.total),
            scenarios_by_leaf: scenarios.map(ScenarioCount::valid_by_leaf),
        }
    }
}

//! Procedure scoping, dependency graphs and scenario counting.
//!
//! The flow for one run:
//!
//! 1. [`procedure`] picks the tables of interest from procedure text and tool maps;
//! 2. [`graph`] builds the parent -> child graph induced on those tables, finds the
//!    nodes reachable from roots and the leaves among them;
//! 3. [`dataset`] loads seeded records, and [`scenarios`] counts the leaf records
//!    whose foreign-key chains resolve all the way to root tables;
//! 4. [`report`] shapes the result as JSON.
//!
//! [`pipeline`] ties steps 1 and 2 together.

pub mod dataset;
pub mod graph;
pub mod pipeline;
pub mod procedure;
pub mod report;
pub mod scenarios;

pub use dataset::{load_seeded_data, DatasetError, Record, RecordSet, SeededDataset};
pub use graph::DependencyGraph;
pub use pipeline::{analyze_graph, collect_warnings, GraphAnalysis, Scope};
pub use procedure::{
    entities_for_tools, infer_entities_of_interest, tables_mentioned, tools_referenced,
    InterestSource, ProcedureAnalysis,
};
pub use report::{AnalysisReport, LeafCountReport, ReportInputs};
pub use scenarios::{
    count_valid_scenarios, has_complete_chain_to_root, ChainBreak, ChainValidator,
    LeafScenarioCount, RecordFailure, ScenarioCount, MAX_FAILURES_PER_LEAF,
};

use anyhow::Result;
use colored::Colorize;
use sopgraph_analysis::{
    analyze_graph, collect_warnings, count_valid_scenarios, load_seeded_data, AnalysisReport,
    GraphAnalysis, LeafCountReport, ReportInputs, ScenarioCount, Scope,
};
use sopgraph_ingest_tools::{
    collect_tool_sources, scan_tool_sources, PythonToolScanner, ToolCatalog, ToolSourceOptions,
    ToolTableMap,
};
use sopgraph_schema::{parse_schema, SchemaModel};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub fn inputs(
    schema_file: String,
    sop_file: Option<String>,
    sop_name: Option<String>,
    tools_paths: Vec<String>,
    data_dir: Option<String>,
) -> ReportInputs {
    ReportInputs {
        schema_file,
        sop_file,
        sop_name,
        tools_paths,
        data_dir,
    }
}

pub struct Request<'a> {
    pub schema_text: &'a str,
    pub sop_text: Option<&'a str>,
    pub tool_paths: &'a [PathBuf],
    pub tool_names: &'a [String],
    /// Fixed tool -> table lookups: the built-in one and/or a JSON file.
    pub builtin_catalog: bool,
    pub catalog_file: Option<&'a Path>,
    pub data_dir: Option<&'a Path>,
    pub inputs: ReportInputs,
    pub verbose: bool,
}

pub struct Outcome {
    inputs: ReportInputs,
    schema: SchemaModel,
    analysis: GraphAnalysis,
    scenarios: Option<ScenarioCount>,
    missing_tables: BTreeSet<String>,
    warnings: Vec<String>,
}

impl Outcome {
    pub fn leaf_count_report(&self) -> LeafCountReport {
        LeafCountReport::build(&self.analysis, self.scenarios.as_ref())
    }

    pub fn details_report(&self) -> AnalysisReport {
        AnalysisReport::build(
            self.inputs.clone(),
            &self.schema,
            &self.analysis,
            self.scenarios.as_ref().map(|s| (s, &self.missing_tables)),
            self.warnings.clone(),
        )
    }
}

fn load_tool_map(request: &Request<'_>) -> Result<ToolTableMap> {
    let mut tools = ToolTableMap::default();
    if request.builtin_catalog {
        tools.merge(ToolCatalog::version_control().to_tool_map());
    }
    if let Some(path) = request.catalog_file {
        tools.merge(ToolCatalog::load(path)?.to_tool_map());
    }

    if !request.tool_paths.is_empty() {
        let files = collect_tool_sources(request.tool_paths, &ToolSourceOptions::default())?;
        let scanned = scan_tool_sources(&files, &PythonToolScanner);
        tracing::debug!(
            files = files.len(),
            tools = scanned.tables_by_tool.len(),
            "scanned tool sources"
        );
        tools.merge(scanned);
    }

    Ok(tools)
}

fn join(items: &BTreeSet<String>) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn print_diagnostics(tools: &ToolTableMap, analysis: &GraphAnalysis) {
    let procedure = &analysis.procedure;
    eprintln!(
        "{} {} tools, {} exposed names",
        "tools".cyan().bold(),
        tools.tables_by_tool.len(),
        tools.aliases.len()
    );
    eprintln!("{} {}", "used tools".cyan().bold(), join(&procedure.used_tools));
    for tool in &procedure.used_tools {
        if let Some(tables) = tools.tables_for(tool) {
            eprintln!("  {tool}: {}", join(tables));
        }
    }
    if !procedure.unresolved_tools.is_empty() {
        eprintln!(
            "{} {}",
            "unresolved tools".yellow().bold(),
            join(&procedure.unresolved_tools)
        );
    }
    if !procedure.undeclared_tables.is_empty() {
        eprintln!(
            "{} {}",
            "tables outside schema".yellow().bold(),
            join(&procedure.undeclared_tables)
        );
    }
    eprintln!(
        "{} {}",
        "mentioned tables".cyan().bold(),
        join(&procedure.mentioned_tables)
    );
    eprintln!(
        "{} {} ({:?})",
        "tables of interest".cyan().bold(),
        join(&procedure.tables_of_interest),
        procedure.source
    );
    eprintln!("{} {}", "leaves".cyan().bold(), join(&analysis.leaves));
}

pub fn run(request: Request<'_>) -> Result<Outcome> {
    let schema = parse_schema(request.schema_text);
    if schema.tables.is_empty() {
        tracing::warn!("schema declares no tables; the graph will be empty");
    }

    let tools = load_tool_map(&request)?;
    let scope = if request.tool_names.is_empty() {
        Scope::Procedure(request.sop_text.unwrap_or_default())
    } else {
        Scope::Tools(request.tool_names)
    };
    let analysis = analyze_graph(&schema, &tools, scope);

    if request.verbose {
        print_diagnostics(&tools, &analysis);
    }

    let (scenarios, missing_tables) = match request.data_dir {
        Some(dir) => {
            let data = load_seeded_data(dir, &analysis.procedure.tables_of_interest)?;
            let counts = count_valid_scenarios(&data, &schema, &analysis.leaves);
            tracing::info!(
                leaves = analysis.leaves.len(),
                total = counts.total,
                "counted valid scenarios"
            );
            (Some(counts), data.missing_tables().clone())
        }
        None => (None, BTreeSet::new()),
    };

    let warnings = collect_warnings(&schema, &analysis, &missing_tables);

    Ok(Outcome {
        inputs: request.inputs,
        schema,
        analysis,
        scenarios,
        missing_tables,
        warnings,
    })
}

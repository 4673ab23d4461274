//! sopgraph CLI
//!
//! Analyzes a relational schema against a procedure document:
//! - picks the tables the procedure cares about (directly or through tools)
//! - builds the parent -> child dependency graph over them
//! - reports the leaf tables and, given seeded data, how many leaf records
//!   form complete scenarios

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

mod analyze;

#[derive(Parser)]
#[command(name = "sopgraph")]
#[command(
    author,
    version,
    about = "Schema-driven scenario graph analysis for procedure documents"
)]
struct Cli {
    /// Schema source text (`Table ... { }` / `Ref: ...` notation)
    #[arg(long)]
    schema: PathBuf,

    /// Procedure document; when omitted the whole tool or schema table set is used
    #[arg(long)]
    sop: Option<PathBuf>,

    /// Label echoed in the report inputs
    #[arg(long)]
    sop_name: Option<String>,

    /// Tool source files or directories to scan for table access
    #[arg(long, num_args = 0..)]
    tools: Vec<PathBuf>,

    /// Scope to exactly these tools instead of inferring from the procedure
    #[arg(long, num_args = 1..)]
    tool_names: Vec<String>,

    /// JSON tool catalog (`{"tool": ["table", ...]}`)
    #[arg(long)]
    tool_catalog: Option<PathBuf>,

    /// Also use the built-in version-control tool catalog
    #[arg(long)]
    builtin_catalog: bool,

    /// Directory with one `<table>.json` record file per table
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputMode::Details)]
    mode: OutputMode,

    /// Write the JSON result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print tool/table inference diagnostics and debug logs
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputMode {
    /// Leaf count and leaf names (plus scenario totals with --data-dir)
    #[value(name = "leaf_count", alias = "leaf-count")]
    LeafCount,
    /// Keys, relationships, adjacency, reachable set, leaves, scenarios, warnings
    #[value(name = "details")]
    Details,
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_required(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {what} {}", path.display()))
}

fn absolute(path: &Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let schema_text = read_required(&cli.schema, "schema")?;
    let sop_text = match &cli.sop {
        Some(path) => Some(read_required(path, "procedure")?),
        None => None,
    };
    if let Some(dir) = &cli.data_dir {
        if !dir.is_dir() {
            bail!("data directory {} does not exist or is not a directory", dir.display());
        }
    }

    let request = analyze::Request {
        schema_text: &schema_text,
        sop_text: sop_text.as_deref(),
        tool_paths: &cli.tools,
        tool_names: &cli.tool_names,
        builtin_catalog: cli.builtin_catalog,
        catalog_file: cli.tool_catalog.as_deref(),
        data_dir: cli.data_dir.as_deref(),
        inputs: analyze::inputs(
            absolute(&cli.schema),
            cli.sop.as_deref().map(absolute),
            cli.sop_name.clone(),
            cli.tools.iter().map(|p| absolute(p)).collect(),
            cli.data_dir.as_deref().map(absolute),
        ),
        verbose: cli.verbose,
    };

    let outcome = analyze::run(request)?;
    let json = match cli.mode {
        OutputMode::LeafCount => serde_json::to_string_pretty(&outcome.leaf_count_report())?,
        OutputMode::Details => serde_json::to_string_pretty(&outcome.details_report())?,
    };

    match &cli.output {
        Some(out) => {
            fs::write(out, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", out.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
        }
        None => println!("{json}"),
    }

    Ok(())
}

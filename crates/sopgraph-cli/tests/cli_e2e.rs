use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const SCHEMA: &str = r#"
Table repositories {
  repository_id string [primary key]
}

Table branches {
  branch_id string [primary key]
  repository_id string
}

Table labels {
  label_id string [pk]
  repository_id string [ref: > repositories.repository_id]
}

Ref: branches.repository_id > repositories.repository_id
"#;

const TOOLS: &str = r#"
class CreateBranch(Tool):
    @staticmethod
    def invoke(data, **kwargs):
        repositories = data.get("repositories", {})
        branches = data.get("branches", {})
        return "ok"

    @staticmethod
    def get_info():
        return {"function": {"name": "create_branch"}}


class UpsertLabel(Tool):
    @staticmethod
    def invoke(data, **kwargs):
        labels = data.get("labels", {})
        return "ok"

    @staticmethod
    def get_info():
        return {"function": {"name": "upsert_label"}}
"#;

fn sopgraph_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sopgraph"))
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write fixture");
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(sopgraph_bin())
        .args(args)
        .output()
        .expect("run sopgraph")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "sopgraph failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn details_mode_counts_seeded_scenarios() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = write(dir.path(), "schema.dbml", SCHEMA);
    let sop = write(dir.path(), "sop.md", "1. Create branches for repositories.\n");

    let data = dir.path().join("data");
    fs::create_dir_all(&data).expect("create data dir");
    write(&data, "repositories.json", r#"{"r1": {"repository_id": "r1"}}"#);
    write(
        &data,
        "branches.json",
        r#"{
            "b1": {"branch_id": "b1", "repository_id": "r1"},
            "b2": {"branch_id": "b2", "repository_id": "missing"}
        }"#,
    );

    let output = run(&[
        "--schema",
        schema.to_str().unwrap(),
        "--sop",
        sop.to_str().unwrap(),
        "--sop-name",
        "branching",
        "--data-dir",
        data.to_str().unwrap(),
    ]);
    let json = stdout_json(&output);

    assert_eq!(json["inputs"]["sop_name"], "branching");
    assert_eq!(
        json["selection"]["tables_of_interest"],
        serde_json::json!(["branches", "repositories"])
    );
    assert_eq!(json["analysis"]["leaf_nodes"], serde_json::json!(["branches"]));
    assert_eq!(json["analysis"]["leaf_count"], 1);
    assert_eq!(json["scenarios"]["total_scenarios"], 1);
    assert_eq!(json["scenarios"]["by_leaf"]["branches"]["invalid"], 1);
    assert_eq!(
        json["scenarios"]["by_leaf"]["branches"]["failures"][0]["record_id"],
        "b2"
    );
}

#[test]
fn leaf_count_mode_with_scanned_tools_writes_output_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = write(dir.path(), "schema.dbml", SCHEMA);
    let tools_dir = dir.path().join("tools");
    fs::create_dir_all(&tools_dir).expect("create tools dir");
    write(&tools_dir, "tools.py", TOOLS);
    let sop = write(
        dir.path(),
        "sop.md",
        "Tag the repository using upsert_label, then open a branch using create_branch.\n",
    );
    let out = dir.path().join("result.json");

    let output = run(&[
        "--schema",
        schema.to_str().unwrap(),
        "--sop",
        sop.to_str().unwrap(),
        "--tools",
        tools_dir.to_str().unwrap(),
        "--mode",
        "leaf_count",
        "--output",
        out.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "sopgraph failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(output.stdout.is_empty(), "JSON goes to the output file");
    assert!(String::from_utf8_lossy(&output.stderr).contains("wrote"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("read output")).expect("JSON");
    assert_eq!(json["leaf_count"], 2);
    assert_eq!(json["leaf_nodes"], serde_json::json!(["branches", "labels"]));
    assert!(json.get("total_scenarios").is_none());
}

#[test]
fn explicit_tool_names_override_procedure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = write(dir.path(), "schema.dbml", SCHEMA);
    let sop = write(dir.path(), "sop.md", "Work on branches and labels.\n");

    let output = run(&[
        "--schema",
        schema.to_str().unwrap(),
        "--sop",
        sop.to_str().unwrap(),
        "--builtin-catalog",
        "--tool-names",
        "create_branch",
    ]);
    let json = stdout_json(&output);

    assert_eq!(json["selection"]["interest_source"], "explicit_tools");
    assert_eq!(
        json["selection"]["tables_of_interest"],
        serde_json::json!(["branches"])
    );
    assert_eq!(json["analysis"]["leaf_nodes"], serde_json::json!(["branches"]));
}

#[test]
fn missing_schema_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("nope.dbml");

    let output = run(&["--schema", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read schema"), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn data_dir_must_be_a_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = write(dir.path(), "schema.dbml", SCHEMA);
    let not_a_dir = write(dir.path(), "data.json", "{}");

    let output = run(&[
        "--schema",
        schema.to_str().unwrap(),
        "--data-dir",
        not_a_dir.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a directory"));
}

const INCIDENT_SCHEMA: &str = r#"
Table incidents {
  incident_id string [pk]
}

Table pages {
  page_id string [pk]
  incident_id string [ref: > incidents.incident_id]
}
"#;

#[test]
fn no_procedure_scopes_to_the_schema_even_with_builtin_catalog() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = write(dir.path(), "schema.dbml", INCIDENT_SCHEMA);

    let variants: [&[&str]; 2] = [&[], &["--builtin-catalog"]];
    for extra in variants {
        let mut args = vec!["--schema", schema.to_str().unwrap()];
        args.extend_from_slice(extra);
        let json = stdout_json(&run(&args));

        assert_eq!(json["selection"]["interest_source"], "all_tables");
        assert_eq!(
            json["selection"]["tables_of_interest"],
            serde_json::json!(["incidents", "pages"])
        );
        assert_eq!(json["analysis"]["leaf_nodes"], serde_json::json!(["pages"]));
    }
}

#[test]
fn scanned_alias_widens_a_builtin_catalog_tool() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = write(dir.path(), "schema.dbml", SCHEMA);
    let tools = write(dir.path(), "tools.py", TOOLS);
    let sop = write(dir.path(), "sop.md", "Open a branch using create_branch.\n");

    let data = dir.path().join("data");
    fs::create_dir_all(&data).expect("create data dir");
    write(&data, "repositories.json", r#"{"r1": {"repository_id": "r1"}}"#);
    write(
        &data,
        "branches.json",
        r#"{"b1": {"branch_id": "b1", "repository_id": "r1"}}"#,
    );

    let output = run(&[
        "--schema",
        schema.to_str().unwrap(),
        "--sop",
        sop.to_str().unwrap(),
        "--builtin-catalog",
        "--tools",
        tools.to_str().unwrap(),
        "--data-dir",
        data.to_str().unwrap(),
    ]);
    let json = stdout_json(&output);

    assert_eq!(
        json["selection"]["used_tools"],
        serde_json::json!(["CreateBranch", "create_branch"])
    );
    assert_eq!(
        json["selection"]["tables_of_interest"],
        serde_json::json!(["branches", "repositories"])
    );
    assert_eq!(json["scenarios"]["total_scenarios"], 1);
}

#[test]
fn tools_flag_accepts_no_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = write(dir.path(), "schema.dbml", SCHEMA);

    let json = stdout_json(&run(&["--schema", schema.to_str().unwrap(), "--tools"]));
    assert_eq!(json["inputs"]["tools_paths"], serde_json::json!([]));
}

#[test]
fn verbose_prints_inference_diagnostics() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema = write(dir.path(), "schema.dbml", SCHEMA);
    let tools = write(dir.path(), "tools.py", TOOLS);
    let sop = write(
        dir.path(),
        "sop.md",
        "Label it using upsert_label, then archive it using archive_repo.\n",
    );

    let output = run(&[
        "--schema",
        schema.to_str().unwrap(),
        "--sop",
        sop.to_str().unwrap(),
        "--tools",
        tools.to_str().unwrap(),
        "--verbose",
    ]);
    let json = stdout_json(&output);
    assert_eq!(json["selection"]["used_tools"], serde_json::json!(["UpsertLabel"]));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("used tools"), "stderr: {stderr}");
    assert!(stderr.contains("UpsertLabel: labels"), "stderr: {stderr}");
    assert!(stderr.contains("unresolved tools"), "stderr: {stderr}");
    assert!(stderr.contains("archive_repo"), "stderr: {stderr}");
    assert!(stderr.contains("tables of interest"), "stderr: {stderr}");
}

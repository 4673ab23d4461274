//! Scenario counting: a leaf record is a complete scenario when every
//! foreign key on it, and on every ancestor it reaches, resolves to a seeded
//! parent record.
//!
//! Validation walks the record graph with an explicit stack and a visited set of
//! `(table, record id)` pairs, so deep chains cannot overflow the call stack and
//! cyclic references terminate: a record already visited is not re-checked.

use crate::dataset::{Record, SeededDataset};
use serde::Serialize;
use serde_json::Value;
use sopgraph_schema::{ForeignKeyEdge, SchemaModel};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Failures listed per leaf table in a [`LeafScenarioCount`].
pub const MAX_FAILURES_PER_LEAF: usize = 20;

/// Why a chain is incomplete. Names the record where the walk stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainBreak {
    /// A `not null` foreign key has no value.
    MissingMandatoryValue {
        table: String,
        record_id: String,
        column: String,
    },
    /// The referenced table has no seeded data at all.
    MissingParentTable {
        table: String,
        record_id: String,
        column: String,
        parent_table: String,
    },
    /// No parent record carries the referenced value.
    MissingParentRecord {
        table: String,
        record_id: String,
        column: String,
        parent_table: String,
        parent_column: String,
        value: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub record_id: String,
    pub reason: ChainBreak,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeafScenarioCount {
    pub records: usize,
    pub valid: usize,
    pub invalid: usize,
    /// First [`MAX_FAILURES_PER_LEAF`] failures, in record id order.
    pub failures: Vec<RecordFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioCount {
    pub by_leaf: BTreeMap<String, LeafScenarioCount>,
    pub total: usize,
}

impl ScenarioCount {
    /// Leaf table -> valid scenario count.
    pub fn valid_by_leaf(&self) -> BTreeMap<String, usize> {
        self.by_leaf
            .iter()
            .map(|(table, count)| (table.clone(), count.valid))
            .collect()
    }
}

/// Validates record chains against one dataset and schema.
///
/// Parent lookups are indexed lazily per `(table, column)` on first use.
pub struct ChainValidator<'a> {
    data: &'a SeededDataset,
    schema: &'a SchemaModel,
    index: HashMap<(&'a str, &'a str), HashMap<String, &'a str>>,
}

/// Value key for parent lookup. JSON text keeps `"1"` and `1` apart.
fn value_key(value: &Value) -> String {
    value.to_string()
}

impl<'a> ChainValidator<'a> {
    pub fn new(data: &'a SeededDataset, schema: &'a SchemaModel) -> Self {
        Self {
            data,
            schema,
            index: HashMap::new(),
        }
    }

    /// Id of the first record of `table` (in id order) whose `column` equals `value`.
    fn lookup(&mut self, table: &'a str, column: &'a str, value: &Value) -> Option<&'a str> {
        let data = self.data;
        let by_value = self.index.entry((table, column)).or_insert_with(|| {
            let mut by_value = HashMap::new();
            if let Some(records) = data.table(table) {
                for (id, record) in records {
                    if let Some(v) = record.get(column) {
                        by_value.entry(value_key(v)).or_insert(id.as_str());
                    }
                }
            }
            by_value
        });
        by_value.get(&value_key(value)).copied()
    }

    /// Check one edge of one record; returns the parent record id to descend into.
    fn follow(
        &mut self,
        edge: &'a ForeignKeyEdge,
        record_id: &'a str,
        record: &'a Record,
    ) -> Result<Option<&'a str>, ChainBreak> {
        let column = edge.child.column.as_str();
        let value = match record.get(column) {
            None | Some(Value::Null) => {
                if self.schema.is_mandatory(edge) {
                    return Err(ChainBreak::MissingMandatoryValue {
                        table: edge.child.table.clone(),
                        record_id: record_id.to_string(),
                        column: column.to_string(),
                    });
                }
                return Ok(None);
            }
            Some(value) => value,
        };

        let parent_table = edge.parent.table.as_str();
        if !self.data.has_table(parent_table) {
            return Err(ChainBreak::MissingParentTable {
                table: edge.child.table.clone(),
                record_id: record_id.to_string(),
                column: column.to_string(),
                parent_table: parent_table.to_string(),
            });
        }

        match self.lookup(parent_table, edge.parent.column.as_str(), value) {
            Some(parent_id) => Ok(Some(parent_id)),
            None => Err(ChainBreak::MissingParentRecord {
                table: edge.child.table.clone(),
                record_id: record_id.to_string(),
                column: column.to_string(),
                parent_table: parent_table.to_string(),
                parent_column: edge.parent.column.clone(),
                value: value.clone(),
            }),
        }
    }

    /// Validate the chain of `table[record_id]` up to the roots.
    pub fn validate(&mut self, table: &'a str, record_id: &'a str) -> Result<(), ChainBreak> {
        let mut visited: HashSet<(&'a str, &'a str)> = HashSet::new();
        let mut stack: Vec<(&'a str, &'a str)> = vec![(table, record_id)];

        while let Some((table, record_id)) = stack.pop() {
            if !visited.insert((table, record_id)) {
                continue;
            }
            let Some(record) = self.data.record(table, record_id) else {
                continue;
            };

            let schema = self.schema;
            for edge in schema.parent_edges(table) {
                if let Some(parent_id) = self.follow(edge, record_id, record)? {
                    let parent = (edge.parent.table.as_str(), parent_id);
                    if !visited.contains(&parent) {
                        stack.push(parent);
                    }
                }
            }
        }

        Ok(())
    }
}

/// True when `table[record_id]` has a complete, valid chain to its roots.
pub fn has_complete_chain_to_root(
    data: &SeededDataset,
    schema: &SchemaModel,
    table: &str,
    record_id: &str,
) -> bool {
    ChainValidator::new(data, schema)
        .validate(table, record_id)
        .is_ok()
}

/// Count records of each leaf table whose chains validate completely.
pub fn count_valid_scenarios(
    data: &SeededDataset,
    schema: &SchemaModel,
    leaf_tables: &BTreeSet<String>,
) -> ScenarioCount {
    let mut validator = ChainValidator::new(data, schema);
    let mut result = ScenarioCount::default();

    for leaf in leaf_tables {
        let mut count = LeafScenarioCount::default();

        if let Some(records) = data.table(leaf) {
            for record_id in records.keys() {
                count.records += 1;
                match validator.validate(leaf.as_str(), record_id.as_str()) {
                    Ok(()) => count.valid += 1,
                    Err(reason) => {
                        count.invalid += 1;
                        if count.failures.len() < MAX_FAILURES_PER_LEAF {
                            count.failures.push(RecordFailure {
                                record_id: record_id.clone(),
                                reason,
                            });
                        }
                    }
                }
            }
        }

        tracing::debug!(
            leaf = %leaf,
            records = count.records,
            valid = count.valid,
            "counted scenarios"
        );
        result.total += count.valid;
        result.by_leaf.insert(leaf.clone(), count);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sopgraph_schema::parse_schema;

    fn leaves(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn dataset(tables: Value) -> SeededDataset {
        let mut data = SeededDataset::default();
        if let Value::Object(tables) = tables {
            for (name, records) in tables {
                data.insert_json_table(name, records);
            }
        }
        data
    }

    #[test]
    fn branch_with_missing_repository_is_not_a_scenario() {
        let schema = parse_schema(
            "Table repositories { repository_id string [primary key] }\n\
             Table branches {\n  branch_id string [primary key]\n  repository_id string\n}\n\
             Ref: branches.repository_id > repositories.repository_id\n",
        );
        let data = dataset(json!({
            "repositories": {"r1": {"repository_id": "r1"}},
            "branches": {
                "b1": {"branch_id": "b1", "repository_id": "r1"},
                "b2": {"branch_id": "b2", "repository_id": "missing"}
            }
        }));

        let counts = count_valid_scenarios(&data, &schema, &leaves(&["branches"]));
        assert_eq!(counts.valid_by_leaf(), BTreeMap::from([("branches".to_string(), 1)]));
        assert_eq!(counts.total, 1);

        let branches = &counts.by_leaf["branches"];
        assert_eq!(branches.records, 2);
        assert_eq!(branches.invalid, 1);
        assert_eq!(
            branches.failures,
            vec![RecordFailure {
                record_id: "b2".to_string(),
                reason: ChainBreak::MissingParentRecord {
                    table: "branches".to_string(),
                    record_id: "b2".to_string(),
                    column: "repository_id".to_string(),
                    parent_table: "repositories".to_string(),
                    parent_column: "repository_id".to_string(),
                    value: json!("missing"),
                },
            }]
        );
    }

    #[test]
    fn null_foreign_key_is_valid_even_without_parent_table() {
        let schema = parse_schema("Ref: comments.issue_id > issues.issue_id\n");
        let data = dataset(json!({
            "comments": {
                "c1": {"comment_id": "c1", "issue_id": null},
                "c2": {"comment_id": "c2"},
                "c3": {"comment_id": "c3", "issue_id": "i1"}
            }
        }));

        assert!(has_complete_chain_to_root(&data, &schema, "comments", "c1"));
        assert!(has_complete_chain_to_root(&data, &schema, "comments", "c2"));
        assert!(!has_complete_chain_to_root(&data, &schema, "comments", "c3"));

        let mut validator = ChainValidator::new(&data, &schema);
        assert!(matches!(
            validator.validate("comments", "c3"),
            Err(ChainBreak::MissingParentTable { .. })
        ));
    }

    #[test]
    fn not_null_foreign_key_must_be_present() {
        let schema = parse_schema(
            "Table comments {\n  comment_id string [pk]\n  issue_id string [not null]\n}\n\
             Ref: comments.issue_id > issues.issue_id\n",
        );
        let data = dataset(json!({
            "issues": {},
            "comments": {"c1": {"comment_id": "c1", "issue_id": null}}
        }));

        let mut validator = ChainValidator::new(&data, &schema);
        assert_eq!(
            validator.validate("comments", "c1"),
            Err(ChainBreak::MissingMandatoryValue {
                table: "comments".to_string(),
                record_id: "c1".to_string(),
                column: "issue_id".to_string(),
            })
        );
    }

    #[test]
    fn broken_grandparent_invalidates_the_chain() {
        let schema = parse_schema(
            "Ref: commits.branch_id > branches.branch_id\n\
             Ref: branches.repository_id > repositories.repository_id\n",
        );
        let data = dataset(json!({
            "repositories": {"r1": {"repository_id": "r1"}},
            "branches": {
                "b1": {"branch_id": "b1", "repository_id": "r1"},
                "b2": {"branch_id": "b2", "repository_id": "gone"}
            },
            "commits": {
                "c1": {"commit_id": "c1", "branch_id": "b1"},
                "c2": {"commit_id": "c2", "branch_id": "b2"}
            }
        }));

        let counts = count_valid_scenarios(&data, &schema, &leaves(&["commits"]));
        assert_eq!(counts.by_leaf["commits"].valid, 1);
        assert!(matches!(
            &counts.by_leaf["commits"].failures[0].reason,
            ChainBreak::MissingParentRecord { table, record_id, .. }
                if table == "branches" && record_id == "b2"
        ));
    }

    #[test]
    fn cyclic_references_terminate() {
        let schema = parse_schema(
            "Ref: users.manager_id > users.user_id\n\
             Ref: teams.lead_id > users.user_id\n\
             Ref: users.team_id > teams.team_id\n",
        );
        let data = dataset(json!({
            "users": {
                "u1": {"user_id": "u1", "manager_id": "u2", "team_id": "t1"},
                "u2": {"user_id": "u2", "manager_id": "u1", "team_id": "t1"}
            },
            "teams": {"t1": {"team_id": "t1", "lead_id": "u1"}}
        }));

        assert!(has_complete_chain_to_root(&data, &schema, "users", "u1"));
        assert!(has_complete_chain_to_root(&data, &schema, "teams", "t1"));
    }

    #[test]
    fn leaf_without_records_counts_zero() {
        let schema = parse_schema("Ref: stars.repository_id > repositories.repository_id\n");
        let data = dataset(json!({"repositories": {}}));

        let counts = count_valid_scenarios(&data, &schema, &leaves(&["stars"]));
        assert_eq!(counts.by_leaf["stars"], LeafScenarioCount::default());
        assert_eq!(counts.total, 0);
    }

    #[test]
    fn numeric_and_string_keys_do_not_match() {
        let schema = parse_schema("Ref: b.a_id > a.id\n");
        let data = dataset(json!({
            "a": {"1": {"id": 1}},
            "b": {"x": {"a_id": "1"}, "y": {"a_id": 1}}
        }));

        assert!(!has_complete_chain_to_root(&data, &schema, "b", "x"));
        assert!(has_complete_chain_to_root(&data, &schema, "b", "y"));
    }
}

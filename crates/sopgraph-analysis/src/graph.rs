//! Table dependency graph (parent -> child) induced on a set of tables.

use serde::Serialize;
use sopgraph_schema::SchemaModel;
use std::collections::{BTreeMap, BTreeSet};

/// Forward (parent -> children) and reverse (child -> parents) adjacency.
///
/// Every table of the scoping set is a node, edge or not. Built once per
/// analysis and never edited afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    adjacency: BTreeMap<String, BTreeSet<String>>,
    reverse_adjacency: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Keep only references whose two endpoints are both in `tables`.
    pub fn build(schema: &SchemaModel, tables: &BTreeSet<String>) -> Self {
        let mut adjacency: BTreeMap<String, BTreeSet<String>> = tables
            .iter()
            .map(|t| (t.clone(), BTreeSet::new()))
            .collect();
        let mut reverse_adjacency = adjacency.clone();

        for edge in &schema.foreign_keys {
            let parent = &edge.parent.table;
            let child = &edge.child.table;
            if !tables.contains(parent) || !tables.contains(child) {
                continue;
            }
            if let Some(children) = adjacency.get_mut(parent) {
                children.insert(child.clone());
            }
            if let Some(parents) = reverse_adjacency.get_mut(child) {
                parents.insert(parent.clone());
            }
        }

        Self {
            adjacency,
            reverse_adjacency,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.adjacency.keys().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.adjacency.contains_key(table)
    }

    pub fn children(&self, table: &str) -> impl Iterator<Item = &str> {
        self.adjacency
            .get(table)
            .into_iter()
            .flat_map(|c| c.iter().map(String::as_str))
    }

    pub fn parents(&self, table: &str) -> impl Iterator<Item = &str> {
        self.reverse_adjacency
            .get(table)
            .into_iter()
            .flat_map(|p| p.iter().map(String::as_str))
    }

    /// `(parent, child)` pairs in sorted order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.adjacency
            .iter()
            .flat_map(|(p, cs)| cs.iter().map(move |c| (p.as_str(), c.as_str())))
    }

    pub fn adjacency(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.adjacency
    }

    pub fn reverse_adjacency(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.reverse_adjacency
    }

    /// Nodes with no incoming edge.
    pub fn roots(&self) -> BTreeSet<String> {
        self.reverse_adjacency
            .iter()
            .filter(|(_, parents)| parents.is_empty())
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// Forward closure of the roots. A graph without roots (all nodes sit on or
    /// below a cycle) counts every node as reachable.
    pub fn reachable_from_roots(&self) -> BTreeSet<String> {
        let roots = self.roots();
        if roots.is_empty() {
            return self.adjacency.keys().cloned().collect();
        }

        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut stack: Vec<&str> = roots.iter().map(String::as_str).collect();
        while let Some(node) = stack.pop() {
            if !seen.insert(node.to_string()) {
                continue;
            }
            for child in self.children(node) {
                if !seen.contains(child) {
                    stack.push(child);
                }
            }
        }
        seen
    }

    /// Nodes of `within` with no child inside `within`.
    pub fn leaf_nodes(&self, within: &BTreeSet<String>) -> BTreeSet<String> {
        within
            .iter()
            .filter(|node| !self.children(node).any(|c| within.contains(c)))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sopgraph_schema::parse_schema;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    const SCHEMA: &str = r#"
Ref: branches.repository_id > repositories.repository_id
Ref: commits.branch_id > branches.branch_id
Ref: repositories.owner_id > users.user_id
Ref: stars.repository_id > repositories.repository_id
"#;

    #[test]
    fn induced_graph_drops_edges_leaving_the_set() {
        let schema = parse_schema(SCHEMA);
        let graph = DependencyGraph::build(&schema, &set(&["repositories", "branches", "labels"]));

        assert_eq!(graph.node_count(), 3);
        assert!(graph.contains("labels"));
        assert_eq!(
            graph.edges().collect::<Vec<_>>(),
            vec![("repositories", "branches")]
        );
        assert_eq!(graph.parents("repositories").count(), 0);
        assert_eq!(graph.roots(), set(&["labels", "repositories"]));
    }

    #[test]
    fn leaves_of_reachable_set() {
        let schema = parse_schema(SCHEMA);
        let all = schema.tables.clone();
        let graph = DependencyGraph::build(&schema, &all);

        let reachable = graph.reachable_from_roots();
        assert_eq!(reachable, all);
        assert_eq!(graph.leaf_nodes(&reachable), set(&["commits", "stars"]));
    }

    #[test]
    fn cycle_only_graph_is_fully_reachable() {
        let schema = parse_schema("Ref: a.b_id > b.id\nRef: b.a_id > a.id\n");
        let graph = DependencyGraph::build(&schema, &schema.tables);

        assert!(graph.roots().is_empty());
        let reachable = graph.reachable_from_roots();
        assert_eq!(reachable, set(&["a", "b"]));
        assert!(graph.leaf_nodes(&reachable).is_empty());
    }

    #[test]
    fn cycle_below_a_root_is_reached_but_never_a_leaf() {
        let schema = parse_schema(
            "Ref: a.r_id > r.id\nRef: b.a_id > a.id\nRef: a.b_id > b.id\nRef: x.y_id > y.id\nRef: y.x_id > x.id\n",
        );
        let graph = DependencyGraph::build(&schema, &schema.tables);

        let reachable = graph.reachable_from_roots();
        // x <-> y has no root above it and is not reached.
        assert_eq!(reachable, set(&["a", "b", "r"]));
        assert!(graph.leaf_nodes(&reachable).is_empty());
    }

    #[test]
    fn empty_graph() {
        let graph = DependencyGraph::build(&SchemaModel::default(), &BTreeSet::new());
        assert!(graph.reachable_from_roots().is_empty());
        assert!(graph.leaf_nodes(&BTreeSet::new()).is_empty());
    }
}

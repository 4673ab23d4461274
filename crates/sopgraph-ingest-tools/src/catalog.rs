//! Fixed tool -> table lookup.
//!
//! A catalog is an immutable value handed to the resolver, so several analyses with
//! different catalogs can run side by side. One catalog ships built in (the version
//! control environment); others load from JSON of the form
//! `{"tool_name": ["table_a", "table_b"]}`.

use crate::ToolTableMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read tool catalog {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid tool catalog {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolCatalog {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl ToolCatalog {
    pub fn new(entries: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self { entries }
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|source| CatalogError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Tables for `tool`; unknown tools touch nothing.
    pub fn resolve_static(&self, tool: &str) -> BTreeSet<String> {
        self.entries.get(tool).cloned().unwrap_or_default()
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.entries.contains_key(tool)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_tool_map(&self) -> ToolTableMap {
        let mut map = ToolTableMap::default();
        for (tool, tables) in &self.entries {
            map.insert_tool(tool, tables.iter().cloned());
        }
        map
    }

    /// Built-in catalog for the version control environment.
    pub fn version_control() -> Self {
        const ENTRIES: &[(&str, &[&str])] = &[
            ("list_users", &["users"]),
            ("list_access_tokens", &["access_tokens"]),
            ("list_organizations", &["organizations"]),
            ("list_org_members", &["organization_members"]),
            ("list_repositories", &["repositories"]),
            (
                "get_repository_permissions",
                &["repository_collaborators", "organization_members", "repositories"],
            ),
            ("upsert_repository", &["repositories"]),
            ("update_repository_permissions", &["repository_collaborators"]),
            ("create_organization", &["organizations", "organization_members"]),
            ("invite_org_member", &["organization_members"]),
            ("remove_org_member", &["organization_members"]),
            (
                "fork_repository",
                &["repositories", "branches", "commits", "directories", "files", "file_contents"],
            ),
            ("create_branch", &["branches"]),
            ("erase_branch", &["branches"]),
            ("list_branches", &["branches"]),
            (
                "upsert_file_directory",
                &["files", "directories", "commits", "file_contents"],
            ),
            ("delete_file", &["files", "commits"]),
            ("list_files_directories", &["files", "directories"]),
            ("create_pull_request", &["pull_requests"]),
            ("update_pull_request", &["pull_requests"]),
            ("list_pull_requests", &["pull_requests"]),
            ("upsert_comment", &["comments"]),
            ("submit_pr_review", &["pull_request_reviews"]),
            ("list_labels", &["labels"]),
            ("upsert_label", &["labels"]),
            ("create_workflow", &["workflows"]),
            ("update_workflow", &["workflows"]),
            ("delete_workflow", &["workflows"]),
            ("list_workflows", &["workflows"]),
            ("upsert_release", &["releases"]),
            ("delete_release", &["releases"]),
            ("list_releases", &["releases"]),
            ("star_unstar_repo", &["stars"]),
            ("list_stars", &["stars"]),
            ("update_issues", &["issues"]),
            ("delete_issue", &["issues"]),
            ("search_issues", &["issues"]),
            ("list_comments", &["comments"]),
            ("delete_comment", &["comments"]),
        ];

        let entries: BTreeMap<String, BTreeSet<String>> = ENTRIES
            .iter()
            .map(|(tool, tables)| {
                (
                    tool.to_string(),
                    tables.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
                )
            })
            .collect();
        Self { entries }
    }
}

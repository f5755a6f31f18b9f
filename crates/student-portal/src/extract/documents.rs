//! Document tree and folder listings (`DocDownloadTree.aspx`).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::script_array::{self, Triple};
use super::{extract_table, query_param_u64, Extracted, TableSpec};
use crate::error::PortalResult;

/// A folder or document in the course-material tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: u64,
    /// Underscore-delimited ancestry path, e.g. `1_2_3`.
    pub hierarchy_id: String,
    /// `None` for roots.
    pub parent_id: Option<String>,
    pub name: String,
    pub children: Vec<TreeNode>,
}

/// A downloadable file inside a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: Option<u64>,
    pub file_type: String,
    pub name: String,
    pub size: String,
    pub description: String,
    pub download_ref: Option<String>,
}

pub const FILES_TABLE: TableSpec = TableSpec {
    name: "files",
    selectors: &[
        "table#gvDatoteke",
        "table[id$='gvDatoteke']",
        "table.datoteke",
        "table[id*='atotek']",
    ],
    min_columns: 3,
    empty_labels: &["span[id$='lblNemaDatoteka']"],
};

/// Parent path of a hierarchy id: everything before the last underscore.
pub fn parent_of(hierarchy_id: &str) -> Option<&str> {
    hierarchy_id
        .rsplit_once('_')
        .map(|(parent, _)| parent)
        .filter(|p| !p.is_empty())
}

/// Read the embedded tree array of a page and build its forest.
pub fn parse_tree(html: &str) -> PortalResult<Vec<TreeNode>> {
    let triples = script_array::extract_triples(html)?;
    let forest = build_forest(triples);
    tracing::info!(roots = forest.len(), "extracted document tree");
    Ok(forest)
}

/// Build a forest from flat triples in any order.
///
/// Nodes are grouped by parent in one pass; a node whose parent is not in the
/// batch becomes a root with `parent_id` cleared, so every remaining
/// `parent_id` points at a node of the same forest. Duplicate hierarchy ids
/// keep their first occurrence.
pub fn build_forest(triples: Vec<Triple>) -> Vec<TreeNode> {
    let mut seen = HashSet::new();
    let nodes: Vec<Triple> = triples
        .into_iter()
        .filter(|t| seen.insert(t.hierarchy_id.clone()))
        .collect();

    let mut roots = Vec::new();
    let mut by_parent: HashMap<String, Vec<Triple>> = HashMap::new();
    for triple in nodes {
        match parent_of(&triple.hierarchy_id) {
            Some(parent) if seen.contains(parent) => {
                by_parent.entry(parent.to_string()).or_default().push(triple);
            }
            _ => roots.push(triple),
        }
    }

    roots
        .into_iter()
        .map(|t| attach(t, None, &mut by_parent))
        .collect()
}

fn attach(
    triple: Triple,
    parent_id: Option<String>,
    by_parent: &mut HashMap<String, Vec<Triple>>,
) -> TreeNode {
    let children = by_parent
        .remove(&triple.hierarchy_id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| attach(child, Some(triple.hierarchy_id.clone()), by_parent))
        .collect();

    TreeNode {
        id: triple.id,
        hierarchy_id: triple.hierarchy_id,
        parent_id,
        name: triple.name,
        children,
    }
}

/// Parse a folder's file listing.
pub fn parse_files(html: &str) -> Extracted<FileEntry> {
    extract_table(html, &FILES_TABLE, |row| {
        let (type_col, name_col) = if row.len() >= 4 { (0, 1) } else { (usize::MAX, 0) };
        let name = row.text(name_col);
        if name.is_empty() {
            return None;
        }
        let download_ref = row.link(name_col).or_else(|| {
            (0..row.len()).find_map(|i| row.link(i).filter(|l| l.contains("getFile")))
        });
        let id = download_ref
            .as_deref()
            .and_then(|l| query_param_u64(l, "id"));

        let rest = name_col + 1;
        Some(FileEntry {
            id,
            file_type: row.text(type_col),
            name,
            size: row.text(rest),
            description: row.text(rest + 1),
            download_ref,
        })
    })
}

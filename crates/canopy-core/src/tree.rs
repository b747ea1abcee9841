//! The in-memory workspace tree
//!
//! A [`PathTree`] is an ordered sequence of root-level [`FileNode`]s. Trees are
//! values: every operation in [`ops`](crate::ops) builds a new tree and leaves
//! its input untouched, so a snapshot held by a reader never changes under it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A node in the workspace tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileNode {
    /// A file with its full text payload
    File {
        /// Name, unique among siblings
        name: String,
        /// File contents
        content: String,
    },
    /// A directory; child order is display order only
    Directory {
        /// Name, unique among siblings
        name: String,
        /// Child nodes
        children: Vec<FileNode>,
    },
}

impl FileNode {
    /// Create a file node
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        FileNode::File {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Create a directory node; invalid or duplicate children are dropped
    pub fn directory(name: impl Into<String>, children: Vec<FileNode>) -> Self {
        FileNode::Directory {
            name: name.into(),
            children: normalize(children),
        }
    }

    /// Name of the node
    pub fn name(&self) -> &str {
        match self {
            FileNode::File { name, .. } | FileNode::Directory { name, .. } => name,
        }
    }

    /// Whether this node is a file
    pub fn is_file(&self) -> bool {
        matches!(self, FileNode::File { .. })
    }

    /// Whether this node is a directory
    pub fn is_directory(&self) -> bool {
        matches!(self, FileNode::Directory { .. })
    }

    /// File contents, `None` for directories
    pub fn content(&self) -> Option<&str> {
        match self {
            FileNode::File { content, .. } => Some(content),
            FileNode::Directory { .. } => None,
        }
    }

    /// Directory children, `None` for files
    pub fn children(&self) -> Option<&[FileNode]> {
        match self {
            FileNode::File { .. } => None,
            FileNode::Directory { children, .. } => Some(children),
        }
    }

    /// Number of nodes in this subtree, including itself
    pub fn node_count(&self) -> usize {
        match self {
            FileNode::File { .. } => 1,
            FileNode::Directory { children, .. } => {
                1 + children.iter().map(FileNode::node_count).sum::<usize>()
            }
        }
    }
}

/// Whether `name` can be addressed by a single path segment
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

/// Enforce the sibling invariants on a raw node list: unaddressable names are
/// dropped and, among duplicate names, the first occurrence is kept.
fn normalize(nodes: Vec<FileNode>) -> Vec<FileNode> {
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(nodes.len());

    for node in nodes {
        if !is_valid_name(node.name()) {
            tracing::debug!("Dropping node with invalid name '{}'", node.name());
            continue;
        }
        if !seen.insert(node.name().to_string()) {
            tracing::debug!("Dropping duplicate sibling '{}'", node.name());
            continue;
        }

        let node = match node {
            FileNode::Directory { name, children } => FileNode::Directory {
                name,
                children: normalize(children),
            },
            file => file,
        };
        result.push(node);
    }

    result
}

/// The workspace: an unnamed root directory holding the top-level nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<FileNode>", into = "Vec<FileNode>")]
pub struct PathTree {
    roots: Vec<FileNode>,
}

impl PathTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from raw nodes, enforcing sibling-name uniqueness
    pub fn from_nodes(nodes: Vec<FileNode>) -> Self {
        Self {
            roots: normalize(nodes),
        }
    }

    /// Wrap nodes that already satisfy the tree invariants
    pub(crate) fn from_normalized(roots: Vec<FileNode>) -> Self {
        Self { roots }
    }

    /// The starter workspace used when no saved state exists
    pub fn seed() -> Self {
        Self::from_nodes(vec![
            FileNode::file(
                "README.md",
                "# Welcome\n\nAsk the assistant to create, read, update or delete files in this workspace.\n",
            ),
            FileNode::file(
                "hello.py",
                "def hello_world():\n    \"\"\"This is a simple python function.\"\"\"\n    print(\"Hello from Python!\")\n\nhello_world()\n",
            ),
        ])
    }

    /// Root-level nodes in display order
    pub fn roots(&self) -> &[FileNode] {
        &self.roots
    }

    /// Total number of reachable nodes
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(FileNode::node_count).sum()
    }

    /// Whether the workspace has no nodes at all
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Consume the tree, returning its root nodes
    pub fn into_nodes(self) -> Vec<FileNode> {
        self.roots
    }
}

impl From<Vec<FileNode>> for PathTree {
    fn from(nodes: Vec<FileNode>) -> Self {
        Self::from_nodes(nodes)
    }
}

impl From<PathTree> for Vec<FileNode> {
    fn from(tree: PathTree) -> Self {
        tree.roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_accessors() {
        let file = FileNode::file("a.txt", "hi");
        assert!(file.is_file());
        assert_eq!(file.name(), "a.txt");
        assert_eq!(file.content(), Some("hi"));
        assert!(file.children().is_none());

        let dir = FileNode::directory("src", vec![file.clone()]);
        assert!(dir.is_directory());
        assert_eq!(dir.content(), None);
        assert_eq!(dir.children().unwrap().len(), 1);
        assert_eq!(dir.node_count(), 2);
    }

    #[test]
    fn test_duplicate_siblings_keep_first() {
        let tree = PathTree::from_nodes(vec![
            FileNode::file("a.txt", "first"),
            FileNode::directory("a.txt", vec![]),
            FileNode::file("a.txt", "third"),
        ]);

        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.roots()[0].content(), Some("first"));
    }

    #[test]
    fn test_invalid_names_are_dropped() {
        let tree = PathTree::from_nodes(vec![
            FileNode::file("", "x"),
            FileNode::file("a/b", "x"),
            FileNode::file("..", "x"),
            FileNode::file("ok", "x"),
        ]);

        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.roots()[0].name(), "ok");
    }

    #[test]
    fn test_nested_normalization() {
        let tree = PathTree::from_nodes(vec![FileNode::Directory {
            name: "src".to_string(),
            children: vec![FileNode::file("x", "1"), FileNode::file("x", "2")],
        }]);

        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn test_serialization_shape() {
        let tree = PathTree::from_nodes(vec![FileNode::directory(
            "src",
            vec![FileNode::file("main.rs", "fn main() {}")],
        )]);

        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json[0]["type"], "directory");
        assert_eq!(json[0]["name"], "src");
        assert_eq!(json[0]["children"][0]["type"], "file");
        assert_eq!(json[0]["children"][0]["content"], "fn main() {}");
    }

    #[test]
    fn test_deserialization_normalizes() {
        let json = r#"[
            {"type": "file", "name": "a", "content": "1"},
            {"type": "file", "name": "a", "content": "2"}
        ]"#;

        let tree: PathTree = serde_json::from_str(json).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.roots()[0].content(), Some("1"));
    }

    #[test]
    fn test_seed_tree() {
        let tree = PathTree::seed();
        assert!(!tree.is_empty());
        assert!(tree.roots().iter().any(|n| n.name() == "README.md"));
        assert!(tree.roots().iter().any(|n| n.name() == "hello.py"));
    }
}

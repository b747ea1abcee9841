//! Pure file system operations over a [`PathTree`]
//!
//! None of these functions mutate their input. Mutations return a freshly
//! built tree; when a mutation does not apply (missing target, name clash,
//! a file standing where a directory is needed) the returned tree equals
//! the input. Paths are resolved segment by segment from the roots on every
//! call.

use crate::path::{PathError, WorkspacePath};
use crate::tree::{FileNode, PathTree};

/// How [`write`] treats the target file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create the file (and any missing parent directories). If the file
    /// already exists it is left untouched.
    Create,
    /// Replace the contents of an existing file. If there is no file at the
    /// path nothing happens.
    Update,
}

/// Find the node named by `path`
pub fn resolve<'a>(tree: &'a PathTree, path: &WorkspacePath) -> Result<&'a FileNode, PathError> {
    let mut level = tree.roots();

    for (index, segment) in path.segments().iter().enumerate() {
        let node = level
            .iter()
            .find(|node| node.name() == segment)
            .ok_or_else(|| PathError::NotFound(path.to_string()))?;

        if index + 1 == path.depth() {
            return Ok(node);
        }

        level = node
            .children()
            .ok_or_else(|| PathError::NotADirectory(path.prefix(index + 1)))?;
    }

    Err(PathError::NotFound(path.to_string()))
}

/// Every reachable path, depth-first with parents before their children.
/// Directory entries carry a trailing `/`.
pub fn list(tree: &PathTree) -> Vec<String> {
    let mut paths = Vec::with_capacity(tree.node_count());
    collect_paths(tree.roots(), "", &mut paths);
    paths
}

fn collect_paths(nodes: &[FileNode], prefix: &str, out: &mut Vec<String>) {
    for node in nodes {
        let current = if prefix.is_empty() {
            node.name().to_string()
        } else {
            format!("{}/{}", prefix, node.name())
        };

        match node {
            FileNode::File { .. } => out.push(current),
            FileNode::Directory { children, .. } => {
                out.push(format!("{}/", current));
                collect_paths(children, &current, out);
            }
        }
    }
}

/// Contents of the file at `path`
pub fn read<'a>(tree: &'a PathTree, path: &WorkspacePath) -> Result<&'a str, PathError> {
    resolve(tree, path)?
        .content()
        .ok_or_else(|| PathError::IsADirectory(path.to_string()))
}

/// Create or overwrite the file at `path`, see [`WriteMode`]
pub fn write(tree: &PathTree, path: &WorkspacePath, content: &str, mode: WriteMode) -> PathTree {
    let rebuilt = match mode {
        WriteMode::Create => create_in(tree.roots(), path.segments(), content),
        WriteMode::Update => update_in(tree.roots(), path.segments(), content),
    };

    match rebuilt {
        Some(roots) => PathTree::from_normalized(roots),
        None => {
            tracing::debug!("{:?} of '{}' left the tree unchanged", mode, path);
            tree.clone()
        }
    }
}

/// Remove the node at `path` (a file or a whole directory). Deleting a path
/// that does not resolve returns an equal tree.
pub fn delete(tree: &PathTree, path: &WorkspacePath) -> PathTree {
    match delete_in(tree.roots(), path.segments()) {
        Some(roots) => PathTree::from_normalized(roots),
        None => {
            tracing::debug!("Delete of '{}' found nothing to remove", path);
            tree.clone()
        }
    }
}

/// Rebuild `nodes` with a new file at `segments`; `None` when nothing changes
fn create_in(nodes: &[FileNode], segments: &[String], content: &str) -> Option<Vec<FileNode>> {
    let (first, rest) = segments.split_first()?;
    let position = nodes.iter().position(|node| node.name() == first);

    if rest.is_empty() {
        // existing entry wins, whatever its kind
        if position.is_some() {
            return None;
        }
        let mut rebuilt = nodes.to_vec();
        rebuilt.push(FileNode::file(first.clone(), content));
        return Some(rebuilt);
    }

    match position {
        None => {
            let children = create_in(&[], rest, content)?;
            let mut rebuilt = nodes.to_vec();
            rebuilt.push(FileNode::Directory {
                name: first.clone(),
                children,
            });
            Some(rebuilt)
        }
        Some(index) => match &nodes[index] {
            FileNode::File { .. } => None,
            FileNode::Directory { name, children } => {
                let children = create_in(children, rest, content)?;
                let mut rebuilt = nodes.to_vec();
                rebuilt[index] = FileNode::Directory {
                    name: name.clone(),
                    children,
                };
                Some(rebuilt)
            }
        },
    }
}

fn update_in(nodes: &[FileNode], segments: &[String], content: &str) -> Option<Vec<FileNode>> {
    let (first, rest) = segments.split_first()?;
    let index = nodes.iter().position(|node| node.name() == first)?;

    let replacement = match (&nodes[index], rest.is_empty()) {
        (FileNode::File { name, .. }, true) => FileNode::file(name.clone(), content),
        (FileNode::Directory { name, children }, false) => FileNode::Directory {
            name: name.clone(),
            children: update_in(children, rest, content)?,
        },
        _ => return None,
    };

    let mut rebuilt = nodes.to_vec();
    rebuilt[index] = replacement;
    Some(rebuilt)
}

fn delete_in(nodes: &[FileNode], segments: &[String]) -> Option<Vec<FileNode>> {
    let (first, rest) = segments.split_first()?;
    let index = nodes.iter().position(|node| node.name() == first)?;

    let mut rebuilt = nodes.to_vec();
    if rest.is_empty() {
        rebuilt.remove(index);
        return Some(rebuilt);
    }

    match &nodes[index] {
        FileNode::File { .. } => None,
        FileNode::Directory { name, children } => {
            rebuilt[index] = FileNode::Directory {
                name: name.clone(),
                children: delete_in(children, rest)?,
            };
            Some(rebuilt)
        }
    }
}

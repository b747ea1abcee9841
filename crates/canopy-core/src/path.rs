//! Slash-delimited workspace paths
//!
//! A [`WorkspacePath`] names a node in a [`PathTree`](crate::tree::PathTree)
//! by the sequence of names walked from the roots, e.g. `src/components/App.tsx`.

use std::fmt;
use thiserror::Error;

/// Errors produced while parsing or resolving a workspace path
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The path text is not a well-formed workspace path
    #[error("Invalid path: '{0}'")]
    Invalid(String),

    /// Some segment of the path does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// An intermediate segment is a file, so it cannot have children
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// The path names a directory where a file was expected
    #[error("Path is a directory, not a file: {0}")]
    IsADirectory(String),
}

/// A parsed, non-empty workspace path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspacePath {
    segments: Vec<String>,
}

impl WorkspacePath {
    /// Parse a path such as `src/main.rs`.
    ///
    /// One leading `/` and one trailing `/` are accepted and dropped, so the
    /// directory entries produced by [`list`](crate::ops::list) parse back.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.strip_prefix('/').unwrap_or(raw);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

        if trimmed.is_empty() {
            return Err(PathError::Invalid(raw.to_string()));
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(PathError::Invalid(raw.to_string()));
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    /// All segments, root first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final segment
    pub fn file_name(&self) -> &str {
        // parse() guarantees at least one segment
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Every segment except the last
    pub fn parent_segments(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Canonical text of the first `len` segments
    pub(crate) fn prefix(&self, len: usize) -> String {
        self.segments[..len.min(self.segments.len())].join("/")
    }
}

impl fmt::Display for WorkspacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl std::str::FromStr for WorkspacePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_path() {
        let path = WorkspacePath::parse("src/components/App.tsx").unwrap();
        assert_eq!(path.segments(), &["src", "components", "App.tsx"]);
        assert_eq!(path.file_name(), "App.tsx");
        assert_eq!(path.parent_segments(), &["src", "components"]);
        assert_eq!(path.depth(), 3);
        assert_eq!(path.to_string(), "src/components/App.tsx");
    }

    #[test]
    fn test_parse_single_segment() {
        let path = WorkspacePath::parse("README.md").unwrap();
        assert_eq!(path.file_name(), "README.md");
        assert!(path.parent_segments().is_empty());
    }

    #[test]
    fn test_leading_and_trailing_slash_are_dropped() {
        assert_eq!(WorkspacePath::parse("/src/lib.rs").unwrap().to_string(), "src/lib.rs");
        assert_eq!(WorkspacePath::parse("src/").unwrap().to_string(), "src");
    }

    #[test]
    fn test_rejects_malformed_paths() {
        for raw in ["", "/", "//", "a//b", "./a", "a/../b", "a/."] {
            assert_eq!(
                WorkspacePath::parse(raw),
                Err(PathError::Invalid(raw.to_string())),
                "expected '{}' to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PathError::NotFound("a/b".to_string()).to_string(),
            "File not found: a/b"
        );
        assert_eq!(
            PathError::IsADirectory("src".to_string()).to_string(),
            "Path is a directory, not a file: src"
        );
    }

    #[test]
    fn test_from_str() {
        let path: WorkspacePath = "a/b".parse().unwrap();
        assert_eq!(path.prefix(1), "a");
        assert_eq!(path.prefix(5), "a/b");
    }
}

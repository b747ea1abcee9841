//! Persisted workspace state
//!
//! The caller owns the current tree and history. Both are stored together as
//! plain JSON and replaced wholesale after every request.

use canopy_agent::ConversationHistory;
use canopy_core::PathTree;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading or saving state
#[derive(Error, Debug)]
pub enum StateError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything needed to resume a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceState {
    /// The workspace tree
    pub files: PathTree,
    /// The conversation so far
    pub history: ConversationHistory,
}

impl WorkspaceState {
    /// A fresh session on the starter workspace
    pub fn seeded() -> Self {
        Self {
            files: PathTree::seed(),
            history: ConversationHistory::new(),
        }
    }

    /// Load state from `path`, `None` if the file does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>, StateError> {
        let contents = match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Load state from `path`, seeding a new workspace if none is saved
    pub fn load_or_seed<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        match Self::load(path.as_ref())? {
            Some(state) => Ok(state),
            None => {
                tracing::info!("No saved state at {}, starting fresh", path.as_ref().display());
                Ok(Self::seeded())
            }
        }
    }

    /// Save state to `path`, replacing any previous file in one step
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StateError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents)?;
        std::fs::rename(&temp_path, path)?;

        tracing::debug!("Saved workspace state to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_agent::{ToolInvocation, ToolResult};
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = WorkspaceState::load(temp_dir.path().join("state.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_or_seed_uses_starter_workspace() {
        let temp_dir = TempDir::new().unwrap();
        let state = WorkspaceState::load_or_seed(temp_dir.path().join("state.json")).unwrap();
        assert_eq!(state.files, PathTree::seed());
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".canopy").join("state.json");

        let call = ToolInvocation::new("list_files", serde_json::json!({}));
        let mut state = WorkspaceState::seeded();
        state.history.push_user("What files are there?");
        state.history.push_model("", vec![call.clone()]);
        state.history.push_tool(&call, ToolResult::files(vec!["README.md".to_string()]));
        state.history.push_model("Just a README.", vec![]);

        state.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = WorkspaceState::load(&path).unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_load_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(WorkspaceState::load(&path), Err(StateError::Json(_))));
    }
}

//! Tool execution engine
//!
//! This module applies tool invocations to a [`PathTree`]. Execution is
//! synchronous and in-memory; every failure becomes a [`ToolResult::Error`]
//! so the model can read it and correct itself.

use super::{ToolInvocation, ToolName, ToolResult};
use canopy_core::ops::{self, WriteMode};
use canopy_core::{PathError, PathTree, WorkspacePath};
use thiserror::Error;

/// Errors that can occur during tool execution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Invalid tool input
    #[error("Invalid tool input: {0}")]
    InvalidInput(String),

    /// Tool not found
    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    /// Path could not be parsed or resolved
    #[error("{0}")]
    Path(#[from] PathError),
}

/// Outcome of one tool invocation: the tree after the call and the result
/// reported back to the model
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Tree with the invocation applied (equal to the input on failure)
    pub tree: PathTree,
    /// Result for the model
    pub result: ToolResult,
}

/// Tool executor that applies tool requests to a workspace tree
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolExecutor;

impl ToolExecutor {
    /// Create a new tool executor
    pub fn new() -> Self {
        Self
    }

    /// Execute a tool invocation against `tree`
    pub fn execute(&self, tree: &PathTree, invocation: &ToolInvocation) -> Dispatch {
        let outcome = match ToolName::parse(&invocation.name) {
            Some(ToolName::ListFiles) => Ok((None, ToolResult::files(ops::list(tree)))),
            Some(ToolName::ReadFile) => self.execute_read(tree, invocation).map(|r| (None, r)),
            Some(ToolName::CreateFile) => self.execute_write(tree, invocation, WriteMode::Create),
            Some(ToolName::UpdateFile) => self.execute_write(tree, invocation, WriteMode::Update),
            Some(ToolName::DeleteFile) => self.execute_delete(tree, invocation),
            None => Err(ToolError::ToolNotFound(invocation.name.clone())),
        };

        match outcome {
            Ok((updated, result)) => Dispatch {
                tree: updated.unwrap_or_else(|| tree.clone()),
                result,
            },
            Err(e) => {
                tracing::debug!("Tool '{}' failed: {}", invocation.name, e);
                Dispatch {
                    tree: tree.clone(),
                    result: ToolResult::error(e.to_string()),
                }
            }
        }
    }

    /// Execute the read_file tool
    fn execute_read(&self, tree: &PathTree, input: &ToolInvocation) -> Result<ToolResult, ToolError> {
        let path = required_path(input)?;
        let content = ops::read(tree, &path)?;
        Ok(ToolResult::content(content))
    }

    /// Execute the create_file and update_file tools
    fn execute_write(
        &self,
        tree: &PathTree,
        input: &ToolInvocation,
        mode: WriteMode,
    ) -> Result<(Option<PathTree>, ToolResult), ToolError> {
        let path = required_path(input)?;
        let content = input
            .content()
            .ok_or_else(|| ToolError::InvalidInput("Missing content".to_string()))?;

        let updated = ops::write(tree, &path, content, mode);
        Ok((Some(updated), ToolResult::written(path.to_string())))
    }

    /// Execute the delete_file tool
    fn execute_delete(
        &self,
        tree: &PathTree,
        input: &ToolInvocation,
    ) -> Result<(Option<PathTree>, ToolResult), ToolError> {
        let path = required_path(input)?;
        let updated = ops::delete(tree, &path);
        Ok((Some(updated), ToolResult::written(path.to_string())))
    }
}

fn required_path(input: &ToolInvocation) -> Result<WorkspacePath, ToolError> {
    let raw = input
        .path()
        .ok_or_else(|| ToolError::InvalidInput("Missing path".to_string()))?;
    Ok(WorkspacePath::parse(raw)?)
}

//! Tool definitions for the model
//!
//! This module declares the workspace tools the model may call, together with
//! the invocation and result shapes that travel between the model and the
//! [`ToolExecutor`].

mod executor;

pub use executor::{Dispatch, ToolError, ToolExecutor};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Version of the tool catalogue handed to the model
pub const SCHEMA_VERSION: u32 = 1;

/// The workspace operations exposed to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ListFiles,
    ReadFile,
    CreateFile,
    UpdateFile,
    DeleteFile,
}

impl ToolName {
    /// Every tool, in catalogue order
    pub const ALL: [ToolName; 5] = [
        ToolName::ListFiles,
        ToolName::ReadFile,
        ToolName::CreateFile,
        ToolName::UpdateFile,
        ToolName::DeleteFile,
    ];

    /// Wire name of the tool
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ListFiles => "list_files",
            ToolName::ReadFile => "read_file",
            ToolName::CreateFile => "create_file",
            ToolName::UpdateFile => "update_file",
            ToolName::DeleteFile => "delete_file",
        }
    }

    /// Look a tool up by its wire name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    /// Whether the tool takes a `path` argument
    pub fn takes_path(&self) -> bool {
        !matches!(self, ToolName::ListFiles)
    }

    /// Whether the tool writes file content
    pub fn writes_content(&self) -> bool {
        matches!(self, ToolName::CreateFile | ToolName::UpdateFile)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of a single tool, as sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Name of the tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON schema for the tool's parameters
    pub parameters: JsonValue,
}

/// The versioned catalogue of tools available to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Catalogue version
    pub version: u32,
    /// Tool declarations in catalogue order
    pub tools: Vec<ToolDeclaration>,
}

impl ToolSchema {
    /// The fixed catalogue of workspace tools
    pub fn catalogue() -> Self {
        Self {
            version: SCHEMA_VERSION,
            tools: ToolName::ALL.iter().map(|tool| declaration(*tool)).collect(),
        }
    }

    /// Find a declaration by name
    pub fn get(&self, name: &str) -> Option<&ToolDeclaration> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Tool names in catalogue order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name.as_str()).collect()
    }
}

impl Default for ToolSchema {
    fn default() -> Self {
        Self::catalogue()
    }
}

fn path_property(description: &str) -> JsonValue {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

/// Build the declaration for one tool
pub fn declaration(tool: ToolName) -> ToolDeclaration {
    let (description, parameters) = match tool {
        ToolName::ListFiles => (
            "List all files and directories in the workspace. Directory entries end with '/'.",
            serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        ),
        ToolName::ReadFile => (
            "Read the content of a file at a given path.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": path_property("The full path of the file to read, e.g. \"src/App.tsx\"")
                },
                "required": ["path"]
            }),
        ),
        ToolName::CreateFile => (
            "Create a new file with content. Missing parent directories are created. An existing file is left unchanged.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": path_property("The full path for the new file, e.g. \"src/components/Button.tsx\""),
                    "content": {
                        "type": "string",
                        "description": "The content to write into the file"
                    }
                },
                "required": ["path", "content"]
            }),
        ),
        ToolName::UpdateFile => (
            "Replace the content of an existing file.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": path_property("The full path of the file to update"),
                    "content": {
                        "type": "string",
                        "description": "The new content to overwrite the file with"
                    }
                },
                "required": ["path", "content"]
            }),
        ),
        ToolName::DeleteFile => (
            "Delete the file or directory at a given path.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": path_property("The full path of the file or directory to delete")
                },
                "required": ["path"]
            }),
        ),
    };

    ToolDeclaration {
        name: tool.as_str().to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Name of the tool to use
    pub name: String,
    /// Arguments for the tool
    #[serde(default)]
    pub args: Map<String, JsonValue>,
}

impl ToolInvocation {
    /// Create an invocation; non-object `args` are treated as no arguments
    pub fn new(name: impl Into<String>, args: JsonValue) -> Self {
        let args = match args {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            args,
        }
    }

    /// A string argument, if present
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(JsonValue::as_str)
    }

    /// The `path` argument
    pub fn path(&self) -> Option<&str> {
        self.str_arg("path")
    }

    /// The `content` argument
    pub fn content(&self) -> Option<&str> {
        self.str_arg("content")
    }
}

/// Result of executing a tool: an operation-specific payload or an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResult {
    /// Workspace listing
    Files { files: Vec<String> },
    /// File contents
    Content { content: String },
    /// A create, update or delete was applied
    Written { success: bool, path: String },
    /// The call failed
    Error { error: String },
}

impl ToolResult {
    /// Create a listing result
    pub fn files(files: Vec<String>) -> Self {
        ToolResult::Files { files }
    }

    /// Create a read result
    pub fn content(content: impl Into<String>) -> Self {
        ToolResult::Content {
            content: content.into(),
        }
    }

    /// Create a successful write/delete result
    pub fn written(path: impl Into<String>) -> Self {
        ToolResult::Written {
            success: true,
            path: path.into(),
        }
    }

    /// Create an error result
    pub fn error(message: impl Into<String>) -> Self {
        ToolResult::Error {
            error: message.into(),
        }
    }

    /// Whether this result reports a failure
    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error { .. })
    }

    /// The error message, if any
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ToolResult::Error { error } => Some(error),
            _ => None,
        }
    }

    /// The result as a JSON value
    pub fn to_value(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_contents() {
        let schema = ToolSchema::catalogue();
        assert_eq!(schema.version, SCHEMA_VERSION);
        assert_eq!(
            schema.names(),
            vec!["list_files", "read_file", "create_file", "update_file", "delete_file"]
        );
    }

    #[test]
    fn test_path_tools_require_path() {
        let schema = ToolSchema::catalogue();
        for tool in ToolName::ALL.iter().filter(|t| t.takes_path()) {
            let decl = schema.get(tool.as_str()).unwrap();
            let required = decl.parameters["required"].as_array().unwrap();
            assert!(required.contains(&serde_json::json!("path")), "{} must require path", tool);
            assert_eq!(decl.parameters["properties"]["path"]["type"], "string");
        }
    }

    #[test]
    fn test_content_required_exactly_for_writes() {
        let schema = ToolSchema::catalogue();
        for tool in ToolName::ALL {
            let decl = schema.get(tool.as_str()).unwrap();
            let requires_content = decl.parameters["required"]
                .as_array()
                .map(|r| r.contains(&serde_json::json!("content")))
                .unwrap_or(false);
            assert_eq!(requires_content, tool.writes_content(), "{}", tool);
        }
    }

    #[test]
    fn test_list_files_takes_no_arguments() {
        let decl = declaration(ToolName::ListFiles);
        assert!(decl.parameters["properties"].as_object().unwrap().is_empty());
        assert!(decl.parameters.get("required").is_none());
    }

    #[test]
    fn test_tool_name_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::parse("frobnicate"), None);
    }

    #[test]
    fn test_invocation_arguments() {
        let call = ToolInvocation::new(
            "create_file",
            serde_json::json!({"path": "a.txt", "content": "hi", "n": 3}),
        );
        assert_eq!(call.str_arg("path"), Some("a.txt"));
        assert_eq!(call.str_arg("content"), Some("hi"));
        assert_eq!(call.str_arg("n"), None);
        assert_eq!(call.path(), Some("a.txt"));
        assert_eq!(call.content(), Some("hi"));

        let bare = ToolInvocation::new("list_files", serde_json::Value::Null);
        assert!(bare.args.is_empty());
    }

    #[test]
    fn test_tool_result_wire_shapes() {
        assert_eq!(
            ToolResult::files(vec!["a/".into(), "a/b".into()]).to_value(),
            serde_json::json!({"files": ["a/", "a/b"]})
        );
        assert_eq!(
            ToolResult::content("x").to_value(),
            serde_json::json!({"content": "x"})
        );
        assert_eq!(
            ToolResult::written("a/b").to_value(),
            serde_json::json!({"success": true, "path": "a/b"})
        );
        assert_eq!(
            ToolResult::error("nope").to_value(),
            serde_json::json!({"error": "nope"})
        );
    }

    #[test]
    fn test_tool_result_parses_each_shape() {
        let parsed: ToolResult = serde_json::from_str(r#"{"error": "File not found: x"}"#).unwrap();
        assert!(parsed.is_error());
        assert_eq!(parsed.error_message(), Some("File not found: x"));

        let parsed: ToolResult = serde_json::from_str(r#"{"success": true, "path": "x"}"#).unwrap();
        assert_eq!(parsed, ToolResult::written("x"));
    }
}

//! Conversation management for the AI agent
//!
//! A [`ConversationHistory`] is an append-only log of turns. Tool turns always
//! directly follow the model turn that requested them, in request order.

use crate::tools::{ToolInvocation, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Role of a turn's author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Model message
    Model,
    /// Result of a tool call
    Tool,
}

/// Errors raised when decoding persisted turns
#[derive(Error, Debug)]
pub enum HistoryError {
    /// A tool turn without the name of the tool it answers
    #[error("Tool turn is missing its tool name")]
    MissingToolName,

    /// A tool turn whose content is not a tool result
    #[error("Tool turn content is not a valid tool result: {0}")]
    InvalidToolResult(#[from] serde_json::Error),
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireTurn", try_from = "WireTurn")]
pub enum ConversationTurn {
    /// Text typed by the user
    User { text: String },
    /// A model reply, possibly requesting tool calls
    Model {
        text: String,
        tool_calls: Vec<ToolInvocation>,
    },
    /// The result of one tool call, echoing its arguments
    Tool {
        name: String,
        args: Map<String, JsonValue>,
        result: ToolResult,
    },
}

impl ConversationTurn {
    /// Role of this turn
    pub fn role(&self) -> Role {
        match self {
            ConversationTurn::User { .. } => Role::User,
            ConversationTurn::Model { .. } => Role::Model,
            ConversationTurn::Tool { .. } => Role::Tool,
        }
    }

    /// Text of a user or model turn
    pub fn text(&self) -> Option<&str> {
        match self {
            ConversationTurn::User { text } | ConversationTurn::Model { text, .. } => Some(text),
            ConversationTurn::Tool { .. } => None,
        }
    }

    /// Tool calls requested by a model turn
    pub fn tool_calls(&self) -> &[ToolInvocation] {
        match self {
            ConversationTurn::Model { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// Persisted shape of a turn: `{ role, content, toolCalls? }`, plus the tool
/// name and argument echo for tool turns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTurn {
    role: Role,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolInvocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<Map<String, JsonValue>>,
}

impl From<ConversationTurn> for WireTurn {
    fn from(turn: ConversationTurn) -> Self {
        match turn {
            ConversationTurn::User { text } => WireTurn {
                role: Role::User,
                content: text,
                tool_calls: None,
                tool_name: None,
                args: None,
            },
            ConversationTurn::Model { text, tool_calls } => WireTurn {
                role: Role::Model,
                content: text,
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_name: None,
                args: None,
            },
            ConversationTurn::Tool { name, args, result } => WireTurn {
                role: Role::Tool,
                content: result.to_value().to_string(),
                tool_calls: None,
                tool_name: Some(name),
                args: Some(args),
            },
        }
    }
}

impl TryFrom<WireTurn> for ConversationTurn {
    type Error = HistoryError;

    fn try_from(wire: WireTurn) -> Result<Self, Self::Error> {
        Ok(match wire.role {
            Role::User => ConversationTurn::User { text: wire.content },
            Role::Model => ConversationTurn::Model {
                text: wire.content,
                tool_calls: wire.tool_calls.unwrap_or_default(),
            },
            Role::Tool => ConversationTurn::Tool {
                name: wire.tool_name.ok_or(HistoryError::MissingToolName)?,
                args: wire.args.unwrap_or_default(),
                result: serde_json::from_str(&wire.content)?,
            },
        })
    }
}

/// Append-only conversation log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn::User { text: text.into() });
    }

    /// Append a model turn
    pub fn push_model(&mut self, text: impl Into<String>, tool_calls: Vec<ToolInvocation>) {
        self.turns.push(ConversationTurn::Model {
            text: text.into(),
            tool_calls,
        });
    }

    /// Append the result of a tool call
    pub fn push_tool(&mut self, invocation: &ToolInvocation, result: ToolResult) {
        self.turns.push(ConversationTurn::Tool {
            name: invocation.name.clone(),
            args: invocation.args.clone(),
            result,
        });
    }

    /// All turns, oldest first
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the history has no turns
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Text of the most recent model turn
    pub fn last_model_text(&self) -> Option<&str> {
        self.turns.iter().rev().find_map(|turn| match turn {
            ConversationTurn::Model { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

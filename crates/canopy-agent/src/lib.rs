//! Canopy Agent - the model-driven side of the Canopy coding assistant
//!
//! This crate provides:
//! - The workspace tool catalogue and its executor
//! - Conversation history with a persistable wire shape
//! - The model transport trait and a Gemini client
//! - The bounded agent loop tying them together

pub mod agent;
pub mod client;
pub mod conversation;
pub mod tools;

pub use agent::{AgentEvent, AgentLoop, AgentOutcome, LoopState, LoopStatus, MAX_ROUNDS_MESSAGE};
pub use client::{GeminiClient, ModelTransport, ModelTurn, TransportError, TransportErrorKind};
pub use conversation::{ConversationHistory, ConversationTurn, Role};
pub use tools::{ToolExecutor, ToolInvocation, ToolName, ToolResult, ToolSchema};

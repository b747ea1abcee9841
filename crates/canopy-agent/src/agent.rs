//! The bounded tool-calling loop
//!
//! [`AgentLoop`] drives one user request to completion:
//!
//! ```text
//! AwaitingModel -> Dispatching -> AwaitingModel -> ... -> Done | Aborted
//! ```
//!
//! Each pass through `Dispatching` is one round. After `max_rounds` rounds
//! without a plain-text answer the loop stops with [`MAX_ROUNDS_MESSAGE`].
//! Only the model request suspends; tool dispatch runs synchronously against
//! the in-memory tree, each invocation seeing the tree left by the previous
//! one.

use crate::client::{ModelTransport, ModelTurn, TransportError};
use crate::conversation::ConversationHistory;
use crate::tools::{ToolExecutor, ToolInvocation, ToolResult, ToolSchema};
use canopy_core::{Config, PathTree};
use serde_json::{Map, Value as JsonValue};

pub use canopy_core::config::DEFAULT_MAX_ROUNDS;

/// Reply emitted when the round bound stops the loop
pub const MAX_ROUNDS_MESSAGE: &str =
    "Reached maximum number of tool calls. Please check the logs and file system for the result of the operations.";

/// State of the loop
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    /// Waiting for the next model turn
    AwaitingModel,
    /// Executing the tool calls of a model turn
    Dispatching(ModelTurn),
    /// Finished, with the reply for the user
    Done(LoopStatus, String),
    /// The transport failed
    Aborted(TransportError),
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStatus {
    /// The model answered without requesting tools
    Completed,
    /// The round bound was reached
    BoundReached,
    /// A transport error ended the run early
    Aborted(TransportError),
}

/// Something that happened during a run, in order
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Text produced by the model
    ModelText { text: String },
    /// A tool call about to be executed
    ToolCall {
        name: String,
        args: Map<String, JsonValue>,
    },
    /// The result of a tool call
    ToolResult { name: String, result: ToolResult },
    /// A transport failure, with its raw message
    Error { message: String },
}

/// Everything a run hands back to its caller
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// How the run ended
    pub status: LoopStatus,
    /// Reply for the user
    pub reply: String,
    /// History accumulated up to the end of the run
    pub history: ConversationHistory,
    /// Workspace after every executed tool call
    pub tree: PathTree,
    /// Dispatch rounds performed
    pub rounds: u32,
    /// Event log of the run
    pub events: Vec<AgentEvent>,
}

impl AgentOutcome {
    /// Whether the run ended in a transport failure
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, LoopStatus::Aborted(_))
    }
}

/// Agent loop over a model transport
pub struct AgentLoop<T: ModelTransport> {
    /// Model transport
    transport: T,
    /// Tools offered to the model
    schema: ToolSchema,
    /// Tool executor
    executor: ToolExecutor,
    /// Round bound
    max_rounds: u32,
}

impl<T: ModelTransport> AgentLoop<T> {
    /// Create a loop with the standard tool catalogue and round bound
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            schema: ToolSchema::catalogue(),
            executor: ToolExecutor::new(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Create a loop using the configured round bound
    pub fn from_config(transport: T, config: &Config) -> Self {
        Self::new(transport).with_max_rounds(config.agent.max_rounds)
    }

    /// Set the round bound (at least one round)
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// The round bound
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// The tools offered to the model
    pub fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    /// Append `text` as a user turn and run the loop
    pub async fn send(
        &self,
        mut history: ConversationHistory,
        tree: PathTree,
        text: impl Into<String>,
    ) -> AgentOutcome {
        history.push_user(text);
        self.run(history, tree).await
    }

    /// Run the loop on a history that already ends with the user's turn.
    ///
    /// Dropping the returned future stops waiting for the model. The run owns
    /// its copies of `history` and `tree`, so the caller's snapshots stay as
    /// they were.
    pub async fn run(&self, mut history: ConversationHistory, mut tree: PathTree) -> AgentOutcome {
        let mut rounds = 0;
        let mut events = Vec::new();
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    tracing::debug!("Requesting model turn (round {}/{})", rounds + 1, self.max_rounds);

                    match self.transport.send_turn(&history, &self.schema).await {
                        Ok(turn) => {
                            if !turn.text.is_empty() {
                                events.push(AgentEvent::ModelText {
                                    text: turn.text.clone(),
                                });
                            }

                            if turn.has_tool_calls() {
                                LoopState::Dispatching(turn)
                            } else {
                                history.push_model(turn.text.clone(), Vec::new());
                                LoopState::Done(LoopStatus::Completed, turn.text)
                            }
                        }
                        Err(err) => LoopState::Aborted(err),
                    }
                }
                LoopState::Dispatching(turn) => {
                    rounds += 1;
                    tree = self.dispatch(&mut history, tree, turn, &mut events);

                    if rounds >= self.max_rounds {
                        tracing::warn!("Stopping after {} tool rounds", rounds);
                        LoopState::Done(LoopStatus::BoundReached, MAX_ROUNDS_MESSAGE.to_string())
                    } else {
                        LoopState::AwaitingModel
                    }
                }
                LoopState::Done(status, reply) => {
                    tracing::info!("Agent finished after {} rounds ({:?})", rounds, status);
                    return AgentOutcome {
                        status,
                        reply,
                        history,
                        tree,
                        rounds,
                        events,
                    };
                }
                LoopState::Aborted(err) => {
                    tracing::error!("Model request failed: {}", err);
                    events.push(AgentEvent::Error {
                        message: err.message.clone(),
                    });
                    return AgentOutcome {
                        reply: err.user_message().to_string(),
                        status: LoopStatus::Aborted(err),
                        history,
                        tree,
                        rounds,
                        events,
                    };
                }
            };
        }
    }

    /// Execute every tool call of `turn` in order, then append the model turn
    /// and one tool turn per call
    fn dispatch(
        &self,
        history: &mut ConversationHistory,
        mut tree: PathTree,
        turn: ModelTurn,
        events: &mut Vec<AgentEvent>,
    ) -> PathTree {
        let mut results: Vec<(ToolInvocation, ToolResult)> = Vec::with_capacity(turn.tool_calls.len());

        for call in &turn.tool_calls {
            tracing::debug!("Executing tool '{}' with {:?}", call.name, call.args);
            events.push(AgentEvent::ToolCall {
                name: call.name.clone(),
                args: call.args.clone(),
            });

            let dispatch = self.executor.execute(&tree, call);
            tree = dispatch.tree;

            if let Some(error) = dispatch.result.error_message() {
                tracing::debug!("Tool '{}' failed: {}", call.name, error);
            }
            events.push(AgentEvent::ToolResult {
                name: call.name.clone(),
                result: dispatch.result.clone(),
            });
            results.push((call.clone(), dispatch.result));
        }

        history.push_model(turn.text, turn.tool_calls);
        for (call, result) in results {
            history.push_tool(&call, result);
        }

        tree
    }
}

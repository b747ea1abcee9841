//! Model transport for the agent loop
//!
//! The [`ModelTransport`] trait is the only suspension point of the agent
//! loop. [`GeminiClient`] implements it over the Gemini `generateContent`
//! REST API, either directly (holding the API key) or through a relay that
//! forwards the request body verbatim and keeps the credential server-side.

use crate::conversation::{ConversationHistory, ConversationTurn};
use crate::tools::{ToolDeclaration, ToolInvocation, ToolSchema};
use async_trait::async_trait;
use canopy_core::Config;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use thiserror::Error;

/// Broad class of a transport failure, each with its own user-facing text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Quota or rate limit exhausted
    QuotaExceeded,
    /// The API key was rejected or is missing
    InvalidCredential,
    /// The request never reached the provider
    Network,
    /// Anything else
    Unknown,
}

impl TransportErrorKind {
    /// Message shown to the user for this kind of failure
    pub fn user_message(&self) -> &'static str {
        match self {
            TransportErrorKind::QuotaExceeded => {
                "You've exceeded your current API quota. Please check your plan and billing details, or try again later."
            }
            TransportErrorKind::InvalidCredential => {
                "The API key is not valid. Please check your configuration."
            }
            TransportErrorKind::Network => {
                "A network error occurred. Please check your connection and try again."
            }
            TransportErrorKind::Unknown => {
                "Sorry, an error occurred while processing your request."
            }
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::QuotaExceeded => "quota exceeded",
            TransportErrorKind::InvalidCredential => "invalid credential",
            TransportErrorKind::Network => "network",
            TransportErrorKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// A failed request to the model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Transport error ({kind}): {message}")]
pub struct TransportError {
    /// Classification of the failure
    pub kind: TransportErrorKind,
    /// Raw error text, kept for diagnostics
    pub message: String,
}

impl TransportError {
    /// Create an error of a known kind
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify an error by its message text
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        let kind = if lower.contains("429") || lower.contains("resource_exhausted") {
            TransportErrorKind::QuotaExceeded
        } else if lower.contains("api key not valid") {
            TransportErrorKind::InvalidCredential
        } else if lower.contains("fetch") || lower.contains("network") {
            TransportErrorKind::Network
        } else {
            TransportErrorKind::Unknown
        };

        Self { kind, message }
    }

    /// Message shown to the user
    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            TransportError::new(TransportErrorKind::Network, err.to_string())
        } else {
            TransportError::classify(err.to_string())
        }
    }
}

/// One model reply: its text and any tool calls it requests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    /// Text of the reply (may be empty when only tools are called)
    pub text: String,
    /// Requested tool calls, in order
    pub tool_calls: Vec<ToolInvocation>,
}

impl ModelTurn {
    /// A plain text reply
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A reply requesting tool calls
    pub fn with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolInvocation>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
        }
    }

    /// Whether the reply requests any tool call
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Capability to ask the model for its next turn
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Request the next model turn for `history`, offering the tools in `schema`
    async fn send_turn(
        &self,
        history: &ConversationHistory,
        schema: &ToolSchema,
    ) -> Result<ModelTurn, TransportError>;
}

#[async_trait]
impl<T: ModelTransport + ?Sized> ModelTransport for std::sync::Arc<T> {
    async fn send_turn(
        &self,
        history: &ConversationHistory,
        schema: &ToolSchema,
    ) -> Result<ModelTurn, TransportError> {
        (**self).send_turn(history, schema).await
    }
}

/// Request body for `generateContent`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation contents, oldest first
    pub contents: Vec<Content>,
    /// System instruction (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    /// Tool declarations
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSet>,
}

/// A group of function declarations
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSet {
    pub function_declarations: Vec<ToolDeclaration>,
}

/// One content entry of a request or response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A part of a content entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

/// A function call emitted by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, JsonValue>,
}

/// A function result sent back to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: JsonValue,
}

/// Response body of `generateContent`
#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Error object, returned with a 200 status by some relays
    #[serde(default)]
    pub error: Option<ApiError>,
}

/// A response candidate
#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

/// API error
#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

impl GenerateContentRequest {
    /// Build a request from the conversation history and tool schema.
    ///
    /// Consecutive tool turns are grouped into a single `user` content of
    /// function responses, answering the model turn before them.
    pub fn build(
        history: &ConversationHistory,
        schema: &ToolSchema,
        system_instruction: Option<&str>,
    ) -> Self {
        let mut contents: Vec<Content> = Vec::new();
        let mut pending_responses: Vec<Part> = Vec::new();

        for turn in history.turns() {
            if !matches!(turn, ConversationTurn::Tool { .. }) && !pending_responses.is_empty() {
                contents.push(Content {
                    role: Some("user".to_string()),
                    parts: std::mem::take(&mut pending_responses),
                });
            }

            match turn {
                ConversationTurn::User { text } => contents.push(Content {
                    role: Some("user".to_string()),
                    parts: vec![Part::text(text.clone())],
                }),
                // An empty model turn has no parts the provider would accept
                ConversationTurn::Model { text, tool_calls }
                    if text.is_empty() && tool_calls.is_empty() => {}
                ConversationTurn::Model { text, tool_calls } => {
                    let mut parts = Vec::with_capacity(tool_calls.len() + 1);
                    if !text.is_empty() {
                        parts.push(Part::text(text.clone()));
                    }
                    parts.extend(tool_calls.iter().map(|call| Part {
                        function_call: Some(FunctionCall {
                            name: call.name.clone(),
                            args: call.args.clone(),
                        }),
                        ..Part::default()
                    }));
                    contents.push(Content {
                        role: Some("model".to_string()),
                        parts,
                    });
                }
                ConversationTurn::Tool { name, result, .. } => pending_responses.push(Part {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: result.to_value(),
                    }),
                    ..Part::default()
                }),
            }
        }

        if !pending_responses.is_empty() {
            contents.push(Content {
                role: Some("user".to_string()),
                parts: pending_responses,
            });
        }

        let tools = if schema.tools.is_empty() {
            Vec::new()
        } else {
            vec![ToolSet {
                function_declarations: schema.tools.clone(),
            }]
        };

        Self {
            contents,
            system_instruction: system_instruction.map(|text| Content {
                role: None,
                parts: vec![Part::text(text)],
            }),
            tools,
        }
    }
}

impl GenerateContentResponse {
    /// Extract the first candidate as a model turn
    pub fn into_model_turn(self) -> Result<ModelTurn, TransportError> {
        if let Some(error) = self.error {
            let code = error.code.map(|c| c.to_string()).unwrap_or_default();
            let status = error.status.unwrap_or_default();
            return Err(TransportError::classify(format!(
                "{} {}: {}",
                code, status, error.message
            )));
        }

        let content = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .ok_or_else(|| {
                TransportError::new(TransportErrorKind::Unknown, "No response candidates returned")
            })?;

        let mut turn = ModelTurn::default();
        for part in content.parts {
            if let Some(text) = part.text {
                turn.text.push_str(&text);
            }
            if let Some(call) = part.function_call {
                turn.tool_calls.push(ToolInvocation {
                    name: call.name,
                    args: call.args,
                });
            }
        }

        Ok(turn)
    }
}

/// Where requests are sent
#[derive(Debug, Clone)]
enum Endpoint {
    /// Straight to the provider, authenticated with an API key
    Direct { base_url: String, api_key: String },
    /// Through a relay exposing `POST /generate`
    Relay { url: String },
}

/// Gemini API client
pub struct GeminiClient {
    /// HTTP client
    client: reqwest::Client,
    /// Request destination
    endpoint: Endpoint,
    /// Model name
    model: String,
    /// System instruction sent with every request
    system_instruction: Option<String>,
}

impl GeminiClient {
    /// Create a client that talks to the provider with `api_key`
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: Endpoint::Direct {
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                api_key: api_key.into(),
            },
            model: Self::default_model().to_string(),
            system_instruction: None,
        }
    }

    /// Create a client that posts to a relay; the relay owns the credential
    pub fn via_relay(relay_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: Endpoint::Relay {
                url: relay_url.into(),
            },
            model: Self::default_model().to_string(),
            system_instruction: None,
        }
    }

    /// Create a client from configuration, reading the API key from the
    /// configured environment variable unless a relay is set
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let client = match &config.transport.relay_url {
            Some(relay_url) => Self::via_relay(relay_url.clone()),
            None => {
                let api_key = std::env::var(&config.transport.api_key_env).map_err(|_| {
                    TransportError::new(
                        TransportErrorKind::InvalidCredential,
                        format!("{} is not set", config.transport.api_key_env),
                    )
                })?;
                Self::new(api_key).with_base_url(config.transport.base_url.clone())
            }
        };

        Ok(client
            .with_model(config.agent.model.clone())
            .with_system_instruction(config.agent.system_instruction.clone()))
    }

    /// Override the provider base URL (direct mode only)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        if let Endpoint::Direct { base_url, .. } = &mut self.endpoint {
            *base_url = url.into();
        }
        self
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the system instruction
    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction;
        self
    }

    /// The configured model
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the default model name
    pub fn default_model() -> &'static str {
        "gemini-2.5-flash"
    }

    fn request_builder(&self) -> reqwest::RequestBuilder {
        match &self.endpoint {
            Endpoint::Direct { base_url, api_key } => self
                .client
                .post(format!(
                    "{}/models/{}:generateContent",
                    base_url.trim_end_matches('/'),
                    self.model
                ))
                .header("x-goog-api-key", api_key),
            Endpoint::Relay { url } => self
                .client
                .post(format!("{}/generate", url.trim_end_matches('/'))),
        }
    }
}

#[async_trait]
impl ModelTransport for GeminiClient {
    async fn send_turn(
        &self,
        history: &ConversationHistory,
        schema: &ToolSchema,
    ) -> Result<ModelTurn, TransportError> {
        let request =
            GenerateContentRequest::build(history, schema, self.system_instruction.as_deref());

        tracing::debug!(
            "Sending {} contents to model '{}'",
            request.contents.len(),
            self.model
        );

        let response = self
            .request_builder()
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::classify(format!("HTTP {}: {}", status, body)));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            TransportError::new(
                TransportErrorKind::Unknown,
                format!("Malformed model response: {}", e),
            )
        })?;

        parsed.into_model_turn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolResult;

    const TEXT_RESPONSE: &str = r#"{
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "there"}]}
        }]
    }"#;

    const CALL_RESPONSE: &str = r#"{
        "candidates": [{
            "content": {"role": "model", "parts": [
                {"functionCall": {"name": "create_file", "args": {"path": "a.txt", "content": "hi"}}},
                {"functionCall": {"name": "list_files", "args": {}}}
            ]}
        }]
    }"#;

    fn sample_history() -> ConversationHistory {
        let call = ToolInvocation::new("read_file", serde_json::json!({"path": "a.txt"}));
        let listing = ToolInvocation::new("list_files", serde_json::json!({}));

        let mut history = ConversationHistory::new();
        history.push_user("What is in a.txt?");
        history.push_model("", vec![call.clone(), listing.clone()]);
        history.push_tool(&call, ToolResult::content("hello"));
        history.push_tool(&listing, ToolResult::files(vec!["a.txt".to_string()]));
        history.push_model("It says hello.", vec![]);
        history
    }

    #[test]
    fn test_classify_quota() {
        let err = TransportError::classify("HTTP 429 Too Many Requests: quota");
        assert_eq!(err.kind, TransportErrorKind::QuotaExceeded);

        let err = TransportError::classify("status: RESOURCE_EXHAUSTED");
        assert_eq!(err.kind, TransportErrorKind::QuotaExceeded);
        assert!(err.user_message().contains("quota"));
    }

    #[test]
    fn test_classify_credential() {
        let err = TransportError::classify("400: API key not valid. Please pass a valid API key.");
        assert_eq!(err.kind, TransportErrorKind::InvalidCredential);
        assert_eq!(
            err.user_message(),
            "The API key is not valid. Please check your configuration."
        );
    }

    #[test]
    fn test_classify_network_and_unknown() {
        assert_eq!(
            TransportError::classify("Failed to fetch").kind,
            TransportErrorKind::Network
        );
        let err = TransportError::classify("something odd happened");
        assert_eq!(err.kind, TransportErrorKind::Unknown);
        assert_eq!(err.message, "something odd happened");
    }

    #[test]
    fn test_build_request_groups_tool_results() {
        let request = GenerateContentRequest::build(
            &sample_history(),
            &ToolSchema::catalogue(),
            Some("Be helpful"),
        );
        let json = serde_json::to_value(&request).unwrap();

        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "What is in a.txt?");

        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"].as_array().unwrap().len(), 2);
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "read_file");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["args"]["path"], "a.txt");

        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["functionResponse"]["name"], "read_file");
        assert_eq!(contents[2]["parts"][0]["functionResponse"]["response"]["content"], "hello");
        assert_eq!(contents[2]["parts"][1]["functionResponse"]["name"], "list_files");

        assert_eq!(contents[3]["parts"][0]["text"], "It says hello.");

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be helpful");
        let declarations = json["tools"][0]["functionDeclarations"].as_array().unwrap();
        assert_eq!(declarations.len(), 5);
        assert_eq!(declarations[0]["name"], "list_files");
    }

    #[test]
    fn test_build_request_skips_empty_model_turn() {
        let mut history = ConversationHistory::new();
        history.push_user("hi");
        history.push_model("", vec![]);
        history.push_user("again");

        let request = GenerateContentRequest::build(&history, &ToolSchema::catalogue(), None);
        let json = serde_json::to_value(&request).unwrap();

        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["parts"][0]["text"], "hi");
        assert_eq!(contents[1]["parts"][0]["text"], "again");
        assert!(contents.iter().all(|content| content["role"] == "user"));
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_text_response() {
        let parsed: GenerateContentResponse = serde_json::from_str(TEXT_RESPONSE).unwrap();
        let turn = parsed.into_model_turn().unwrap();
        assert_eq!(turn.text, "Hello there");
        assert!(!turn.has_tool_calls());
    }

    #[test]
    fn test_parse_function_calls() {
        let parsed: GenerateContentResponse = serde_json::from_str(CALL_RESPONSE).unwrap();
        let turn = parsed.into_model_turn().unwrap();
        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.tool_calls[0].name, "create_file");
        assert_eq!(turn.tool_calls[0].str_arg("content"), Some("hi"));
        assert_eq!(turn.tool_calls[1].name, "list_files");
    }

    #[test]
    fn test_parse_empty_candidates() {
        let parsed: GenerateContentResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        let err = parsed.into_model_turn().unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_send_turn_direct() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "test_key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(CALL_RESPONSE)
            .create_async()
            .await;

        let client = GeminiClient::new("test_key").with_base_url(server.url());
        let turn = client
            .send_turn(&sample_history(), &ToolSchema::catalogue())
            .await
            .unwrap();

        assert_eq!(turn.tool_calls.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_turn_via_relay() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate")
            .with_status(200)
            .with_body(TEXT_RESPONSE)
            .create_async()
            .await;

        let client = GeminiClient::via_relay(server.url());
        let turn = client
            .send_turn(&sample_history(), &ToolSchema::catalogue())
            .await
            .unwrap();

        assert_eq!(turn.text, "Hello there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_turn_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .with_status(429)
            .with_body(r#"{"error": {"code": 429, "status": "RESOURCE_EXHAUSTED"}}"#)
            .create_async()
            .await;

        let client = GeminiClient::new("test_key").with_base_url(server.url());
        let err = client
            .send_turn(&sample_history(), &ToolSchema::catalogue())
            .await
            .unwrap_err();

        assert_eq!(err.kind, TransportErrorKind::QuotaExceeded);
    }

    #[tokio::test]
    async fn test_send_turn_invalid_key() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .with_status(400)
            .with_body(r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key."}}"#)
            .create_async()
            .await;

        let client = GeminiClient::new("bad_key").with_base_url(server.url());
        let err = client
            .send_turn(&sample_history(), &ToolSchema::catalogue())
            .await
            .unwrap_err();

        assert_eq!(err.kind, TransportErrorKind::InvalidCredential);
    }

    #[tokio::test]
    async fn test_relay_error_body_with_ok_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/generate")
            .with_status(200)
            .with_body(r#"{"error": {"code": 429, "status": "RESOURCE_EXHAUSTED", "message": "Quota exceeded"}}"#)
            .create_async()
            .await;

        let client = GeminiClient::via_relay(server.url());
        let err = client
            .send_turn(&sample_history(), &ToolSchema::catalogue())
            .await
            .unwrap_err();

        assert_eq!(err.kind, TransportErrorKind::QuotaExceeded);
    }

    #[test]
    fn test_from_config_with_relay() {
        let mut config = Config::default();
        config.transport.relay_url = Some("http://localhost:8787".to_string());
        config.agent.model = "gemini-2.5-pro".to_string();

        let client = GeminiClient::from_config(&config).unwrap();
        assert_eq!(client.model(), "gemini-2.5-pro");
        assert!(matches!(client.endpoint, Endpoint::Relay { .. }));
    }

    #[test]
    fn test_from_config_missing_key() {
        let mut config = Config::default();
        config.transport.api_key_env = "CANOPY_TEST_KEY_THAT_IS_NEVER_SET".to_string();

        let err = GeminiClient::from_config(&config).err().unwrap();
        assert_eq!(err.kind, TransportErrorKind::InvalidCredential);
    }
}

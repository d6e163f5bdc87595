//! Adapter around the hosted text-generation API.
//!
//! [`ModelClient`] is the seam between the chat/quiz components and the
//! network. It exposes exactly two capabilities: a lazy stream of reply
//! fragments for chat, and a single schema-constrained request for
//! structured objects. Neither retries; failures are returned to the caller.

use std::error::Error;
use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;
use tracing::debug;

use crate::api::{endpoint_url, ChatMessage, ChatRequest, CompletionResponse, ResponseFormat};
use crate::core::chat_stream::{format_api_error, sse_delta_stream};
use crate::core::config::Config;
use crate::core::structured::{validate_payload, StructuredRequest};

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "API_KEY";

/// Lazy, finite, single-pass sequence of reply fragments.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// No credential was available when the adapter was constructed.
    MissingCredential { variable: &'static str },

    /// Network, HTTP or API-reported failure.
    Transport(String),

    /// A structured reply that is not JSON or does not match its schema.
    Validation(String),
}

impl ModelError {
    pub fn transport(err: impl fmt::Display) -> Self {
        ModelError::Transport(err.to_string())
    }

    pub fn validation(err: impl fmt::Display) -> Self {
        ModelError::Validation(err.to_string())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ModelError::Validation(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::MissingCredential { .. } => "construction",
            ModelError::Transport(_) => "transport",
            ModelError::Validation(_) => "validation",
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::MissingCredential { variable } => write!(
                f,
                "No API key configured. Set the {variable} environment variable:\n   export {variable}=\"your-api-key-here\""
            ),
            ModelError::Transport(message) => write!(f, "{message}"),
            ModelError::Validation(message) => write!(f, "Invalid structured response: {message}"),
        }
    }
}

impl Error for ModelError {}

/// One chat turn: the session's replayed history plus the new user message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurnRequest {
    pub system_instruction: Option<String>,
    pub history: Vec<ChatMessage>,
    pub message: String,
}

impl ChatTurnRequest {
    pub fn into_messages(self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(instruction) = self.system_instruction {
            messages.push(ChatMessage::system(instruction));
        }
        messages.extend(self.history);
        messages.push(ChatMessage::user(self.message));
        messages
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Open a streaming chat call. Dropping the returned stream stops
    /// consumption; no server-side cancellation is attempted.
    async fn stream_chat(&self, request: ChatTurnRequest) -> Result<DeltaStream, ModelError>;

    /// Issue one schema-constrained request. The returned value has already
    /// been validated against `request.schema`.
    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value, ModelError>;
}

/// Explicit settings for [`HttpModelClient`].
#[derive(Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub quiz_model: String,
}

impl fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("quiz_model", &self.quiz_model)
            .finish()
    }
}

impl ModelSettings {
    /// Combine file/flag configuration with a credential obtained from
    /// `lookup`. A missing or blank credential is a construction error.
    pub fn resolve<F>(config: &Config, lookup: F) -> Result<Self, ModelError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_ENV)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ModelError::MissingCredential {
                variable: API_KEY_ENV,
            })?;

        Ok(Self {
            api_key,
            base_url: config.base_url().to_string(),
            chat_model: config.chat_model().to_string(),
            quiz_model: config.quiz_model().to_string(),
        })
    }

    pub fn from_env(config: &Config) -> Result<Self, ModelError> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }
}

/// [`ModelClient`] speaking the OpenAI-compatible `chat/completions` API.
pub struct HttpModelClient {
    client: reqwest::Client,
    settings: ModelSettings,
}

impl HttpModelClient {
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    pub fn from_env(config: &Config) -> Result<Self, ModelError> {
        ModelSettings::from_env(config).map(Self::new)
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    async fn post_completion(&self, request: &ChatRequest) -> Result<reqwest::Response, ModelError> {
        let url = endpoint_url(&self.settings.base_url, "chat/completions");
        debug!(%url, model = %request.model, stream = request.stream, "sending completion request");

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.settings.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| ModelError::Transport(format_api_error(&err.to_string())))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            debug!(%status, "completion request rejected");
            return Err(ModelError::Transport(format_api_error(&error_text)));
        }

        Ok(response)
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn stream_chat(&self, request: ChatTurnRequest) -> Result<DeltaStream, ModelError> {
        let body = ChatRequest {
            model: self.settings.chat_model.clone(),
            messages: request.into_messages(),
            stream: true,
            response_format: None,
        };

        let response = self.post_completion(&body).await?;
        Ok(sse_delta_stream(response.bytes_stream()))
    }

    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value, ModelError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(instruction) = &request.system_instruction {
            messages.push(ChatMessage::system(instruction.clone()));
        }
        messages.push(ChatMessage::user(request.prompt.clone()));

        let body = ChatRequest {
            model: self.settings.quiz_model.clone(),
            messages,
            stream: false,
            response_format: Some(ResponseFormat::json_schema(
                request.schema.name,
                request.schema.schema.clone(),
            )),
        };

        let response = self.post_completion(&body).await?;
        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|err| ModelError::Transport(format!("Malformed completion body: {err}")))?;
        let content = completion
            .first_content()
            .ok_or_else(|| ModelError::validation("reply has no content"))?;

        parse_structured_content(content, &request)
    }
}

/// Parse reply text as JSON and check it against the request's schema.
pub fn parse_structured_content(
    content: &str,
    request: &StructuredRequest,
) -> Result<Value, ModelError> {
    let value: Value = serde_json::from_str(content.trim())
        .map_err(|err| ModelError::validation(format!("reply is not JSON ({err})")))?;
    validate_payload(&request.schema, &value)?;
    Ok(value)
}

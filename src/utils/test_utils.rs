use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::Value;

use crate::core::announce::Announcer;
use crate::core::chat_session::ChatSession;
use crate::core::model_client::{ChatTurnRequest, DeltaStream, ModelClient, ModelError};
use crate::core::quiz::QuizEngine;
use crate::core::structured::{validate_payload, StructuredRequest};

/// Canned reply for one `stream_chat` call.
pub enum ScriptedStream {
    /// Items yielded back to back.
    Items(Vec<Result<String, ModelError>>),
    /// Fragments yielded after the given delay in milliseconds.
    Delayed(Vec<(u64, &'static str)>),
    /// `stream_chat` itself fails.
    OpenError(ModelError),
    /// A stream that never produces anything.
    Pending,
}

impl ScriptedStream {
    pub fn fragments(parts: &[&str]) -> Self {
        ScriptedStream::Items(parts.iter().map(|p| Ok(p.to_string())).collect())
    }
}

/// In-memory [`ModelClient`] replaying scripted replies and recording every
/// request it receives.
#[derive(Default)]
pub struct ScriptedModelClient {
    chat_replies: Mutex<VecDeque<ScriptedStream>>,
    structured_replies: Mutex<VecDeque<Result<Value, ModelError>>>,
    chat_requests: Mutex<Vec<ChatTurnRequest>>,
    structured_requests: Mutex<Vec<StructuredRequest>>,
}

impl ScriptedModelClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_stream(&self, reply: ScriptedStream) {
        self.chat_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_structured(&self, reply: Result<Value, ModelError>) {
        self.structured_replies.lock().unwrap().push_back(reply);
    }

    pub fn chat_requests(&self) -> Vec<ChatTurnRequest> {
        self.chat_requests.lock().unwrap().clone()
    }

    pub fn structured_requests(&self) -> Vec<StructuredRequest> {
        self.structured_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn stream_chat(&self, request: ChatTurnRequest) -> Result<DeltaStream, ModelError> {
        self.chat_requests.lock().unwrap().push(request);
        let reply = self
            .chat_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScriptedStream::Items(Vec::new()));

        let deltas: DeltaStream = match reply {
            ScriptedStream::Items(items) => Box::pin(stream::iter(items)),
            ScriptedStream::Delayed(parts) => {
                Box::pin(stream::iter(parts).then(|(delay_ms, text)| async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Ok::<_, ModelError>(text.to_string())
                }))
            }
            ScriptedStream::OpenError(err) => return Err(err),
            ScriptedStream::Pending => Box::pin(stream::pending::<Result<String, ModelError>>()),
        };
        Ok(deltas)
    }

    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value, ModelError> {
        let schema = request.schema.clone();
        self.structured_requests.lock().unwrap().push(request);
        let value = self
            .structured_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::transport("no scripted reply")))?;
        validate_payload(&schema, &value)?;
        Ok(value)
    }
}

/// [`Announcer`] that remembers what it was asked to say.
#[derive(Default)]
pub struct RecordingAnnouncer {
    spoken: Mutex<Vec<String>>,
}

impl RecordingAnnouncer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }
}

pub fn create_test_session(client: &Arc<ScriptedModelClient>) -> ChatSession {
    ChatSession::new(client.clone())
}

pub fn create_test_engine(
    client: &Arc<ScriptedModelClient>,
    announcer: &Arc<RecordingAnnouncer>,
) -> QuizEngine {
    QuizEngine::new(client.clone(), announcer.clone())
}

//! The tutoring conversation.
//!
//! A [`ChatSession`] owns the transcript of one conversation and the
//! lifecycle of its streaming replies. Sending a message appends the user
//! turn right away and starts a background stream; fragments come back over
//! a channel and are applied one at a time, in arrival order, to an active
//! response buffer. The buffer is committed to the transcript when the
//! stream ends or fails.
//!
//! Only one stream may be in flight. The busy flag is checked and set inside
//! the synchronous part of [`ChatSession::send_message`], so a second send
//! issued before the first reply finishes is rejected rather than queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ChatMessage;
use crate::core::chat_stream::{ChatStreamService, StreamMessage, StreamParams};
use crate::core::message::Message;
use crate::core::model_client::{ChatTurnRequest, ModelClient, ModelError};
use crate::core::policy::PromptPolicy;
use crate::core::strings;

static NEXT_CONVERSATION_ID: AtomicU64 = AtomicU64::new(1);

/// Conversation handle bound to a prompt policy. Holds the completed turns
/// that are replayed to the API with every new message.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: u64,
    policy: PromptPolicy,
    created_at: DateTime<Utc>,
    history: Vec<ChatMessage>,
}

impl Conversation {
    fn new(policy: PromptPolicy) -> Self {
        Self {
            id: NEXT_CONVERSATION_ID.fetch_add(1, Ordering::Relaxed),
            policy,
            created_at: Utc::now(),
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn policy(&self) -> &PromptPolicy {
        &self.policy
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn turn_request(&self, message: &str) -> ChatTurnRequest {
        ChatTurnRequest {
            system_instruction: Some(self.policy.system_instruction.to_string()),
            history: self.history.clone(),
            message: message.to_string(),
        }
    }

    fn record_turn(&mut self, prompt: String, reply: String) {
        self.history.push(ChatMessage::user(prompt));
        self.history.push(ChatMessage::assistant(reply));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    Empty,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Started { stream_id: u64 },
    Rejected(SendRejection),
}

impl SendOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, SendOutcome::Started { .. })
    }
}

/// What changed after a stream event was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatUpdate {
    Delta(String),
    Completed,
    Failed { fallback: String },
}

struct ActiveResponse {
    prompt: String,
    content: String,
}

pub struct ChatSession {
    client: Arc<dyn ModelClient>,
    policy: PromptPolicy,
    conversation: Option<Conversation>,
    messages: Vec<Message>,
    active: Option<ActiveResponse>,
    in_flight: bool,
    error: Option<String>,
    stream_service: ChatStreamService,
    stream_rx: mpsc::UnboundedReceiver<(StreamMessage, u64)>,
    stream_cancel_token: Option<CancellationToken>,
    current_stream_id: u64,
}

impl ChatSession {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self::with_policy(client, PromptPolicy::tutor())
    }

    pub fn with_policy(client: Arc<dyn ModelClient>, policy: PromptPolicy) -> Self {
        let (stream_service, stream_rx) = ChatStreamService::new();
        Self {
            client,
            policy,
            conversation: None,
            messages: Vec::new(),
            active: None,
            in_flight: false,
            error: None,
            stream_service,
            stream_rx,
            stream_cancel_token: None,
            current_stream_id: 0,
        }
    }

    /// Return the conversation, creating it on first use.
    pub fn create_or_reuse_session(&mut self) -> &Conversation {
        let policy = &self.policy;
        self.conversation.get_or_insert_with(|| {
            let conversation = Conversation::new(policy.clone());
            debug!(conversation_id = conversation.id, policy = policy.name, "conversation created");
            conversation
        })
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    /// Committed messages, excluding the reply currently streaming.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Text received so far for the reply currently streaming.
    pub fn active_response(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.content.as_str())
    }

    /// Everything the view should show: committed messages followed by the
    /// in-progress reply, if any.
    pub fn transcript(&self) -> Vec<Message> {
        let mut transcript = self.messages.clone();
        if let Some(active) = &self.active {
            transcript.push(Message::assistant(active.content.clone()));
        }
        transcript
    }

    pub fn is_streaming(&self) -> bool {
        self.in_flight
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Start sending `text`. Must be called from within a tokio runtime.
    pub fn send_message(&mut self, text: &str) -> SendOutcome {
        if self.in_flight {
            debug!("send rejected: a reply is still streaming");
            return SendOutcome::Rejected(SendRejection::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Rejected(SendRejection::Empty);
        }

        self.in_flight = true;
        self.error = None;
        self.messages.push(Message::user(text));
        self.active = Some(ActiveResponse {
            prompt: text.to_string(),
            content: String::new(),
        });

        let request = self.create_or_reuse_session().turn_request(text);
        let (cancel_token, stream_id) = self.start_new_stream();
        self.stream_service.spawn_stream(StreamParams {
            client: Arc::clone(&self.client),
            request,
            cancel_token,
            stream_id,
        });

        debug!(stream_id, "chat stream started");
        SendOutcome::Started { stream_id }
    }

    fn start_new_stream(&mut self) -> (CancellationToken, u64) {
        if let Some(token) = self.stream_cancel_token.take() {
            token.cancel();
        }
        let token = CancellationToken::new();
        self.stream_cancel_token = Some(token.clone());
        self.current_stream_id += 1;
        (token, self.current_stream_id)
    }

    pub fn is_current_stream(&self, stream_id: u64) -> bool {
        self.in_flight && self.current_stream_id == stream_id
    }

    /// Apply one stream event. Events from superseded streams are ignored.
    pub fn handle_stream_message(
        &mut self,
        message: StreamMessage,
        stream_id: u64,
    ) -> Option<ChatUpdate> {
        if !self.is_current_stream(stream_id) {
            debug!(stream_id, "ignoring event from stale stream");
            return None;
        }

        match message {
            StreamMessage::Chunk(text) => {
                let active = self.active.as_mut()?;
                active.content.push_str(&text);
                Some(ChatUpdate::Delta(text))
            }
            StreamMessage::Error(err) => Some(self.fail_stream(err)),
            StreamMessage::End => Some(self.finish_stream()),
        }
    }

    fn finish_stream(&mut self) -> ChatUpdate {
        self.in_flight = false;
        self.stream_cancel_token = None;

        if let Some(active) = self.active.take() {
            if let Some(conversation) = self.conversation.as_mut() {
                conversation.record_turn(active.prompt, active.content.clone());
            }
            self.messages.push(Message::assistant(active.content));
        }
        debug!(stream_id = self.current_stream_id, "chat stream finished");
        ChatUpdate::Completed
    }

    fn fail_stream(&mut self, err: ModelError) -> ChatUpdate {
        self.in_flight = false;
        self.stream_cancel_token = None;
        warn!(kind = err.kind(), "chat stream failed: {err}");

        if let Some(active) = self.active.take() {
            if !active.content.is_empty() {
                self.messages.push(Message::assistant(active.content));
            }
        }

        let error_text = err.to_string();
        let fallback = strings::chat_failure(&error_text);
        self.messages.push(Message::assistant(fallback.clone()));
        self.error = Some(error_text);
        ChatUpdate::Failed { fallback }
    }

    /// Apply stream events until the current reply completes or fails,
    /// calling `on_update` after each one.
    pub async fn wait_for_response<F>(&mut self, mut on_update: F)
    where
        F: FnMut(&ChatUpdate, &ChatSession),
    {
        while self.in_flight {
            let Some((message, stream_id)) = self.stream_rx.recv().await else {
                break;
            };
            if let Some(update) = self.handle_stream_message(message, stream_id) {
                on_update(&update, self);
            }
        }
    }

    /// Cancel any stream, drop the conversation and clear the transcript.
    pub fn reset(&mut self) {
        if let Some(token) = self.stream_cancel_token.take() {
            token.cancel();
        }
        if let Some(conversation) = self.conversation.take() {
            debug!(conversation_id = conversation.id, "conversation reset");
        }
        self.messages.clear();
        self.active = None;
        self.in_flight = false;
        self.error = None;
    }

    #[cfg(test)]
    pub(crate) fn stream_service(&self) -> &ChatStreamService {
        &self.stream_service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;
    use crate::utils::test_utils::{create_test_session, ScriptedModelClient, ScriptedStream};

    async fn run(session: &mut ChatSession) -> Vec<ChatUpdate> {
        let mut updates = Vec::new();
        session
            .wait_for_response(|update, _| updates.push(update.clone()))
            .await;
        updates
    }

    #[test]
    fn create_or_reuse_session_is_idempotent() {
        let client = ScriptedModelClient::new();
        let mut session = create_test_session(&client);
        assert!(session.conversation().is_none());

        let first = session.create_or_reuse_session().id();
        let second = session.create_or_reuse_session().id();

        assert_eq!(first, second);
        assert_eq!(
            session.conversation().unwrap().policy(),
            &PromptPolicy::tutor()
        );
    }

    #[tokio::test]
    async fn streamed_fragments_are_concatenated_in_order() {
        let client = ScriptedModelClient::new();
        client.push_stream(ScriptedStream::fragments(&["Biến ", "là ", "một ", "cái hộp."]));
        let mut session = create_test_session(&client);

        assert!(session.send_message("Biến là gì?").is_started());
        let updates = run(&mut session).await;

        assert_eq!(
            updates,
            vec![
                ChatUpdate::Delta("Biến ".into()),
                ChatUpdate::Delta("là ".into()),
                ChatUpdate::Delta("một ".into()),
                ChatUpdate::Delta("cái hộp.".into()),
                ChatUpdate::Completed,
            ]
        );
        assert_eq!(
            session.messages(),
            &[Message::user("Biến là gì?"), Message::assistant("Biến là một cái hộp.")]
        );
        assert!(!session.is_streaming());
        assert!(session.active_response().is_none());
    }

    #[tokio::test]
    async fn uneven_fragment_timing_does_not_reorder_content() {
        let client = ScriptedModelClient::new();
        client.push_stream(ScriptedStream::Delayed(vec![
            (30, "một"),
            (0, "-hai"),
            (15, "-ba"),
            (1, "-bốn"),
        ]));
        let mut session = create_test_session(&client);

        session.send_message("đếm đi");
        run(&mut session).await;

        assert_eq!(session.messages()[1].content, "một-hai-ba-bốn");
    }

    #[tokio::test]
    async fn partial_output_is_visible_before_completion() {
        let client = ScriptedModelClient::new();
        client.push_stream(ScriptedStream::fragments(&["Xin ", "chào"]));
        let mut session = create_test_session(&client);

        session.send_message("hi");
        let placeholder = session.transcript();
        assert_eq!(placeholder.len(), 2);
        assert_eq!(placeholder[1], Message::assistant(""));

        let mut seen = Vec::new();
        session
            .wait_for_response(|update, session| {
                if matches!(update, ChatUpdate::Delta(_)) {
                    seen.push(session.transcript().last().unwrap().content.clone());
                }
            })
            .await;

        assert_eq!(seen, vec!["Xin ".to_string(), "Xin chào".to_string()]);
    }

    #[tokio::test]
    async fn second_send_while_streaming_is_a_no_op() {
        let client = ScriptedModelClient::new();
        client.push_stream(ScriptedStream::Pending);
        let mut session = create_test_session(&client);

        assert!(session.send_message("câu hỏi 1").is_started());
        let before = session.transcript().len();

        let outcome = session.send_message("câu hỏi 2");

        assert_eq!(outcome, SendOutcome::Rejected(SendRejection::Busy));
        assert_eq!(session.transcript().len(), before);
        assert!(session.is_streaming());
    }

    #[tokio::test]
    async fn blank_messages_are_rejected_and_text_is_trimmed() {
        let client = ScriptedModelClient::new();
        client.push_stream(ScriptedStream::fragments(&["ok"]));
        let mut session = create_test_session(&client);

        assert_eq!(
            session.send_message("   \n\t"),
            SendOutcome::Rejected(SendRejection::Empty)
        );
        assert!(session.transcript().is_empty());
        assert!(session.conversation().is_none());

        session.send_message("  print(x)  \n");
        run(&mut session).await;
        assert_eq!(session.messages()[0], Message::user("print(x)"));
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_partial_content_and_appends_fallback() {
        let client = ScriptedModelClient::new();
        client.push_stream(ScriptedStream::Items(vec![
            Ok("Một phần".to_string()),
            Err(ModelError::Transport("connection reset".to_string())),
        ]));
        let mut session = create_test_session(&client);

        session.send_message("giải thích vòng lặp for");
        let updates = run(&mut session).await;

        assert!(matches!(updates.last(), Some(ChatUpdate::Failed { .. })));
        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::assistant("Một phần"));
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, strings::chat_failure("connection reset"));
        assert_eq!(session.error(), Some("connection reset"));
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn failure_to_open_stream_appends_only_fallback() {
        let client = ScriptedModelClient::new();
        client.push_stream(ScriptedStream::OpenError(ModelError::Transport(
            "API Error: quota".to_string(),
        )));
        let mut session = create_test_session(&client);

        session.send_message("hello");
        run(&mut session).await;

        assert_eq!(
            session.messages(),
            &[
                Message::user("hello"),
                Message::assistant(strings::chat_failure("API Error: quota")),
            ]
        );
    }

    #[tokio::test]
    async fn session_recovers_after_failure_and_clears_error() {
        let client = ScriptedModelClient::new();
        client.push_stream(ScriptedStream::OpenError(ModelError::transport("down")));
        client.push_stream(ScriptedStream::fragments(&["up again"]));
        let mut session = create_test_session(&client);

        session.send_message("one");
        run(&mut session).await;
        assert!(session.error().is_some());

        assert!(session.send_message("two").is_started());
        assert!(session.error().is_none());
        run(&mut session).await;
        assert_eq!(session.messages().last().unwrap().content, "up again");
    }

    #[tokio::test]
    async fn completed_turns_are_replayed_and_failed_turns_are_not() {
        let client = ScriptedModelClient::new();
        client.push_stream(ScriptedStream::fragments(&["trả lời 1"]));
        client.push_stream(ScriptedStream::OpenError(ModelError::transport("boom")));
        client.push_stream(ScriptedStream::fragments(&["trả lời 3"]));
        let mut session = create_test_session(&client);

        for text in ["hỏi 1", "hỏi 2", "hỏi 3"] {
            session.send_message(text);
            run(&mut session).await;
        }

        let requests = client.chat_requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].history.is_empty());
        assert_eq!(
            requests[0].system_instruction.as_deref(),
            Some(PromptPolicy::tutor().system_instruction)
        );
        assert_eq!(
            requests[2].history,
            vec![ChatMessage::user("hỏi 1"), ChatMessage::assistant("trả lời 1")]
        );
        assert_eq!(requests[2].message, "hỏi 3");
    }

    #[tokio::test]
    async fn events_from_stale_streams_are_ignored() {
        let client = ScriptedModelClient::new();
        client.push_stream(ScriptedStream::Pending);
        let mut session = create_test_session(&client);

        let SendOutcome::Started { stream_id } = session.send_message("hello") else {
            panic!("send should start");
        };

        assert!(session
            .handle_stream_message(StreamMessage::Chunk("old".into()), stream_id + 7)
            .is_none());
        assert_eq!(session.active_response(), Some(""));

        session.reset();
        assert!(session
            .handle_stream_message(StreamMessage::Chunk("late".into()), stream_id)
            .is_none());
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn reset_drops_conversation_and_allows_new_send() {
        let client = ScriptedModelClient::new();
        client.push_stream(ScriptedStream::Pending);
        client.push_stream(ScriptedStream::fragments(&["mới"]));
        let mut session = create_test_session(&client);

        session.send_message("cũ");
        let old_id = session.conversation().unwrap().id();
        session.reset();

        assert!(session.conversation().is_none());
        assert!(!session.is_streaming());

        let SendOutcome::Started { stream_id } = session.send_message("mới nhé") else {
            panic!("send should start after reset");
        };
        // A straggler from the cancelled stream must not leak into the new reply.
        session
            .stream_service()
            .send_for_test(StreamMessage::Chunk("stale".into()), stream_id - 1);
        run(&mut session).await;

        assert_ne!(session.conversation().unwrap().id(), old_id);
        assert_eq!(
            session.messages(),
            &[Message::user("mới nhé"), Message::assistant("mới")]
        );
    }
}

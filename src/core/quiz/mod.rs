//! The fishing quiz.
//!
//! [`QuizEngine`] is a four-phase state machine:
//!
//! ```text
//! LoadingQuestion -> AwaitingAnswer -> Evaluating -> ShowingFeedback
//!        ^                                                  |
//!        +--------------------------------------------------+
//! ```
//!
//! Transitions are synchronous. Each transition that needs the model returns
//! a [`QuizCommand`]; [`execute`] performs it and the resulting
//! [`QuizOutcome`] is folded back with [`QuizEngine::apply`]. Outcomes whose
//! request id is no longer the one the engine is waiting for are dropped, so
//! a reset while a call is in flight cannot corrupt the new game.

mod question;


use std::sync::Arc;

use tracing::{debug, warn};

pub use question::{AnswerInput, Evaluation, InvalidQuestion, Question, QuestionKind, SubmitRejected};

use crate::core::announce::Announcer;
use crate::core::model_client::{ModelClient, ModelError};
use crate::core::strings;
use crate::core::structured::{self, evaluation_request, question_request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    LoadingQuestion,
    AwaitingAnswer,
    Evaluating,
    ShowingFeedback,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameState {
    pub score: u32,
    pub current_question: Option<Question>,
    pub pending_answer: Option<String>,
    pub feedback: Option<Evaluation>,
    pub loading: bool,
    pub error: Option<String>,
}

/// A remote call the engine is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizCommand {
    FetchQuestion {
        request_id: u64,
    },
    Evaluate {
        request_id: u64,
        question: String,
        answer: String,
    },
}

impl QuizCommand {
    pub fn request_id(&self) -> u64 {
        match self {
            QuizCommand::FetchQuestion { request_id } => *request_id,
            QuizCommand::Evaluate { request_id, .. } => *request_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizOutcome {
    Question {
        request_id: u64,
        result: Result<Question, ModelError>,
    },
    Evaluation {
        request_id: u64,
        result: Result<Evaluation, ModelError>,
    },
}

impl QuizOutcome {
    pub fn request_id(&self) -> u64 {
        match self {
            QuizOutcome::Question { request_id, .. } => *request_id,
            QuizOutcome::Evaluation { request_id, .. } => *request_id,
        }
    }
}

/// Perform the structured call a command describes.
pub async fn execute(client: &dyn ModelClient, command: &QuizCommand) -> QuizOutcome {
    match command {
        QuizCommand::FetchQuestion { request_id } => QuizOutcome::Question {
            request_id: *request_id,
            result: structured::generate(client, question_request()).await,
        },
        QuizCommand::Evaluate {
            request_id,
            question,
            answer,
        } => QuizOutcome::Evaluation {
            request_id: *request_id,
            result: structured::generate(client, evaluation_request(question, answer)).await,
        },
    }
}

pub struct QuizEngine {
    client: Arc<dyn ModelClient>,
    announcer: Arc<dyn Announcer>,
    phase: QuizPhase,
    state: GameState,
    next_request_id: u64,
    awaiting: Option<u64>,
}

impl QuizEngine {
    pub fn new(client: Arc<dyn ModelClient>, announcer: Arc<dyn Announcer>) -> Self {
        Self {
            client,
            announcer,
            phase: QuizPhase::LoadingQuestion,
            state: GameState::default(),
            next_request_id: 1,
            awaiting: None,
        }
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Begin a fresh game and return the first fetch.
    pub fn start(&mut self) -> QuizCommand {
        self.reset();
        self.issue_fetch()
    }

    /// Back to a blank game. Any outstanding call is abandoned.
    pub fn reset(&mut self) {
        if let Some(request_id) = self.awaiting.take() {
            debug!(request_id, "abandoning outstanding quiz request");
        }
        self.phase = QuizPhase::LoadingQuestion;
        self.state = GameState::default();
    }

    /// Fetch a question. Only valid while loading; calling it again retries.
    pub fn request_question(&mut self) -> Option<QuizCommand> {
        if self.phase != QuizPhase::LoadingQuestion {
            return None;
        }
        Some(self.issue_fetch())
    }

    fn issue_fetch(&mut self) -> QuizCommand {
        self.state.loading = true;
        self.state.error = None;
        QuizCommand::FetchQuestion {
            request_id: self.next_id(),
        }
    }

    fn next_id(&mut self) -> u64 {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.awaiting = Some(request_id);
        request_id
    }

    pub fn submit_answer(&mut self, candidate: &str) -> Result<QuizCommand, SubmitRejected> {
        if self.phase != QuizPhase::AwaitingAnswer {
            return Err(SubmitRejected::NotAwaitingAnswer);
        }
        let Some(question) = self.state.current_question.as_ref() else {
            return Err(SubmitRejected::NotAwaitingAnswer);
        };
        let answer = question.accepts(candidate)?;
        let prompt = question.prompt.clone();

        self.phase = QuizPhase::Evaluating;
        self.state.pending_answer = Some(answer.clone());
        self.state.loading = true;
        self.state.error = None;

        Ok(QuizCommand::Evaluate {
            request_id: self.next_id(),
            question: prompt,
            answer,
        })
    }

    /// Leave the feedback screen and fetch the next question.
    pub fn advance(&mut self) -> Option<QuizCommand> {
        if self.phase != QuizPhase::ShowingFeedback {
            return None;
        }
        self.state.feedback = None;
        self.state.pending_answer = None;
        self.state.current_question = None;
        self.phase = QuizPhase::LoadingQuestion;
        Some(self.issue_fetch())
    }

    /// Repeat whatever failed last: the question fetch, or the evaluation of
    /// the answer that is still pending.
    pub fn retry(&mut self) -> Option<QuizCommand> {
        self.state.error.as_ref()?;
        match self.phase {
            QuizPhase::LoadingQuestion => self.request_question(),
            QuizPhase::AwaitingAnswer => {
                let answer = self.state.pending_answer.clone()?;
                self.submit_answer(&answer).ok()
            }
            QuizPhase::Evaluating | QuizPhase::ShowingFeedback => None,
        }
    }

    /// Fold a finished call back into the game. Returns `false` when the
    /// outcome belongs to a superseded request and was ignored.
    pub fn apply(&mut self, outcome: QuizOutcome) -> bool {
        let request_id = outcome.request_id();
        if self.awaiting != Some(request_id) {
            debug!(request_id, "ignoring stale quiz outcome");
            return false;
        }
        self.awaiting = None;
        self.state.loading = false;

        match outcome {
            QuizOutcome::Question { result, .. } => self.apply_question(result),
            QuizOutcome::Evaluation { result, .. } => self.apply_evaluation(result),
        }
        true
    }

    fn apply_question(&mut self, result: Result<Question, ModelError>) {
        match result {
            Ok(question) => {
                debug!(kind = question.kind.as_str(), "question loaded");
                self.state.current_question = Some(question);
                self.phase = QuizPhase::AwaitingAnswer;
            }
            Err(err) => {
                warn!(kind = err.kind(), "question request failed: {err}");
                self.state.error = Some(strings::question_failure(&err.to_string()));
            }
        }
    }

    fn apply_evaluation(&mut self, result: Result<Evaluation, ModelError>) {
        match result {
            Ok(evaluation) => {
                let cue = if evaluation.is_correct {
                    self.state.score += 1;
                    strings::PRAISE_CUE
                } else {
                    self.state.score = 0;
                    strings::CONSOLATION_CUE
                };
                debug!(
                    correct = evaluation.is_correct,
                    score = self.state.score,
                    "answer evaluated"
                );
                self.state.feedback = Some(evaluation);
                self.phase = QuizPhase::ShowingFeedback;
                self.announcer.announce(cue);
            }
            Err(err) => {
                warn!(kind = err.kind(), "evaluation request failed: {err}");
                self.state.error = Some(strings::evaluation_failure(&err.to_string()));
                self.phase = QuizPhase::AwaitingAnswer;
            }
        }
    }

    /// Execute `command` against this engine's client and apply the result.
    pub async fn run(&mut self, command: QuizCommand) -> bool {
        let client = Arc::clone(&self.client);
        let outcome = execute(client.as_ref(), &command).await;
        self.apply(outcome)
    }
}

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::strings::{FALSE_LABEL, TRUE_LABEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Mcq,
    TrueFalse,
    FillInTheBlank,
    Flashcard,
}

impl QuestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::Mcq => "mcq",
            QuestionKind::TrueFalse => "true_false",
            QuestionKind::FillInTheBlank => "fill_in_the_blank",
            QuestionKind::Flashcard => "flashcard",
        }
    }
}

/// A generated quiz question. `options` is non-empty exactly when the kind
/// is [`QuestionKind::Mcq`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "QuestionPayload")]
pub struct Question {
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: String,
}

/// Wire shape of a question as the model returns it.
#[derive(Deserialize)]
struct QuestionPayload {
    #[serde(rename = "type")]
    kind: QuestionKind,
    question: String,
    #[serde(default)]
    options: Vec<String>,
    answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidQuestion(String);

impl fmt::Display for InvalidQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for InvalidQuestion {}

impl TryFrom<QuestionPayload> for Question {
    type Error = InvalidQuestion;

    fn try_from(payload: QuestionPayload) -> Result<Self, Self::Error> {
        let options = match payload.kind {
            QuestionKind::Mcq => {
                if payload.options.is_empty() {
                    return Err(InvalidQuestion(
                        "mcq question arrived without options".to_string(),
                    ));
                }
                payload.options
            }
            _ => Vec::new(),
        };

        Ok(Question {
            kind: payload.kind,
            prompt: payload.question,
            options,
            answer: payload.answer,
        })
    }
}

/// How the front-end should collect an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerInput {
    /// Exactly one of these strings.
    Choices(Vec<String>),
    /// Any non-blank text.
    FreeText,
}

/// Why a candidate answer was refused before evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitRejected {
    /// The engine is not waiting for an answer.
    NotAwaitingAnswer,
    /// The candidate is not one of the offered choices.
    NotAChoice(String),
    Blank,
}

impl fmt::Display for SubmitRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitRejected::NotAwaitingAnswer => write!(f, "no question is waiting for an answer"),
            SubmitRejected::NotAChoice(candidate) => {
                write!(f, "'{candidate}' is not one of the offered choices")
            }
            SubmitRejected::Blank => write!(f, "answer is empty"),
        }
    }
}

impl Error for SubmitRejected {}

impl Question {
    pub fn input_shape(&self) -> AnswerInput {
        match self.kind {
            QuestionKind::Mcq => AnswerInput::Choices(self.options.clone()),
            QuestionKind::TrueFalse => {
                AnswerInput::Choices(vec![TRUE_LABEL.to_string(), FALSE_LABEL.to_string()])
            }
            QuestionKind::FillInTheBlank | QuestionKind::Flashcard => AnswerInput::FreeText,
        }
    }

    /// Check a candidate against this question's answer contract and return
    /// the answer to submit.
    pub fn accepts(&self, candidate: &str) -> Result<String, SubmitRejected> {
        match self.input_shape() {
            AnswerInput::Choices(choices) => {
                let wanted = candidate.trim();
                choices
                    .into_iter()
                    .find(|choice| choice == candidate || choice.trim() == wanted)
                    .ok_or_else(|| SubmitRejected::NotAChoice(candidate.to_string()))
            }
            AnswerInput::FreeText => {
                let text = candidate.trim();
                if text.is_empty() {
                    Err(SubmitRejected::Blank)
                } else {
                    Ok(text.to_string())
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub is_correct: bool,
    pub explanation: String,
}

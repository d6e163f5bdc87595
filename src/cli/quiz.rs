//! Line-based quiz screen

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufRead, Lines};

use crate::cli::{parse_screen_command, prompt, ScreenCommand, ScreenExit};
use crate::core::quiz::{AnswerInput, QuizCommand, QuizEngine, QuizPhase, SubmitRejected};
use crate::core::strings;

/// Map a numbered pick onto its choice; anything else is passed through.
/// A line that spells out a choice wins over reading it as a position.
pub fn resolve_choice(line: &str, shape: &AnswerInput) -> String {
    if let AnswerInput::Choices(choices) = shape {
        if let Some(choice) = choices.iter().find(|choice| choice.trim() == line.trim()) {
            return choice.clone();
        }
        if let Ok(index) = line.trim().parse::<usize>() {
            if let Some(choice) = index.checked_sub(1).and_then(|i| choices.get(i)) {
                return choice.clone();
            }
        }
    }
    line.to_string()
}

pub async fn run_quiz<R, W>(
    engine: &mut QuizEngine,
    lines: &mut Lines<R>,
    out: &mut W,
) -> Result<ScreenExit, Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out)?;
    writeln!(out, "== {} ==", strings::MODE_QUIZ)?;
    writeln!(out, "({})", strings::SCREEN_COMMANDS)?;

    let first = engine.start();
    run_command(engine, first, out).await?;

    loop {
        write_screen(engine, out)?;
        prompt(out, strings::SUBMIT)?;

        let Some(line) = lines.next_line().await? else {
            engine.reset();
            return Ok(ScreenExit::Quit);
        };
        match parse_screen_command(&line) {
            Some(ScreenCommand::Quit) => {
                engine.reset();
                return Ok(ScreenExit::Quit);
            }
            Some(ScreenCommand::Back) => {
                engine.reset();
                return Ok(ScreenExit::Back);
            }
            Some(ScreenCommand::History) | None => {}
        }

        let command = match engine.phase() {
            QuizPhase::LoadingQuestion => engine.request_question(),
            QuizPhase::AwaitingAnswer if line.trim().is_empty() && engine.state().error.is_some() => {
                engine.retry()
            }
            QuizPhase::AwaitingAnswer => submit(engine, &line, out)?,
            QuizPhase::ShowingFeedback => engine.advance(),
            QuizPhase::Evaluating => None,
        };

        if let Some(command) = command {
            run_command(engine, command, out).await?;
        }
    }
}

fn submit<W: Write>(
    engine: &mut QuizEngine,
    line: &str,
    out: &mut W,
) -> Result<Option<QuizCommand>, io::Error> {
    let shape = match engine.state().current_question.as_ref() {
        Some(question) => question.input_shape(),
        None => return Ok(None),
    };

    match engine.submit_answer(&resolve_choice(line, &shape)) {
        Ok(command) => Ok(Some(command)),
        Err(SubmitRejected::NotAChoice(_)) => {
            writeln!(out, "{}", strings::NOT_A_CHOICE)?;
            Ok(None)
        }
        Err(_) => Ok(None),
    }
}

async fn run_command<W: Write>(
    engine: &mut QuizEngine,
    command: QuizCommand,
    out: &mut W,
) -> Result<(), io::Error> {
    let status = match command {
        QuizCommand::FetchQuestion { .. } => strings::LOADING_QUESTION,
        QuizCommand::Evaluate { .. } => strings::EVALUATING,
    };
    writeln!(out, "{status}")?;
    out.flush()?;
    engine.run(command).await;
    Ok(())
}

pub fn write_screen<W: Write>(engine: &QuizEngine, out: &mut W) -> Result<(), io::Error> {
    let state = engine.state();
    writeln!(out)?;
    writeln!(out, "🐟 {}: {}", strings::SCORE_LABEL, state.score)?;

    match engine.phase() {
        QuizPhase::LoadingQuestion | QuizPhase::Evaluating => {}
        QuizPhase::AwaitingAnswer => {
            if let Some(question) = &state.current_question {
                writeln!(out, "{}", strings::QUESTION_HEADING)?;
                writeln!(out, "{}", question.prompt)?;
                match question.input_shape() {
                    AnswerInput::Choices(choices) => {
                        for (index, choice) in choices.iter().enumerate() {
                            writeln!(out, "  {}. {choice}", index + 1)?;
                        }
                    }
                    AnswerInput::FreeText => writeln!(out, "{}", strings::ANSWER_INPUT_HINT)?,
                }
            }
        }
        QuizPhase::ShowingFeedback => {
            if let Some(feedback) = &state.feedback {
                let heading = if feedback.is_correct {
                    strings::CORRECT_HEADING
                } else {
                    strings::WRONG_HEADING
                };
                writeln!(out, "{heading}")?;
                writeln!(out, "{}", feedback.explanation)?;
            }
            if let Some(question) = &state.current_question {
                writeln!(out, "{} {}", strings::CORRECT_ANSWER_LABEL, question.answer)?;
            }
            writeln!(out, "[Enter] {}", strings::NEXT_QUESTION)?;
        }
    }

    if let Some(error) = &state.error {
        writeln!(out, "❌ {error}")?;
        writeln!(out, "{}", strings::RETRY_HINT)?;
    }
    Ok(())
}

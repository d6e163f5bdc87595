//! Line-based tutoring chat screen

use std::error::Error;
use std::io::{self, Write};

use chrono::{DateTime, Local};
use tokio::io::{AsyncBufRead, Lines};

use crate::cli::{parse_screen_command, prompt, ScreenCommand, ScreenExit};
use crate::core::chat_session::{ChatSession, ChatUpdate, SendOutcome};
use crate::core::content::{segment_content, ContentSegment};
use crate::core::message::Message;
use crate::core::strings;

pub async fn run_chat<R, W>(
    session: &mut ChatSession,
    lines: &mut Lines<R>,
    out: &mut W,
) -> Result<ScreenExit, Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out)?;
    writeln!(out, "== {} ==", strings::MODE_CHAT)?;
    writeln!(out, "{}", strings::CHAT_INPUT_HINT)?;
    writeln!(out, "({})", strings::CHAT_COMMANDS)?;

    loop {
        prompt(out, strings::YOU_LABEL)?;
        let Some(line) = lines.next_line().await? else {
            session.reset();
            return Ok(ScreenExit::Quit);
        };

        match parse_screen_command(&line) {
            Some(ScreenCommand::Quit) => {
                session.reset();
                return Ok(ScreenExit::Quit);
            }
            Some(ScreenCommand::Back) => {
                session.reset();
                return Ok(ScreenExit::Back);
            }
            Some(ScreenCommand::History) => {
                let started_at = session
                    .conversation()
                    .map(|conversation| conversation.created_at().with_timezone(&Local));
                write_history(out, started_at, &session.transcript())?;
                continue;
            }
            None => {}
        }

        if let SendOutcome::Started { .. } = session.send_message(&line) {
            write!(out, "{}: ", strings::APP_TITLE)?;
            out.flush()?;

            let mut written: Result<(), io::Error> = Ok(());
            session
                .wait_for_response(|update, _| {
                    if written.is_ok() {
                        written = write_update(out, update);
                    }
                })
                .await;
            written?;
        }
    }
}

fn write_update<W: Write>(out: &mut W, update: &ChatUpdate) -> Result<(), io::Error> {
    match update {
        ChatUpdate::Delta(text) => {
            write!(out, "{text}")?;
            out.flush()
        }
        ChatUpdate::Completed => writeln!(out),
        ChatUpdate::Failed { fallback } => {
            writeln!(out)?;
            writeln!(out, "⚠️  {fallback}")
        }
    }
}

/// Reprint the conversation with fenced code framed.
pub fn write_history<W: Write>(
    out: &mut W,
    started_at: Option<DateTime<Local>>,
    transcript: &[Message],
) -> Result<(), io::Error> {
    if let Some(started_at) = started_at {
        writeln!(out)?;
        writeln!(out, "({} {})", strings::HISTORY_STARTED, started_at.format("%H:%M"))?;
    }
    for message in transcript {
        let speaker = if message.is_user() {
            strings::YOU_LABEL
        } else {
            strings::APP_TITLE
        };
        writeln!(out)?;
        writeln!(out, "{speaker}:")?;

        for segment in segment_content(&message.content) {
            match segment {
                ContentSegment::Text(text) => writeln!(out, "{}", text.trim_end())?,
                ContentSegment::Code { language, code } => {
                    writeln!(out, "┌─ {}", language.as_deref().unwrap_or("code"))?;
                    for line in code.lines() {
                        writeln!(out, "│ {line}")?;
                    }
                    writeln!(out, "└─")?;
                }
            }
        }
    }
    Ok(())
}

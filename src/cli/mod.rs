//! Command-line interface parsing and handling
//!
//! This module parses arguments, wires the model client and announcer, and
//! runs the welcome menu and the two line-based screens.

pub mod chat;
pub mod quiz;

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info};

use crate::core::announce::{Announcer, CommandAnnouncer, LogAnnouncer};
use crate::core::chat_session::ChatSession;
use crate::core::config::Config;
use crate::core::model_client::{HttpModelClient, ModelClient};
use crate::core::quiz::QuizEngine;
use crate::core::strings;
use crate::utils::logging::init_tracing;

#[derive(Parser)]
#[command(name = "pybuddy")]
#[command(about = "An AI teaching assistant for students learning Python")]
#[command(
    long_about = "Python Buddy explains Python concepts, helps debug code, and runs a \
quiz game whose questions are generated and graded by a language model.\n\n\
Environment Variables:\n\
  API_KEY           API key for the model provider (required)\n\
  RUST_LOG          Log filter, e.g. pybuddy=debug\n\n\
Commands inside a screen:\n\
  /history          Reprint the conversation (chat only)\n\
  /back             Return to the menu\n\
  /quit             Exit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Model used by the tutoring chat
    #[arg(long, global = true, value_name = "MODEL")]
    pub chat_model: Option<String>,

    /// Model used for quiz questions and grading
    #[arg(long, global = true, value_name = "MODEL")]
    pub quiz_model: Option<String>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write diagnostic logs to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Log debug events from pybuddy
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Ask questions and debug code with the tutor
    Chat,
    /// Play the quiz game
    Quiz,
}

/// How a screen was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenExit {
    Back,
    Quit,
}

/// Meta commands available on every screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScreenCommand {
    Back,
    Quit,
    History,
}

pub(crate) fn parse_screen_command(line: &str) -> Option<ScreenCommand> {
    match line.trim() {
        "/back" => Some(ScreenCommand::Back),
        "/quit" | "/exit" => Some(ScreenCommand::Quit),
        "/history" => Some(ScreenCommand::History),
        _ => None,
    }
}

pub(crate) fn prompt<W: Write>(out: &mut W, label: &str) -> Result<(), io::Error> {
    write!(out, "{label}> ")?;
    out.flush()
}

pub fn load_config(args: &Args) -> Result<Config, Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    Ok(config.with_overrides(
        args.base_url.clone(),
        args.chat_model.clone(),
        args.quiz_model.clone(),
    ))
}

pub fn build_announcer(config: &Config) -> Arc<dyn Announcer> {
    match config
        .announce_command
        .as_deref()
        .and_then(CommandAnnouncer::from_argv)
    {
        Some(announcer) => {
            debug!(program = announcer.program(), "speaking cues with external command");
            Arc::new(announcer)
        }
        None => Arc::new(LogAnnouncer),
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    if let Err(err) = init_tracing(args.verbose, args.log.as_deref()) {
        eprintln!("⚠️  Could not start logging: {err}");
    }

    let config = load_config(&args)?;
    let client: Arc<dyn ModelClient> = match HttpModelClient::from_env(&config) {
        Ok(client) => {
            info!(settings = ?client.settings(), "model client ready");
            Arc::new(client)
        }
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    };
    let announcer = build_announcer(&config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = io::stdout();
    run_app(args.command, client, announcer, &mut lines, &mut out).await?;
    Ok(())
}

/// Run screens until the user quits. Without `first`, start at the menu.
pub async fn run_app<R, W>(
    first: Option<Commands>,
    client: Arc<dyn ModelClient>,
    announcer: Arc<dyn Announcer>,
    lines: &mut Lines<R>,
    out: &mut W,
) -> Result<(), Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut next = first;
    loop {
        let mode = match next.take() {
            Some(mode) => mode,
            None => match run_menu(lines, out).await? {
                Some(mode) => mode,
                None => return Ok(()),
            },
        };

        let exit = match mode {
            Commands::Chat => {
                let mut session = ChatSession::new(Arc::clone(&client));
                chat::run_chat(&mut session, lines, out).await?
            }
            Commands::Quiz => {
                let mut engine = QuizEngine::new(Arc::clone(&client), Arc::clone(&announcer));
                quiz::run_quiz(&mut engine, lines, out).await?
            }
        };

        if exit == ScreenExit::Quit {
            return Ok(());
        }
    }
}

/// Show the welcome menu. Returns `None` when the user quits.
async fn run_menu<R, W>(lines: &mut Lines<R>, out: &mut W) -> Result<Option<Commands>, Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out)?;
    writeln!(out, "🐍 {}", strings::APP_TITLE)?;
    writeln!(out, "{}", strings::APP_TAGLINE)?;
    writeln!(out, "  1. {}", strings::MODE_CHAT)?;
    writeln!(out, "  2. {}", strings::MODE_QUIZ)?;
    writeln!(out, "  /quit")?;

    loop {
        prompt(out, "1/2")?;
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        match line.trim() {
            "1" | "chat" => return Ok(Some(Commands::Chat)),
            "2" | "quiz" => return Ok(Some(Commands::Quiz)),
            _ if parse_screen_command(&line) == Some(ScreenCommand::Quit) => return Ok(None),
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests;

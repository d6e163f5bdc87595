//! Python Buddy is a terminal tutor for students learning Python.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the tutoring chat session, the quiz state machine, the
//!   model client adapter and the streaming plumbing between them.
//! - [`api`] defines the chat-completions payloads sent to and read from the
//!   model provider.
//! - [`cli`] parses arguments and runs the line-based chat and quiz screens.
//!
//! The binary (`src/main.rs`) routes straight into [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;

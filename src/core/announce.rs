//! Fire-and-forget text-to-speech.
//!
//! The quiz engine speaks a short cue after each evaluation. It never waits
//! for the announcement and never sees its failures.

use tracing::debug;

pub trait Announcer: Send + Sync {
    fn announce(&self, text: &str);
}

/// Announcer that only records the cue in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&self, text: &str) {
        debug!(cue = text, "announce");
    }
}

/// Speaks by launching an external program with the text as its last
/// argument, e.g. `espeak-ng -v vi <text>`.
#[derive(Debug, Clone)]
pub struct CommandAnnouncer {
    program: String,
    args: Vec<String>,
}

impl CommandAnnouncer {
    /// Build from a configured argv. Returns `None` for an empty command.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Announcer for CommandAnnouncer {
    fn announce(&self, text: &str) {
        let spawned = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();

        if let Err(err) = spawned {
            debug!(program = %self.program, "announcement failed: {err}");
        }
    }
}

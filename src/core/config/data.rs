use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_QUIZ_MODEL: &str = "gemini-2.5-flash";

/// Optional settings read from `config.toml`. The API key is never stored
/// here; it only comes from the environment.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of an OpenAI-compatible API
    pub base_url: Option<String>,
    /// Model used by the tutoring chat
    pub chat_model: Option<String>,
    /// Model used for quiz questions and answer evaluation
    pub quiz_model: Option<String>,
    /// Command that speaks its final argument aloud, e.g. `["espeak-ng", "-v", "vi"]`
    #[serde(default)]
    pub announce_command: Option<Vec<String>>,
}

impl Config {
    pub fn base_url(&self) -> &str {
        non_blank(self.base_url.as_deref()).unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn chat_model(&self) -> &str {
        non_blank(self.chat_model.as_deref()).unwrap_or(DEFAULT_CHAT_MODEL)
    }

    pub fn quiz_model(&self) -> &str {
        non_blank(self.quiz_model.as_deref()).unwrap_or(DEFAULT_QUIZ_MODEL)
    }

    /// Apply command-line overrides on top of file values.
    pub fn with_overrides(
        mut self,
        base_url: Option<String>,
        chat_model: Option<String>,
        quiz_model: Option<String>,
    ) -> Self {
        if base_url.is_some() {
            self.base_url = base_url;
        }
        if chat_model.is_some() {
            self.chat_model = chat_model;
        }
        if quiz_model.is_some() {
            self.quiz_model = quiz_model;
        }
        self
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Get a user-friendly display string for a path, using `~` for the home
/// directory on Unix-like systems.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

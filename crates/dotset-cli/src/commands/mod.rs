//! Command handlers grouped by concern.

pub(crate) mod maintenance;
pub(crate) mod settings;

use serde_json::Value;

/// Text to print and the exit code to return.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Outcome {
    pub(crate) text: Option<String>,
    pub(crate) exit_code: i32,
}

impl Outcome {
    pub(crate) const fn silent() -> Self {
        Self {
            text: None,
            exit_code: 0,
        }
    }

    pub(crate) fn printed(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            exit_code: 0,
        }
    }

    pub(crate) const fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }
}

/// Interpret a command-line value as JSON, falling back to a plain string.
pub(crate) fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

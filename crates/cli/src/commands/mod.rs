pub mod batch;
pub mod config;
pub mod doctor;
pub mod resolve;

use affilink_core::{Outcome, OutcomeKind};
use serde::Serialize;

pub const EXIT_OK: u8 = 0;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_FAILURE: u8 = 3;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

/// One resolved input, as printed by `resolve` and by each `batch` line.
#[derive(Debug, Serialize)]
pub(crate) struct ResolutionPayload<'a> {
    command: &'static str,
    status: &'static str,
    input: &'a str,
    outcome: &'static str,
    link: Option<&'a str>,
    error_class: Option<&'static str>,
    message: String,
}

impl<'a> ResolutionPayload<'a> {
    pub(crate) fn new(command: &'static str, input: &'a str, outcome: &'a Outcome) -> Self {
        let (status, message) = match outcome {
            Outcome::Success(_) => ("ok", "affiliate link generated".to_string()),
            Outcome::FallbackSuccess(_) => (
                "ok",
                "affiliate service unavailable; commission attribution is not guaranteed"
                    .to_string(),
            ),
            Outcome::Failure(error) => ("error", error.user_message().to_string()),
        };

        Self {
            command,
            status,
            input: input.trim(),
            outcome: outcome.kind().as_str(),
            link: outcome.link(),
            error_class: outcome.error().map(|error| error.error_class()),
            message,
        }
    }

    pub(crate) fn is_failure(&self) -> bool {
        self.outcome == OutcomeKind::Failure.as_str()
    }

    pub(crate) fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|error| serialization_failure(self.command, &error))
    }
}

impl CommandResult {
    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn config_failure(command: &str, error: impl std::fmt::Display) -> Self {
        Self::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload)
        .unwrap_or_else(|error| serialization_failure(&payload.command, &error))
}

fn serialization_failure(command: &str, error: &serde_json::Error) -> String {
    format!(
        "{{\"command\":\"{}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
        escape_json(command),
        escape_json(&error.to_string())
    )
}

pub(crate) fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

//! Response type for command execution results.

use std::time::Duration;

/// Output of one command sent to a device.
#[derive(Debug, Clone)]
pub struct Response {
    /// The command that was executed.
    pub command: String,

    /// The command output with the echo and trailing prompt removed.
    pub result: String,

    /// The prompt that was matched at the end.
    pub prompt: String,

    /// Time taken to execute the command.
    pub elapsed: Duration,

    /// The device's error line, if the output matched a failure pattern.
    pub failure_message: Option<String>,
}

impl Response {
    /// Create a new successful response.
    pub fn new(
        command: impl Into<String>,
        result: impl Into<String>,
        prompt: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            result: result.into(),
            prompt: prompt.into(),
            elapsed,
            failure_message: None,
        }
    }

    /// Mark the response as failed.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure_message = Some(message.into());
        self
    }

    /// Check if the response indicates success.
    pub fn is_success(&self) -> bool {
        self.failure_message.is_none()
    }

    /// True when the device printed nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.result.trim().is_empty()
    }

    /// Check if the result contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.result.contains(pattern)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.result)
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// Languages the execution path knows how to build and run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Java,
    Cpp,
    C,
    Rust,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Python,
        Language::JavaScript,
        Language::Java,
        Language::Cpp,
        Language::C,
        Language::Rust,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Rust => "rust",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "java" => Ok(Language::Java),
            "cpp" | "c++" | "cxx" => Ok(Language::Cpp),
            "c" => Ok(Language::C),
            "rust" | "rs" => Ok(Language::Rust),
            _ => Err(Error::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Code execution request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Language identifier as supplied by the caller; resolved against the
    /// profile registry, so unknown values are allowed here
    pub language: String,
    /// Source code to execute
    pub code: String,
    /// Data written to the program's stdin
    #[serde(default)]
    pub input: Option<String>,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
            input: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    UnsupportedLanguage,
    CompilationError,
    RuntimeError,
    Timeout,
    SystemError,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::UnsupportedLanguage => "unsupported_language",
            ExecutionStatus::CompilationError => "compilation_error",
            ExecutionStatus::RuntimeError => "runtime_error",
            ExecutionStatus::Timeout => "timeout",
            ExecutionStatus::SystemError => "system_error",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution result
///
/// Produced exactly once per request. `failure` holds the caller-facing
/// reason for every non-success status and is `None` on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Execution status
    pub status: ExecutionStatus,
    /// Program output (stdout); empty when compilation failed
    pub stdout: String,
    /// Program errors (stderr), or compiler diagnostics on a compile failure
    pub stderr: String,
    /// Exit code of the last process that ran, if it exited normally
    pub exit_code: Option<i32>,
    /// Wall-clock time from request receipt to result
    #[serde(with = "duration_serde")]
    pub execution_time: Duration,
    /// Whether stdout or stderr hit the capture limit
    pub truncated: bool,
    /// Why the request did not succeed
    pub failure: Option<String>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn timed_out(&self) -> bool {
        self.status == ExecutionStatus::Timeout
    }

    /// The error text shown to callers: empty on success, otherwise the
    /// failure reason.
    pub fn error_message(&self) -> &str {
        self.failure.as_deref().unwrap_or_default()
    }

    /// A result for a request that produced no process output
    pub fn failed(status: ExecutionStatus, failure: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            execution_time: Duration::ZERO,
            truncated: false,
            failure: Some(failure.into()),
        }
    }
}

/// Resource limits applied to every child process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum CPU time (seconds)
    pub cpu_time: u32,
    /// Maximum size of any file the child writes (bytes)
    pub file_size: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_time: 30,
            file_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

pub mod duration_serde {
    //! Durations on the wire are fractional seconds.

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

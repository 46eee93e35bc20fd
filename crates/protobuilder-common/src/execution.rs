use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the commands of a request are chained in the generated script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandChain {
    /// `a && b`: stop at the first failing command.
    #[default]
    StopOnFailure,
    /// `a; b`: run every command regardless of earlier failures.
    Sequential,
}

impl CommandChain {
    pub fn separator(self) -> &'static str {
        match self {
            CommandChain::StopOnFailure => " && ",
            CommandChain::Sequential => "; ",
        }
    }
}

/// Commands to run inside a container. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub commands: Vec<String>,
    pub workdir: String,
    /// Upper bound on dispatching the detached exec.
    pub timeout: Duration,
    pub chain: CommandChain,
}

impl ExecutionRequest {
    pub fn new(commands: Vec<String>, workdir: impl Into<String>) -> Self {
        Self {
            commands,
            workdir: workdir.into(),
            timeout: Duration::from_secs(180),
            chain: CommandChain::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_chain(mut self, chain: CommandChain) -> Self {
        self.chain = chain;
        self
    }

    /// Commands joined into one shell fragment, blanks dropped.
    pub fn joined(&self) -> String {
        self.commands
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(self.chain.separator())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failure,
    Timeout,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failure => write!(f, "failure"),
            ExecutionStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// Outcome of one [`ExecutionRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub log: String,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Output of an attached exec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stderr when present, stdout otherwise.
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// A container stopped running, as seen on the daemon event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitEvent {
    pub container_id: String,
    pub exit_code: Option<i64>,
}

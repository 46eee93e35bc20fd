//! Typed error hierarchy for the generation side of protobuilder.
//!
//! Four top-level enums cover the four subsystems:
//! - `LlmError`: chat-completion calls
//! - `OutputError`: parsing what the agents return
//! - `ProjectError`: writing a generated project to disk
//! - `PipelineError`: the idea-to-prototype pipeline
//!
//! Container failures stay `protobuilder_runtime::RuntimeError`.

use std::path::PathBuf;

use protobuilder_runtime::RuntimeError;
use thiserror::Error;

/// Errors from the chat-completion boundary.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not found: set the {var} environment variable")]
    MissingApiKey { var: String },

    #[error("Failed to reach the LLM endpoint: {0}")]
    Request(#[source] reqwest::Error),

    #[error("LLM endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode LLM response: {0}")]
    Decode(String),

    #[error("LLM response contained no message content")]
    EmptyResponse,
}

/// Errors from parsing agent output.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("No <developer_output> document found in the response")]
    MissingXml,

    #[error("Root element must be <developer_output>, found <{found}>")]
    WrongRoot { found: String },

    #[error("Malformed developer XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("Developer XML ends before </{open}> is closed (truncated output)")]
    Truncated { open: String },

    #[error("No JSON object found in planner response")]
    MissingJson,

    #[error("Invalid planner JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Planner returned no tasks")]
    EmptyPlan,
}

/// Errors from materializing a generated project.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create output directory {}: {source}", path.display())]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to write outside the project root: {path}")]
    UnsafePath { path: String },
}

/// Errors from the generation pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} agent failed: {source}")]
    Llm {
        stage: &'static str,
        #[source]
        source: LlmError,
    },

    #[error("Developer output for task '{task}' is malformed: {message}")]
    MalformedOutput { task: String, message: String },

    #[error("Generated project has no setup or run steps to execute")]
    NoRunSteps,

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_status_carries_code_and_body() {
        let err = LlmError::Status {
            status: 429,
            body: "rate limited".into(),
        };
        let text = err.to_string();
        assert!(text.contains("429"));
        assert!(text.contains("rate limited"));
    }

    #[test]
    fn missing_api_key_names_the_variable() {
        let err = LlmError::MissingApiKey {
            var: "OPENAI_API_KEY".into(),
        };
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn malformed_output_embeds_parser_message() {
        let parser = OutputError::Truncated {
            open: "content".into(),
        };
        let err = PipelineError::MalformedOutput {
            task: "backend".into(),
            message: parser.to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("backend"));
        assert!(text.contains(&parser.to_string()));
    }

    #[test]
    fn pipeline_error_converts_from_runtime_error() {
        let err: PipelineError = RuntimeError::EmptyCommand.into();
        assert!(matches!(err, PipelineError::Runtime(RuntimeError::EmptyCommand)));
    }

    #[test]
    fn llm_stage_is_reported() {
        let err = PipelineError::Llm {
            stage: "planner",
            source: LlmError::EmptyResponse,
        };
        assert!(err.to_string().starts_with("planner agent failed"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&LlmError::EmptyResponse);
        assert_std_error(&OutputError::EmptyPlan);
        assert_std_error(&ProjectError::UnsafePath { path: "../x".into() });
        assert_std_error(&PipelineError::NoRunSteps);
    }
}

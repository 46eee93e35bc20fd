//! Detached command dispatch.
//!
//! The runner composes one shell script per request, redirecting stdout and
//! stderr to files under the workdir, and hands it to the daemon as a
//! detached exec. It never learns the exit code: failures surface later
//! through the readiness poller or the run log.

use protobuilder_common::{ContainerEngine, ContainerHandle, ExecutionRequest};
use tracing::info;

use crate::error::RuntimeError;

pub struct CommandRunner {
    log_dir: String,
}

impl CommandRunner {
    pub fn new(log_dir: impl Into<String>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// `cd <workdir> && mkdir -p <logs> && ( <cmds> ) > <logs>/run.log 2> <logs>/run.err`
    pub fn compose_script(&self, request: &ExecutionRequest) -> Result<String, RuntimeError> {
        let joined = request.joined();
        if joined.is_empty() {
            return Err(RuntimeError::EmptyCommand);
        }
        let workdir = shell_words::quote(&request.workdir);
        let logs = shell_words::quote(&self.log_dir);
        Ok(format!(
            "cd {workdir} && mkdir -p {logs} && ( {joined} ) > {logs}/run.log 2> {logs}/run.err"
        ))
    }

    /// Dispatch the request and return the exec id without waiting.
    pub async fn dispatch<E: ContainerEngine + ?Sized>(
        &self,
        engine: &E,
        handle: &ContainerHandle,
        request: &ExecutionRequest,
    ) -> Result<String, RuntimeError> {
        let script = self.compose_script(request)?;
        info!(container = %handle.name, script = %script, "dispatching command");
        let exec_id = engine
            .exec_detached(
                &handle.id,
                vec!["sh".into(), "-c".into(), script],
                Some(&request.workdir),
            )
            .await?;
        Ok(exec_id)
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new("logs")
    }
}

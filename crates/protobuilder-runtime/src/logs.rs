use protobuilder_common::{ContainerEngine, ContainerHandle};
use tracing::debug;

use crate::error::RuntimeError;

/// Last `n` lines of `text`, in original order.
///
/// Matches `tail -n`: a trailing newline does not count as an extra empty
/// line, and the result keeps the newline of every returned line.
pub fn last_lines(text: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].concat()
}

/// Reads the run log written by the command runner.
pub struct LogFetcher {
    log_dir: String,
}

impl LogFetcher {
    pub fn new(log_dir: impl Into<String>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn log_path(&self, workdir: &str) -> String {
        format!("{}/{}/run.log", workdir.trim_end_matches('/'), self.log_dir)
    }

    /// Last `lines` lines of `<workdir>/<log_dir>/run.log`.
    pub async fn fetch<E: ContainerEngine + ?Sized>(
        &self,
        engine: &E,
        handle: &ContainerHandle,
        lines: usize,
    ) -> Result<String, RuntimeError> {
        let path = self.log_path(&handle.workdir);
        let script = format!("tail -n {} {}", lines, shell_words::quote(&path));
        debug!(container = %handle.name, path = %path, lines, "fetching log");

        let output = engine
            .exec(&handle.id, vec!["sh".into(), "-c".into(), script], None)
            .await
            .map_err(|e| RuntimeError::LogUnavailable(e.to_string()))?;
        if output.is_success() {
            Ok(output.stdout)
        } else {
            Err(RuntimeError::LogUnavailable(output.error_text().to_string()))
        }
    }
}

impl Default for LogFetcher {
    fn default() -> Self {
        Self::new("logs")
    }
}

//! In-memory `ContainerEngine` for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use protobuilder_common::{
    ContainerEngine, ContainerFilter, ContainerSpec, ContainerSummary, EngineError, ExecOutput,
    ExitEvent,
};
use tokio::sync::oneshot;

use crate::logs::last_lines;

#[derive(Default)]
pub(crate) struct FakeState {
    pub next_id: u32,
    pub created: Vec<ContainerSpec>,
    pub pulled: Vec<String>,
    /// Attached execs as `(container, cmd)`.
    pub execs: Vec<(String, Vec<String>)>,
    pub detached: Vec<(String, Vec<String>)>,
    /// `(container, dest, archive)`.
    pub uploads: Vec<(String, String, Vec<u8>)>,
    pub stopped: Vec<String>,
    pub removed: Vec<String>,

    pub fail_pull: bool,
    pub fail_stop: HashSet<String>,
    pub fail_remove: HashSet<String>,
    pub fail_upload: bool,
    pub probe_errors: bool,
    pub subscribe_fails: bool,
    pub drop_exit_senders: bool,

    /// Exit codes handed out to successive probes, then `probe_default`.
    pub probe_results: VecDeque<i64>,
    pub probe_default: i64,
    pub probe_count: u32,

    /// File contents visible to `tail -n`.
    pub files: HashMap<String, String>,
    /// Script prefix to exit code for other attached execs.
    pub exec_exit: HashMap<String, i64>,
    pub listing: Vec<ContainerSummary>,
    pub exit_senders: HashMap<String, oneshot::Sender<ExitEvent>>,
    pub detached_delay: Option<Duration>,
}

#[derive(Default)]
pub(crate) struct FakeEngine {
    state: Mutex<FakeState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Sorted top-level names of everything uploaded to `dest` in `id`.
    pub fn list_staged(&self, id: &str, dest: &str) -> Vec<String> {
        let state = self.state();
        let mut names: Vec<String> = state
            .uploads
            .iter()
            .filter(|(c, d, _)| c == id && d == dest)
            .flat_map(|(_, _, archive)| {
                tar::Archive::new(&archive[..])
                    .entries()
                    .unwrap()
                    .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
            })
            .filter_map(|p| p.split('/').next().map(str::to_string))
            .filter(|p| !p.is_empty())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn fire_exit(&self, id: &str, exit_code: Option<i64>) {
        if let Some(tx) = self.state().exit_senders.remove(id) {
            let _ = tx.send(ExitEvent {
                container_id: id.to_string(),
                exit_code,
            });
        }
    }

    fn tail(state: &FakeState, script: &str) -> ExecOutput {
        let words = shell_words::split(script).unwrap_or_default();
        let lines: usize = words.get(2).and_then(|n| n.parse().ok()).unwrap_or(10);
        let path = words.get(3).cloned().unwrap_or_default();
        match state.files.get(&path) {
            Some(content) => ExecOutput::success(last_lines(content, lines)),
            None => ExecOutput::failure(
                1,
                format!("tail: cannot open '{}' for reading: No such file or directory", path),
            ),
        }
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn ensure_image(&self, image: &str) -> Result<(), EngineError> {
        let mut state = self.state();
        if state.fail_pull {
            return Err(EngineError::daemon("pull image", format!("manifest for {} not found", image)));
        }
        state.pulled.push(image.to_string());
        Ok(())
    }

    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        let mut state = self.state();
        state.next_id += 1;
        state.created.push(spec.clone());
        Ok(format!("fake{:04}", state.next_id))
    }

    async fn exec(
        &self,
        id: &str,
        cmd: Vec<String>,
        _workdir: Option<&str>,
    ) -> Result<ExecOutput, EngineError> {
        let mut state = self.state();
        state.execs.push((id.to_string(), cmd.clone()));
        let script = cmd.last().cloned().unwrap_or_default();

        if script.starts_with("tail -n") {
            return Ok(Self::tail(&state, &script));
        }
        if script.contains("curl") {
            state.probe_count += 1;
            if state.probe_errors {
                return Err(EngineError::daemon("exec", "connection reset"));
            }
            let code = state
                .probe_results
                .pop_front()
                .unwrap_or(state.probe_default);
            return Ok(if code == 0 {
                ExecOutput::success("ok")
            } else {
                ExecOutput::failure(code, "curl: (7) Failed to connect")
            });
        }
        let code = state
            .exec_exit
            .iter()
            .find(|(prefix, _)| script.starts_with(prefix.as_str()))
            .map(|(_, code)| *code);
        Ok(match code {
            Some(code) if code != 0 => ExecOutput::failure(code, format!("{} failed", script)),
            _ => ExecOutput::success(""),
        })
    }

    async fn exec_detached(
        &self,
        id: &str,
        cmd: Vec<String>,
        _workdir: Option<&str>,
    ) -> Result<String, EngineError> {
        let (delay, count) = {
            let mut state = self.state();
            state.detached.push((id.to_string(), cmd));
            (state.detached_delay, state.detached.len())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(format!("exec{}", count))
    }

    async fn upload_archive(
        &self,
        id: &str,
        dest: &str,
        archive: Vec<u8>,
    ) -> Result<(), EngineError> {
        let mut state = self.state();
        if state.fail_upload {
            return Err(EngineError::daemon("upload archive", "no space left on device"));
        }
        state
            .uploads
            .push((id.to_string(), dest.to_string(), archive));
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<(), EngineError> {
        let mut state = self.state();
        if state.fail_stop.contains(id) {
            return Err(EngineError::daemon("stop container", "timeout"));
        }
        state.stopped.push(id.to_string());
        Ok(())
    }

    async fn remove(&self, id: &str, _force: bool) -> Result<(), EngineError> {
        let mut state = self.state();
        if state.fail_remove.contains(id) {
            return Err(EngineError::daemon("remove container", "removal in progress"));
        }
        state.removed.push(id.to_string());
        Ok(())
    }

    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        let state = self.state();
        Ok(state
            .listing
            .iter()
            .filter(|c| filter.all || c.state == "running")
            .filter(|c| filter.label.as_deref().is_none_or(|l| c.has_label(l)))
            .cloned()
            .collect())
    }

    async fn subscribe_exit(&self, id: &str) -> Result<oneshot::Receiver<ExitEvent>, EngineError> {
        let mut state = self.state();
        if state.subscribe_fails {
            return Err(EngineError::daemon("subscribe to events", "events endpoint unavailable"));
        }
        let (tx, rx) = oneshot::channel();
        if !state.drop_exit_senders {
            state.exit_senders.insert(id.to_string(), tx);
        }
        Ok(rx)
    }
}

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::container::{ContainerSpec, ContainerSummary};
use crate::error::EngineError;
use crate::execution::{ExecOutput, ExitEvent};

/// Which containers a listing returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    /// Include stopped containers.
    pub all: bool,
    /// Only containers carrying this label key.
    pub label: Option<String>,
}

impl ContainerFilter {
    pub fn running() -> Self {
        Self::default()
    }

    pub fn everything() -> Self {
        Self {
            all: true,
            label: None,
        }
    }
}

/// The container daemon operations the runtime relies on.
///
/// Real implementation: `DockerEngine` in `protobuilder-runtime`. Every method
/// maps to one daemon call (or one short sequence of them); no retries happen
/// at this layer.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Make `image` available locally, pulling it only when missing.
    async fn ensure_image(&self, image: &str) -> Result<(), EngineError>;

    /// Create and start a container. Returns the container id.
    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String, EngineError>;

    /// Run a command and wait for it, collecting output and exit code.
    async fn exec(
        &self,
        container_id: &str,
        cmd: Vec<String>,
        workdir: Option<&str>,
    ) -> Result<ExecOutput, EngineError>;

    /// Start a command without waiting for it. Returns the exec id.
    async fn exec_detached(
        &self,
        container_id: &str,
        cmd: Vec<String>,
        workdir: Option<&str>,
    ) -> Result<String, EngineError>;

    /// Extract a tar archive at `dest` inside the container.
    async fn upload_archive(
        &self,
        container_id: &str,
        dest: &str,
        archive: Vec<u8>,
    ) -> Result<(), EngineError>;

    async fn stop(&self, container_id: &str) -> Result<(), EngineError>;

    async fn remove(&self, container_id: &str, force: bool) -> Result<(), EngineError>;

    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerSummary>, EngineError>;

    /// Resolve once the container exits. The receiver errors if the event
    /// stream ends before that happens.
    async fn subscribe_exit(
        &self,
        container_id: &str,
    ) -> Result<oneshot::Receiver<ExitEvent>, EngineError>;
}

//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module      | Commands handled              |
//! |-------------|-------------------------------|
//! | `run`       | `Run`                         |
//! | `logs`      | `Logs`                        |
//! | `ps`        | `Ps`                          |
//! | `cleanup`   | `Cleanup`                     |
//! | `project`   | `Materialize`                 |
//! | `generate`  | `Generate`                    |
//! | `config`    | `Config`                      |

pub mod cleanup;
pub mod config;
pub mod generate;
pub mod logs;
pub mod project;
pub mod ps;
pub mod run;

use anyhow::{Context, Result};
use protobuilder_runtime::{ContainerRuntime, DockerEngine, RuntimeConfig};
use std::path::Path;
use std::sync::Arc;

pub use cleanup::cmd_cleanup;
pub use config::cmd_config;
pub use generate::cmd_generate;
pub use logs::cmd_logs;
pub use project::cmd_materialize;
pub use ps::cmd_ps;
pub use run::cmd_run;

/// Runtime over the local Docker daemon with the project's runtime config.
pub(crate) async fn docker_runtime(project_dir: &Path) -> Result<ContainerRuntime<DockerEngine>> {
    let config = RuntimeConfig::load(project_dir)?;
    let engine = DockerEngine::connect().context("Failed to connect to Docker")?;
    engine
        .ping()
        .await
        .context("Docker daemon is not responding. Is it running?")?;
    Ok(ContainerRuntime::new(Arc::new(engine), config))
}

//! Container execution lifecycle.
//!
//! | Module      | Role                                                        |
//! |-------------|-------------------------------------------------------------|
//! | `stager`    | Copy a local source tree into a container as a tar stream   |
//! | `runner`    | Dispatch a detached shell command with redirected logs      |
//! | `readiness` | Probe the container until its server answers                |
//! | `logs`      | Tail the run log inside the container                       |
//! | `registry`  | Track created containers and stop them in bulk              |
//! | `runtime`   | `ContainerRuntime`, the facade tying the pieces together    |
//! | `docker`    | `DockerEngine`, the bollard-backed `ContainerEngine`        |
//! | `config`    | `.protobuilder/runtime.toml`                                |

pub mod config;
pub mod docker;
pub mod error;
pub mod logs;
pub mod readiness;
pub mod registry;
pub mod runner;
pub mod runtime;
pub mod stager;

#[cfg(test)]
pub(crate) mod fake;

pub use config::{ProbeConfig, RuntimeConfig};
pub use docker::DockerEngine;
pub use error::RuntimeError;
pub use logs::{LogFetcher, last_lines};
pub use readiness::{Readiness, ReadinessPoller};
pub use registry::{ContainerRegistry, StopReport};
pub use runner::CommandRunner;
pub use runtime::{ContainerRuntime, RunOptions};
pub use stager::{CodeStager, build_archive};

pub use protobuilder_common as common;

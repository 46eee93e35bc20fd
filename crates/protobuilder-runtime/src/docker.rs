//! `ContainerEngine` over the local Docker daemon.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, EventsOptionsBuilder,
    ListContainersOptionsBuilder, RemoveContainerOptionsBuilder, StartContainerOptions,
    StopContainerOptionsBuilder, UploadToContainerOptionsBuilder,
};
use futures_util::StreamExt;
use protobuilder_common::image::split_image_tag;
use protobuilder_common::{
    ContainerEngine, ContainerFilter, ContainerSpec, ContainerSummary, EngineError, ExecOutput,
    ExitEvent,
};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Seconds the daemon waits for a graceful stop before killing.
const STOP_GRACE_SECS: i32 = 10;

fn engine_error(operation: &'static str, err: BollardError) -> EngineError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => EngineError::NotFound(message),
        other => EngineError::daemon(operation, other),
    }
}

/// Docker daemon client. Cheap to clone.
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using `DOCKER_HOST` or the platform's default socket.
    pub fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| engine_error("connect", e))?;
        Ok(Self { docker })
    }

    /// Verify the daemon answers.
    pub async fn ping(&self) -> Result<(), EngineError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| engine_error("ping", e))
    }

    async fn pull(&self, image: &str) -> Result<(), EngineError> {
        let (repo, tag) = split_image_tag(image);
        info!(image, "pulling image");
        let options = CreateImageOptionsBuilder::default()
            .from_image(repo)
            .tag(tag)
            .build();
        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(item) = progress.next().await {
            let info = item.map_err(|e| engine_error("pull image", e))?;
            if let Some(status) = info.status {
                debug!(image, %status, "pull progress");
            }
        }
        Ok(())
    }

    fn create_body(spec: &ContainerSpec) -> ContainerCreateBody {
        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
            .ports
            .iter()
            .map(|p| {
                (
                    format!("{}/tcp", p.container),
                    Some(vec![PortBinding {
                        host_ip: None,
                        host_port: Some(p.host.to_string()),
                    }]),
                )
            })
            .collect();
        let binds: Vec<String> = spec.volumes.iter().map(|v| v.to_bind_string()).collect();

        ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            working_dir: Some(spec.workdir.clone()),
            labels: Some(spec.labels.clone()),
            env: Some(spec.env_list()),
            host_config: Some(HostConfig {
                port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
                binds: (!binds.is_empty()).then_some(binds),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn create_exec(
        &self,
        container_id: &str,
        cmd: Vec<String>,
        workdir: Option<&str>,
        attach: bool,
    ) -> Result<String, EngineError> {
        let options = CreateExecOptions {
            cmd: Some(cmd),
            attach_stdout: Some(attach),
            attach_stderr: Some(attach),
            working_dir: workdir.map(str::to_string),
            ..Default::default()
        };
        let created = self
            .docker
            .create_exec(container_id, options)
            .await
            .map_err(|e| engine_error("create exec", e))?;
        Ok(created.id)
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ensure_image(&self, image: &str) -> Result<(), EngineError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => {
                debug!(image, "image present locally");
                Ok(())
            }
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => self.pull(image).await,
            Err(e) => Err(engine_error("inspect image", e)),
        }
    }

    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        let options = CreateContainerOptionsBuilder::default()
            .name(&spec.name)
            .build();
        let created = self
            .docker
            .create_container(Some(options), Self::create_body(spec))
            .await
            .map_err(|e| engine_error("create container", e))?;
        for warning in &created.warnings {
            warn!(container = %spec.name, %warning, "daemon warning");
        }

        self.docker
            .start_container(&created.id, None::<StartContainerOptions>)
            .await
            .map_err(|e| engine_error("start container", e))?;
        Ok(created.id)
    }

    async fn exec(
        &self,
        container_id: &str,
        cmd: Vec<String>,
        workdir: Option<&str>,
    ) -> Result<ExecOutput, EngineError> {
        let exec_id = self.create_exec(container_id, cmd, workdir, true).await?;
        let started = self
            .docker
            .start_exec(&exec_id, None::<StartExecOptions>)
            .await
            .map_err(|e| engine_error("start exec", e))?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let StartExecResults::Attached { mut output, .. } = started {
            while let Some(chunk) = output.next().await {
                match chunk.map_err(|e| engine_error("read exec output", e))? {
                    bollard::container::LogOutput::StdErr { message } => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    other => stdout.push_str(&String::from_utf8_lossy(&other.into_bytes())),
                }
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec_id)
            .await
            .map_err(|e| engine_error("inspect exec", e))?;
        Ok(ExecOutput {
            exit_code: inspect.exit_code.unwrap_or(-1),
            stdout,
            stderr,
        })
    }

    async fn exec_detached(
        &self,
        container_id: &str,
        cmd: Vec<String>,
        workdir: Option<&str>,
    ) -> Result<String, EngineError> {
        let exec_id = self.create_exec(container_id, cmd, workdir, false).await?;
        self.docker
            .start_exec(
                &exec_id,
                Some(StartExecOptions {
                    detach: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| engine_error("start exec", e))?;
        Ok(exec_id)
    }

    async fn upload_archive(
        &self,
        container_id: &str,
        dest: &str,
        archive: Vec<u8>,
    ) -> Result<(), EngineError> {
        let options = UploadToContainerOptionsBuilder::default().path(dest).build();
        self.docker
            .upload_to_container(container_id, Some(options), bollard::body_full(archive.into()))
            .await
            .map_err(|e| engine_error("upload archive", e))
    }

    async fn stop(&self, container_id: &str) -> Result<(), EngineError> {
        let options = StopContainerOptionsBuilder::default()
            .t(STOP_GRACE_SECS)
            .build();
        self.docker
            .stop_container(container_id, Some(options))
            .await
            .map_err(|e| engine_error("stop container", e))
    }

    async fn remove(&self, container_id: &str, force: bool) -> Result<(), EngineError> {
        let options = RemoveContainerOptionsBuilder::default().force(force).build();
        self.docker
            .remove_container(container_id, Some(options))
            .await
            .map_err(|e| engine_error("remove container", e))
    }

    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(label) = &filter.label {
            filters.insert("label".to_string(), vec![label.clone()]);
        }
        let options = ListContainersOptionsBuilder::default()
            .all(filter.all)
            .filters(&filters)
            .build();
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| engine_error("list containers", e))?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                name: c
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                state: c.state.map(|s| s.to_string()).unwrap_or_default(),
                labels: c.labels.unwrap_or_default(),
                host_ports: c
                    .ports
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|p| p.public_port.and_then(|port| u16::try_from(port).ok()))
                    .collect(),
            })
            .collect())
    }

    async fn subscribe_exit(
        &self,
        container_id: &str,
    ) -> Result<oneshot::Receiver<ExitEvent>, EngineError> {
        let filters: HashMap<String, Vec<String>> = HashMap::from([
            ("container".to_string(), vec![container_id.to_string()]),
            ("event".to_string(), vec!["die".to_string()]),
        ]);
        let options = EventsOptionsBuilder::default().filters(&filters).build();
        let docker = self.docker.clone();
        let id = container_id.to_string();
        let (mut tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut events = docker.events(Some(options));
            let wait_for_die = async {
                while let Some(event) = events.next().await {
                    match event {
                        Ok(message) => {
                            let exit_code = message
                                .actor
                                .and_then(|actor| actor.attributes)
                                .and_then(|attrs| attrs.get("exitCode").cloned())
                                .and_then(|code| code.parse::<i64>().ok());
                            return Some(exit_code);
                        }
                        Err(e) => {
                            warn!(container = %id, error = %e, "event stream failed");
                            return None;
                        }
                    }
                }
                None
            };

            let exit_code = tokio::select! {
                _ = tx.closed() => None,
                code = wait_for_die => code,
            };
            if let Some(exit_code) = exit_code {
                debug!(container = %id, ?exit_code, "container died");
                let _ = tx.send(ExitEvent {
                    container_id: id,
                    exit_code,
                });
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protobuilder_common::{PortMapping, VolumeBind};

    #[test]
    fn not_found_maps_to_not_found() {
        let err = engine_error(
            "inspect image",
            BollardError::DockerResponseServerError {
                status_code: 404,
                message: "No such image: nope:latest".into(),
            },
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn server_errors_keep_operation() {
        let err = engine_error(
            "start container",
            BollardError::DockerResponseServerError {
                status_code: 500,
                message: "port is already allocated".into(),
            },
        );
        assert!(!err.is_not_found());
        let text = err.to_string();
        assert!(text.contains("start container"), "{}", text);
        assert!(text.contains("port is already allocated"), "{}", text);
    }

    #[test]
    fn create_body_maps_ports_and_volumes() {
        let mut spec = ContainerSpec::new("web", "node:14-slim");
        spec.ports.push(PortMapping {
            host: 5000,
            container: 8080,
        });
        spec.volumes.push(VolumeBind {
            host_path: "/tmp/app".into(),
            container_path: "/workspace".into(),
            read_only: true,
        });
        spec.env.insert("NODE_ENV".into(), "development".into());

        let body = DockerEngine::create_body(&spec);

        assert_eq!(body.image.as_deref(), Some("node:14-slim"));
        assert_eq!(body.working_dir.as_deref(), Some("/workspace"));
        assert_eq!(body.env, Some(vec!["NODE_ENV=development".to_string()]));
        let host = body.host_config.unwrap();
        let bindings = host.port_bindings.unwrap();
        let binding = bindings["8080/tcp"].as_ref().unwrap();
        assert_eq!(binding[0].host_port.as_deref(), Some("5000"));
        assert_eq!(host.binds, Some(vec!["/tmp/app:/workspace:ro".to_string()]));
    }

    #[test]
    fn create_body_omits_empty_host_settings() {
        let spec = ContainerSpec::new("web", "node:14-slim");
        let host = DockerEngine::create_body(&spec).host_config.unwrap();
        assert!(host.port_bindings.is_none());
        assert!(host.binds.is_none());
    }
}

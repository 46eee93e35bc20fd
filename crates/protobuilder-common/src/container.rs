use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label attached to every container this runtime creates.
pub const RUNTIME_LABEL: &str = "runtime_project";

/// Reference to a container created (or adopted) by the runtime.
///
/// The handle caches the metadata the lifecycle needs so that callers never
/// have to inspect the container again. Nothing guarantees the container
/// still exists in the daemon; a stale handle fails at the engine boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
    pub image: String,
    pub workdir: String,
    pub created_at: DateTime<Utc>,
}

impl ContainerHandle {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        image: impl Into<String>,
        workdir: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: image.into(),
            workdir: workdir.into(),
            created_at: Utc::now(),
        }
    }

    /// Handle for a container this process did not start (e.g. from a CLI
    /// argument). Image is unknown.
    pub fn adopt(id_or_name: impl Into<String>, workdir: impl Into<String>) -> Self {
        let id = id_or_name.into();
        Self::new(id.clone(), id, "", workdir)
    }

    /// Twelve-character id prefix, as printed by `docker ps`.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(12) {
            Some((end, _)) => &self.id[..end],
            None => &self.id,
        }
    }
}

/// Host port published for a container port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl std::str::FromStr for PortMapping {
    type Err = String;

    /// Accepts `HOST:CONTAINER` or a single port used on both sides.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| format!("Invalid port '{}' in mapping '{}'", p, s))
        };
        match s.split_once(':') {
            Some((host, container)) => Ok(Self {
                host: parse(host)?,
                container: parse(container)?,
            }),
            None => {
                let port = parse(s)?;
                Ok(Self {
                    host: port,
                    container: port,
                })
            }
        }
    }
}

/// Host directory bind-mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBind {
    pub host_path: String,
    pub container_path: String,
    pub read_only: bool,
}

impl VolumeBind {
    /// Docker `Binds` syntax: `host:container[:ro|rw]`.
    pub fn to_bind_string(&self) -> String {
        let mode = if self.read_only { "ro" } else { "rw" };
        format!("{}:{}:{}", self.host_path, self.container_path, mode)
    }
}

/// Everything the engine needs to create and start a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Keep-alive command; the real workload is dispatched later via exec.
    pub command: Vec<String>,
    pub workdir: String,
    pub labels: HashMap<String, String>,
    pub env: HashMap<String, String>,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<VolumeBind>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        let mut labels = HashMap::new();
        labels.insert(RUNTIME_LABEL.to_string(), "protobuilder".to_string());
        Self {
            name: name.into(),
            image: image.into(),
            command: vec!["tail".into(), "-f".into(), "/dev/null".into()],
            workdir: "/workspace".to_string(),
            labels,
            env: HashMap::new(),
            ports: Vec::new(),
            volumes: Vec::new(),
        }
    }

    /// Generated container name, unique per call.
    pub fn generated_name(prefix: &str) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", prefix, &id[..8])
    }

    /// `KEY=value` pairs in the form the Docker API expects.
    pub fn env_list(&self) -> Vec<String> {
        let mut env: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        env.sort();
        env
    }
}

/// Container as reported by a daemon listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub labels: HashMap<String, String>,
    pub host_ports: Vec<u16>,
}

impl ContainerSummary {
    pub fn has_label(&self, key: &str) -> bool {
        self.labels.contains_key(key)
    }

    pub fn binds_host_port(&self, port: u16) -> bool {
        self.host_ports.contains(&port)
    }
}

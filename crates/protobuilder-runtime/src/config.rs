use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use protobuilder_common::ImageCatalog;
use protobuilder_common::container::RUNTIME_LABEL;
use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// Readiness probe settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Shell command run inside the container; exit 0 means ready.
    pub command: String,
    pub retries: u32,
    pub delay: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            command: "curl -sSf http://localhost:8080".to_string(),
            retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Configuration for the container lifecycle.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub images: ImageCatalog,
    pub workdir: String,
    pub keep_alive_command: Vec<String>,
    /// Directory (relative to the workdir) holding the run logs.
    pub log_dir: String,
    pub log_lines: usize,
    pub dispatch_timeout: Duration,
    /// Commands run once after a container starts.
    pub bootstrap: Vec<String>,
    pub cleanup_label: String,
    pub cleanup_port: u16,
    pub probe: ProbeConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            images: ImageCatalog::default(),
            workdir: "/workspace".to_string(),
            keep_alive_command: vec!["tail".into(), "-f".into(), "/dev/null".into()],
            log_dir: "logs".to_string(),
            log_lines: 100,
            dispatch_timeout: Duration::from_secs(180),
            bootstrap: vec![
                "apt-get update".to_string(),
                "apt-get install -y procps".to_string(),
            ],
            cleanup_label: RUNTIME_LABEL.to_string(),
            cleanup_port: 5000,
            probe: ProbeConfig::default(),
        }
    }
}

/// Raw TOML structure for `.protobuilder/runtime.toml`
#[derive(Debug, Default, Serialize, Deserialize)]
struct RuntimeToml {
    runtime: Option<RuntimeSection>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RuntimeSection {
    default_image: Option<String>,
    workdir: Option<String>,
    keep_alive_command: Option<String>,
    log_dir: Option<String>,
    log_lines: Option<usize>,
    dispatch_timeout_secs: Option<u64>,
    bootstrap: Option<Vec<String>>,
    cleanup_label: Option<String>,
    cleanup_port: Option<u16>,
    images: Option<BTreeMap<String, String>>,
    probe: Option<ProbeSection>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProbeSection {
    command: Option<String>,
    retries: Option<u32>,
    delay_secs: Option<u64>,
}

impl RuntimeConfig {
    pub fn path_for(project_dir: &Path) -> PathBuf {
        project_dir.join(".protobuilder").join("runtime.toml")
    }

    /// Load runtime config from `.protobuilder/runtime.toml` in the project
    /// directory. Returns defaults if the file doesn't exist.
    pub fn load(project_dir: &Path) -> Result<Self, RuntimeError> {
        let path = Self::path_for(project_dir);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| RuntimeError::Config {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|message| RuntimeError::Config { path, message })
    }

    fn from_toml_str(content: &str) -> Result<Self, String> {
        let raw: RuntimeToml = toml::from_str(content).map_err(|e| e.to_string())?;

        let mut config = Self::default();
        let Some(section) = raw.runtime else {
            return Ok(config);
        };

        if let Some(images) = section.images {
            for (key, image) in images {
                config.images.insert(key, image);
            }
        }
        if let Some(key) = section.default_image {
            config.images.set_default_key(key);
        }
        if let Some(workdir) = section.workdir {
            config.workdir = workdir;
        }
        if let Some(command) = section.keep_alive_command {
            config.keep_alive_command = shell_words::split(&command)
                .map_err(|e| format!("keep_alive_command: {}", e))?;
            if config.keep_alive_command.is_empty() {
                return Err("keep_alive_command must not be empty".to_string());
            }
        }
        if let Some(log_dir) = section.log_dir {
            config.log_dir = log_dir;
        }
        if let Some(lines) = section.log_lines {
            config.log_lines = lines;
        }
        if let Some(secs) = section.dispatch_timeout_secs {
            config.dispatch_timeout = Duration::from_secs(secs);
        }
        if let Some(bootstrap) = section.bootstrap {
            config.bootstrap = bootstrap;
        }
        if let Some(label) = section.cleanup_label {
            config.cleanup_label = label;
        }
        if let Some(port) = section.cleanup_port {
            config.cleanup_port = port;
        }
        if let Some(probe) = section.probe {
            if let Some(command) = probe.command {
                config.probe.command = command;
            }
            if let Some(retries) = probe.retries {
                config.probe.retries = retries;
            }
            if let Some(delay) = probe.delay_secs {
                config.probe.delay = Duration::from_secs(delay);
            }
        }

        Ok(config)
    }

    /// Render the effective configuration in the file's own format.
    pub fn to_toml(&self) -> String {
        let section = RuntimeSection {
            default_image: Some(self.images.default_key().to_string()),
            workdir: Some(self.workdir.clone()),
            keep_alive_command: Some(shell_words::join(&self.keep_alive_command)),
            log_dir: Some(self.log_dir.clone()),
            log_lines: Some(self.log_lines),
            dispatch_timeout_secs: Some(self.dispatch_timeout.as_secs()),
            bootstrap: Some(self.bootstrap.clone()),
            cleanup_label: Some(self.cleanup_label.clone()),
            cleanup_port: Some(self.cleanup_port),
            images: Some(
                self.images
                    .entries()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            probe: Some(ProbeSection {
                command: Some(self.probe.command.clone()),
                retries: Some(self.probe.retries),
                delay_secs: Some(self.probe.delay.as_secs()),
            }),
        };
        toml::to_string_pretty(&RuntimeToml {
            runtime: Some(section),
        })
        .unwrap_or_default()
    }
}

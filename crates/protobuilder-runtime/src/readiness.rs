//! Readiness polling.
//!
//! A fixed probe command runs inside the container up to `retries` times with
//! a fixed delay after each failed attempt. The wait is cut short when the
//! daemon reports that the container exited.

use std::time::Duration;

use protobuilder_common::{ContainerEngine, ContainerHandle, ExitEvent};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;

/// Outcome of a readiness wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// A probe exited zero.
    Ready { attempts: u32 },
    /// Every probe failed.
    NotReady { attempts: u32 },
    /// The container exited while we were waiting.
    Exited { attempts: u32, exit_code: Option<i64> },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Readiness::Ready { attempts }
            | Readiness::NotReady { attempts }
            | Readiness::Exited { attempts, .. } => *attempts,
        }
    }
}

pub struct ReadinessPoller {
    command: String,
    retries: u32,
    delay: Duration,
}

impl ReadinessPoller {
    pub fn new(command: impl Into<String>, retries: u32, delay: Duration) -> Self {
        Self {
            command: command.into(),
            retries,
            delay,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.command.clone(), config.retries, config.delay)
    }

    fn probe_cmd(&self) -> Vec<String> {
        vec!["sh".into(), "-c".into(), self.command.clone()]
    }

    async fn probe<E: ContainerEngine + ?Sized>(&self, engine: &E, container_id: &str) -> bool {
        match engine.exec(container_id, self.probe_cmd(), None).await {
            Ok(output) => {
                if !output.is_success() {
                    debug!(exit_code = output.exit_code, "probe failed");
                }
                output.is_success()
            }
            Err(e) => {
                debug!(error = %e, "probe exec failed");
                false
            }
        }
    }

    pub async fn wait<E: ContainerEngine + ?Sized>(
        &self,
        engine: &E,
        handle: &ContainerHandle,
    ) -> Readiness {
        let mut exit_rx: Option<oneshot::Receiver<ExitEvent>> =
            match engine.subscribe_exit(&handle.id).await {
                Ok(rx) => Some(rx),
                Err(e) => {
                    warn!(container = %handle.name, error = %e, "no exit subscription, polling only");
                    None
                }
            };

        for attempt in 1..=self.retries {
            if self.probe(engine, &handle.id).await {
                info!(container = %handle.name, attempt, "container is ready");
                return Readiness::Ready { attempts: attempt };
            }
            debug!(container = %handle.name, attempt, retries = self.retries, "not ready yet");

            let sleep = tokio::time::sleep(self.delay);
            tokio::pin!(sleep);

            let mut stream_closed = false;
            match exit_rx.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        _ = &mut sleep => {}
                        event = rx => match event {
                            Ok(event) => {
                                warn!(
                                    container = %handle.name,
                                    exit_code = ?event.exit_code,
                                    "container exited before becoming ready"
                                );
                                return Readiness::Exited {
                                    attempts: attempt,
                                    exit_code: event.exit_code,
                                };
                            }
                            Err(_) => {
                                stream_closed = true;
                                (&mut sleep).await;
                            }
                        },
                    }
                }
                None => (&mut sleep).await,
            }
            if stream_closed {
                exit_rx = None;
            }
        }

        warn!(container = %handle.name, retries = self.retries, "container never became ready");
        Readiness::NotReady {
            attempts: self.retries,
        }
    }
}

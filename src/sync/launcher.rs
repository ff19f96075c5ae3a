//! Container-backed launcher for provider sync jobs.
//!
//! Sync jobs run as short-lived Docker containers so a crashed or
//! hung provider sync never takes the dispatcher down with it. The
//! [`JobLauncher`] trait keeps the dispatcher testable without a
//! Docker daemon.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::Docker;
use futures::StreamExt;
use thiserror::Error;

/// Errors from launching or observing sync job containers.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Docker daemon unavailable: {0}")]
    DaemonUnavailable(String),

    #[error("Failed to launch job '{name}': {message}")]
    LaunchFailed { name: String, message: String },

    #[error("Failed waiting for job '{name}': {message}")]
    WaitFailed { name: String, message: String },
}

/// Everything needed to run one sync job container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Container name, unique per launch.
    pub name: String,
    /// Image holding the provider sync worker.
    pub image: String,
    /// Worker command line.
    pub command: Vec<String>,
    /// Environment entries in `KEY=value` form.
    pub env: Vec<String>,
}

impl JobSpec {
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        command: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command,
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push(format!("{}={}", key, value));
        self
    }
}

/// Reference to a launched job, consumed by [`JobLauncher::wait`].
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub container_id: String,
    pub name: String,
}

/// Terminal state of a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOutcome {
    pub exit_code: i64,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs sync jobs to completion, one container per job.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    /// Creates and starts the job container.
    async fn launch(&self, spec: &JobSpec) -> Result<JobHandle, LaunchError>;

    /// Blocks until the job reaches a terminal state, then cleans up
    /// the container and reports its exit code.
    async fn wait(&self, handle: JobHandle) -> Result<JobOutcome, LaunchError>;
}

/// [`JobLauncher`] backed by the local Docker daemon.
pub struct DockerJobLauncher {
    docker: Docker,
}

impl DockerJobLauncher {
    pub fn new() -> Result<Self, LaunchError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| LaunchError::DaemonUnavailable(format!("{}", e)))?;
        Ok(Self { docker })
    }

    async fn remove_container(&self, handle: &JobHandle) {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        if let Err(e) = self
            .docker
            .remove_container(&handle.container_id, Some(options))
            .await
        {
            tracing::warn!(
                job = %handle.name,
                container_id = %handle.container_id,
                error = %e,
                "Failed to remove sync job container"
            );
        }
    }
}

#[async_trait]
impl JobLauncher for DockerJobLauncher {
    async fn launch(&self, spec: &JobSpec) -> Result<JobHandle, LaunchError> {
        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            env: if spec.env.is_empty() {
                None
            } else {
                Some(spec.env.clone())
            },
            tty: Some(false),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| LaunchError::LaunchFailed {
                name: spec.name.clone(),
                message: format!("create failed: {}", e),
            })?;

        if let Err(e) = self
            .docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
        {
            // Leave no stopped container behind when start fails.
            let handle = JobHandle {
                container_id: created.id.clone(),
                name: spec.name.clone(),
            };
            self.remove_container(&handle).await;
            return Err(LaunchError::LaunchFailed {
                name: spec.name.clone(),
                message: format!("start failed: {}", e),
            });
        }

        tracing::debug!(
            job = %spec.name,
            container_id = %created.id,
            image = %spec.image,
            "Started sync job container"
        );

        Ok(JobHandle {
            container_id: created.id,
            name: spec.name.clone(),
        })
    }

    async fn wait(&self, handle: JobHandle) -> Result<JobOutcome, LaunchError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = self
            .docker
            .wait_container(&handle.container_id, Some(options));

        let exit_code = match stream.next().await {
            Some(Ok(response)) => response.status_code,
            Some(Err(e)) => {
                self.remove_container(&handle).await;
                return Err(LaunchError::WaitFailed {
                    name: handle.name.clone(),
                    message: format!("{}", e),
                });
            }
            None => {
                self.remove_container(&handle).await;
                return Err(LaunchError::WaitFailed {
                    name: handle.name.clone(),
                    message: "wait stream ended without a status".to_string(),
                });
            }
        };

        self.remove_container(&handle).await;
        Ok(JobOutcome { exit_code })
    }
}

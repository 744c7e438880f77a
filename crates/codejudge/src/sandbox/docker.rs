//! Docker backend for [`ContainerRuntime`] built on bollard

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, HostConfig, Mount, MountTypeEnum};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, KillContainerOptions,
    LogsOptions, RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use futures_util::stream::StreamExt;
use tracing::{debug, info, instrument};

use crate::config::DockerConfig;
use crate::sandbox::{
    ContainerHandle, ContainerOutput, ContainerRuntime, ContainerSpec, OutputBuffer, SandboxError,
};

/// Seconds bollard waits for a daemon response
const CLIENT_TIMEOUT_SECS: u64 = 120;

/// Scratch space for toolchains that insist on writing outside the workspace
const TMPFS_TMP: &str = "rw,nosuid,nodev,size=64m";

pub struct DockerRuntime {
    docker: Docker,
    pull_missing_images: bool,
}

impl DockerRuntime {
    /// Connect using the configured socket, or the local defaults
    pub fn connect(config: &DockerConfig) -> Result<Self, SandboxError> {
        let docker = match &config.socket {
            Some(socket) => {
                Docker::connect_with_unix(socket, CLIENT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|err| SandboxError::Unavailable(err.to_string()))?;

        Ok(Self {
            docker,
            pull_missing_images: config.pull_missing_images,
        })
    }

    #[instrument(skip(self))]
    async fn pull(&self, image: &str) -> Result<(), SandboxError> {
        info!(image, "pulling image");
        let options = CreateImageOptions {
            from_image: Some(image.to_owned()),
            ..Default::default()
        };
        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(step) = progress.next().await {
            step.map_err(|err| SandboxError::Image {
                image: image.to_owned(),
                message: err.to_string(),
            })?;
        }
        debug!(image, "image pulled");
        Ok(())
    }
}

/// Translate a [`ContainerSpec`] into the daemon's create body
fn create_body(spec: &ContainerSpec) -> Result<ContainerCreateBody, SandboxError> {
    let host_path = spec
        .mount
        .host
        .to_str()
        .ok_or_else(|| SandboxError::InvalidMount(spec.mount.host.clone()))?;

    let host_config = HostConfig {
        mounts: Some(vec![Mount {
            target: Some(spec.mount.target.clone()),
            source: Some(host_path.to_owned()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(false),
            ..Default::default()
        }]),
        memory: spec.memory_bytes,
        memory_swap: spec.memory_bytes,
        nano_cpus: spec.nano_cpus,
        pids_limit: spec.pids_limit,
        network_mode: spec.network_disabled.then(|| "none".to_owned()),
        cap_drop: Some(vec!["ALL".to_owned()]),
        security_opt: Some(vec!["no-new-privileges".to_owned()]),
        readonly_rootfs: Some(spec.read_only_root),
        tmpfs: spec
            .read_only_root
            .then(|| HashMap::from([("/tmp".to_owned(), TMPFS_TMP.to_owned())])),
        ..Default::default()
    };

    Ok(ContainerCreateBody {
        image: Some(spec.image.clone()),
        cmd: Some(spec.command.clone()),
        env: (!spec.env.is_empty()).then(|| spec.env_pairs()),
        user: spec.user.clone(),
        working_dir: Some(spec.mount.target.clone()),
        network_disabled: Some(spec.network_disabled),
        attach_stdin: Some(false),
        open_stdin: Some(false),
        tty: Some(false),
        host_config: Some(host_config),
        ..Default::default()
    })
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<(), SandboxError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|err| SandboxError::Unavailable(err.to_string()))
    }

    async fn ensure_image(&self, image: &str) -> Result<(), SandboxError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(()),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) if self.pull_missing_images => self.pull(image).await,
            Err(BollardError::DockerResponseServerError {
                status_code: 404,
                message,
            }) => Err(SandboxError::Image {
                image: image.to_owned(),
                message,
            }),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip_all, fields(name = %spec.name, image = %spec.image))]
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle, SandboxError> {
        let options = CreateContainerOptions {
            name: Some(spec.name.as_str().to_owned()),
            ..Default::default()
        };
        let response = self
            .docker
            .create_container(Some(options), create_body(spec)?)
            .await?;
        debug!(id = %response.id, "container created");

        Ok(ContainerHandle {
            id: response.id,
            name: spec.name.clone(),
        })
    }

    async fn start(&self, container: &ContainerHandle) -> Result<(), SandboxError> {
        self.docker
            .start_container(&container.id, None::<StartContainerOptions>)
            .await?;
        Ok(())
    }

    async fn wait(&self, container: &ContainerHandle) -> Result<i64, SandboxError> {
        let mut stream = self
            .docker
            .wait_container(&container.id, None::<WaitContainerOptions>);
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error carrying the code
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(err)) => Err(err.into()),
            None => Err(SandboxError::Unavailable(format!(
                "wait stream for {} ended without a status",
                container.name
            ))),
        }
    }

    async fn logs(
        &self,
        container: &ContainerHandle,
        limit: Option<usize>,
    ) -> Result<ContainerOutput, SandboxError> {
        let options = LogsOptions {
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut stream = self.docker.logs(&container.id, Some(options));
        let mut buffer = OutputBuffer::new(limit);

        while let Some(chunk) = stream.next().await {
            match chunk? {
                LogOutput::StdOut { message } => buffer.push_stdout(&message),
                LogOutput::StdErr { message } => buffer.push_stderr(&message),
                _ => {}
            }
            if buffer.is_full() {
                break;
            }
        }
        Ok(buffer.finish())
    }

    async fn oom_killed(&self, container: &ContainerHandle) -> Result<bool, SandboxError> {
        let details = self
            .docker
            .inspect_container(&container.id, None::<InspectContainerOptions>)
            .await?;
        Ok(details
            .state
            .and_then(|state| state.oom_killed)
            .unwrap_or(false))
    }

    async fn kill(&self, container: &ContainerHandle) -> Result<(), SandboxError> {
        let options = KillContainerOptions {
            signal: "SIGKILL".to_owned(),
        };
        self.docker
            .kill_container(&container.id, Some(options))
            .await?;
        Ok(())
    }

    async fn remove(&self, container: &ContainerHandle) -> Result<(), SandboxError> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        self.docker
            .remove_container(&container.id, Some(options))
            .await?;
        debug!(name = %container.name, "container removed");
        Ok(())
    }
}

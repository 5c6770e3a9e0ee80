// src/executors/docker.rs
use async_trait::async_trait;
use bollard::container::LogOutput; // For LogOutput::StdOut, LogOutput::StdErr
use bollard::errors::Error as BollardError;
use bollard::exec::{StartExecOptions, StartExecResults};
use bollard::models::{ContainerCreateBody, ExecConfig, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions as BollardCreateContainerOptionsQuery,
    CreateImageOptions as BollardCreateImageOptionsQuery,
    InspectContainerOptions as BollardInspectContainerOptionsQuery,
    RemoveContainerOptions as BollardRemoveContainerOptionsQuery,
    StartContainerOptions as BollardStartContainerOptionsQuery,
    StatsOptions as BollardStatsOptionsQuery,
    StopContainerOptions as BollardStopContainerOptionsQuery,
};
use bollard::Docker;
use futures_util::future;
use futures_util::stream::StreamExt;
use std::default::Default;

use super::{ContainerSpec, ExecHandle, ExecSpec, OutputChunk, SandboxRuntime, SANDBOX_WORKDIR};
use crate::errors::SandboxError;

/// Keeps a session container alive between executions.
const KEEP_ALIVE_CMD: [&str; 2] = ["sleep", "infinity"];

/// Kills every process in the sandbox except init, the keep-alive process
/// and the shell itself. Everything is stopped first so nothing can fork
/// while the process table is walked. The keep-alive is the oldest child of
/// init; exec'd processes have no parent inside the container and orphans
/// are always younger.
const KILL_SCRIPT: &str = r#"kill -STOP -1 2>/dev/null
keep=""
for s in /proc/[0-9]*/status; do
  pid=${s#/proc/}; pid=${pid%/status}
  [ "$pid" = 1 ] && continue
  while read -r k v; do
    [ "$k" = "PPid:" ] || continue
    if [ "$v" = 1 ] && { [ -z "$keep" ] || [ "$pid" -lt "$keep" ]; }; then keep=$pid; fi
    break
  done < "$s" 2>/dev/null
done
for d in /proc/[0-9]*; do
  pid=${d#/proc/}
  case "$pid" in 1|$$|"$keep") ;; *) kill -KILL "$pid" 2>/dev/null ;; esac
done
[ -n "$keep" ] && kill -CONT "$keep"
exit 0"#;

/// Seconds Docker waits after SIGTERM before killing a stopped container.
const STOP_GRACE_SECONDS: i32 = 1;

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new() -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }

    /// Test if Docker is reachable.
    pub async fn is_available(&self) -> bool {
        self.docker.ping().await.is_ok()
    }

    fn container_config(spec: &ContainerSpec) -> ContainerCreateBody {
        ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: Some(KEEP_ALIVE_CMD.iter().map(|s| s.to_string()).collect()),
            working_dir: Some(SANDBOX_WORKDIR.to_string()),
            labels: Some(spec.labels.clone()),
            network_disabled: Some(true),
            attach_stdin: Some(false),
            attach_stdout: Some(false),
            attach_stderr: Some(false),
            tty: Some(false),
            host_config: Some(HostConfig {
                binds: Some(vec![format!(
                    "{}:{}",
                    spec.host_workdir.display(),
                    SANDBOX_WORKDIR
                )]),
                network_mode: Some("none".to_string()),
                memory: Some(spec.memory_bytes),
                memory_swap: Some(spec.memory_bytes),
                nano_cpus: Some(spec.nano_cpus),
                pids_limit: Some(spec.pids_limit),
                // Reaps processes orphaned by a timeout kill.
                init: Some(true),
                cap_drop: Some(vec!["ALL".to_string()]),
                security_opt: Some(vec!["no-new-privileges".to_string()]),
                auto_remove: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

fn is_not_found(err: &BollardError) -> bool {
    matches!(
        err,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

#[async_trait]
impl SandboxRuntime for DockerRuntime {
    async fn ensure_image(&self, image: &str) -> Result<(), SandboxError> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        log::info!("Pulling sandbox image {}", image);
        let pull_options = Some(BollardCreateImageOptionsQuery {
            from_image: Some(image.to_string()),
            ..Default::default()
        });
        let mut pull_stream = self.docker.create_image(pull_options, None, None);
        while let Some(result) = pull_stream.next().await {
            if let Err(e) = result {
                return Err(SandboxError::ImageUnavailable {
                    image: image.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, SandboxError> {
        let options = Some(BollardCreateContainerOptionsQuery {
            name: Some(spec.name.clone()),
            ..Default::default()
        });

        let container = self
            .docker
            .create_container(options, Self::container_config(spec))
            .await?;
        for warning in &container.warnings {
            log::warn!("Docker warning for container {}: {}", container.id, warning);
        }

        if let Err(e) = self
            .docker
            .start_container(&container.id, None::<BollardStartContainerOptionsQuery>)
            .await
        {
            // Created but never started, so auto-remove will not clean it up.
            let _ = self
                .docker
                .remove_container(
                    &container.id,
                    Some(BollardRemoveContainerOptionsQuery {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await;
            return Err(e.into());
        }

        Ok(container.id)
    }

    async fn is_running(&self, container_id: &str) -> Result<bool, SandboxError> {
        match self
            .docker
            .inspect_container(container_id, None::<BollardInspectContainerOptionsQuery>)
            .await
        {
            Ok(details) => Ok(details
                .state
                .and_then(|state| state.running)
                .unwrap_or(false)),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exec(&self, container_id: &str, spec: &ExecSpec) -> Result<ExecHandle, SandboxError> {
        let config = ExecConfig {
            cmd: Some(spec.cmd.clone()),
            env: Some(spec.env.clone()),
            working_dir: Some(spec.working_dir.clone()),
            attach_stdin: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };
        let exec = self.docker.create_exec(container_id, config).await?;

        match self
            .docker
            .start_exec(&exec.id, None::<StartExecOptions>)
            .await?
        {
            StartExecResults::Attached { output, .. } => {
                let output = output
                    .filter_map(|item| {
                        future::ready(match item {
                            Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                                Some(Ok(OutputChunk::Stdout(message.to_vec())))
                            }
                            Ok(LogOutput::StdErr { message }) => {
                                Some(Ok(OutputChunk::Stderr(message.to_vec())))
                            }
                            Ok(LogOutput::StdIn { .. }) => None,
                            Err(e) => Some(Err(SandboxError::BollardError(e))),
                        })
                    })
                    .boxed();
                Ok(ExecHandle {
                    id: exec.id,
                    output,
                })
            }
            StartExecResults::Detached => Err(SandboxError::ExecDetached(exec.id)),
        }
    }

    async fn exec_exit_code(&self, exec_id: &str) -> Result<Option<i64>, SandboxError> {
        let details = self.docker.inspect_exec(exec_id).await?;
        if details.running.unwrap_or(false) {
            return Ok(None);
        }
        Ok(details.exit_code)
    }

    async fn kill_processes(&self, container_id: &str) -> Result<(), SandboxError> {
        let spec = ExecSpec {
            cmd: vec!["sh".to_string(), "-c".to_string(), KILL_SCRIPT.to_string()],
            env: Vec::new(),
            working_dir: "/".to_string(),
        };
        let mut handle = self.exec(container_id, &spec).await?;
        while let Some(chunk) = handle.output.next().await {
            chunk?;
        }
        Ok(())
    }

    async fn stop_container(&self, container_id: &str) -> Result<(), SandboxError> {
        let stopped = self
            .docker
            .stop_container(
                container_id,
                Some(BollardStopContainerOptionsQuery {
                    t: Some(STOP_GRACE_SECONDS),
                    ..Default::default()
                }),
            )
            .await;
        match stopped {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => {
                log::warn!("Stopping container {} failed ({}), forcing removal", container_id, e);
                match self
                    .docker
                    .remove_container(
                        container_id,
                        Some(BollardRemoveContainerOptionsQuery {
                            force: true,
                            ..Default::default()
                        }),
                    )
                    .await
                {
                    Ok(()) => Ok(()),
                    Err(e) if is_not_found(&e) => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    async fn memory_usage(&self, container_id: &str) -> Result<u64, SandboxError> {
        let mut stats = self.docker.stats(
            container_id,
            Some(BollardStatsOptionsQuery {
                stream: false,
                one_shot: true,
                ..Default::default()
            }),
        );
        match stats.next().await {
            Some(Ok(stats)) => Ok(stats
                .memory_stats
                .and_then(|memory| memory.max_usage.or(memory.usage))
                .unwrap_or(0)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(0),
        }
    }
}

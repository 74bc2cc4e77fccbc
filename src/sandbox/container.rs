//! Docker container sandbox
//!
//! Each compiled artifact gets its own container: no network, memory and swap
//! capped, CPU quota, pids limit, every capability dropped and
//! `no-new-privileges`. The container idles on `sleep infinity`; compilation
//! and every test run are `exec`s inside it.
//!
//! `/workspace` is sealed read-only after compiling. Each run works on a fresh
//! copy in a scratch directory; afterwards every process but init is killed and
//! the scratch areas are wiped, so nothing carries over to the next test.
//!
//! Runs are wrapped in `timeout -s KILL` inside the container. A host-side
//! timeout backs that up and, if it fires, kills every process in the
//! container except its init.
//!
//! Peak memory is not reported by this backend.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use bollard::{
    Docker,
    container::LogOutput,
    exec::{CreateExecOptions, StartExecResults},
    models::{ContainerCreateBody, HostConfig},
    query_parameters::{CreateContainerOptionsBuilder, RemoveContainerOptionsBuilder},
};
use futures::StreamExt;
use tokio::time::timeout;

use crate::{
    config::SandboxConfig,
    constants::{
        CONTAINER_RUN_DIR, CONTAINER_WORKSPACE, CONTAINER_WRITE_CHUNK_BYTES, MAX_DIAGNOSTIC_LENGTH,
    },
    models::Language,
};

use super::{
    CompileError, CompiledArtifact, ExecuteError, ExecutionOutput, ResourceLimits, Sandbox,
    Workspace,
    languages::{self, LanguageRegistry},
    output::{Overflow, sanitize_diagnostic},
};

/// Grace period before the host-side backstop fires
const HOST_TIMEOUT_GRACE: Duration = Duration::from_secs(2);

/// Exit status of a process killed with SIGKILL, as reported by the shell
const KILLED_EXIT_CODE: i64 = 137;

/// Exit status when the shell cannot find the command
const COMMAND_NOT_FOUND_EXIT_CODE: i64 = 127;

/// A judge container, force-removed when dropped
#[derive(Debug)]
pub struct ContainerLease {
    docker: Docker,
    id: String,
    removed: bool,
}

impl ContainerLease {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remove the container now
    pub async fn remove(mut self) {
        self.removed = true;
        remove_container(&self.docker, &self.id).await;
    }
}

impl Drop for ContainerLease {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let docker = self.docker.clone();
                let id = std::mem::take(&mut self.id);
                handle.spawn(async move { remove_container(&docker, &id).await });
            }
            Err(_) => tracing::warn!(container = %self.id, "Container leaked: no runtime to remove it"),
        }
    }
}

async fn remove_container(docker: &Docker, id: &str) {
    let options = RemoveContainerOptionsBuilder::default().force(true).build();
    if let Err(e) = docker.remove_container(id, Some(options)).await {
        tracing::warn!(container = %id, "Failed to remove container: {}", e);
    }
}

/// Output of one `exec`
#[derive(Debug, Default)]
struct ExecResult {
    stdout: String,
    stderr: String,
    exit_code: Option<i64>,
    truncated: bool,
    timed_out: bool,
}

/// Sandbox backed by one Docker container per artifact
pub struct DockerSandbox {
    docker: Docker,
    registry: &'static LanguageRegistry,
    compile_timeout: Duration,
    output_limit: usize,
    cpu_limit: f64,
    pids_limit: i64,
}

impl DockerSandbox {
    /// Create a new container sandbox
    pub fn new(
        docker: Docker,
        config: &SandboxConfig,
        compile_timeout: Duration,
        output_limit: usize,
    ) -> Self {
        Self {
            docker,
            registry: languages::registry(),
            compile_timeout,
            output_limit,
            cpu_limit: config.cpu_limit,
            pids_limit: config.pids_limit,
        }
    }

    /// Create and start a locked-down container for one artifact
    async fn create_container(
        &self,
        image: &str,
        language: Language,
        limits: &ResourceLimits,
    ) -> Result<ContainerLease, bollard::errors::Error> {
        let name = format!("arenajudge-{}", uuid::Uuid::new_v4());
        let options = CreateContainerOptionsBuilder::default().name(&name).build();

        let memory = limits.memory_limit_bytes() as i64;
        let host_config = HostConfig {
            memory: Some(memory),
            memory_swap: Some(memory),
            cpu_period: Some(100_000),
            cpu_quota: Some((self.cpu_limit * 100_000.0) as i64),
            network_mode: Some("none".to_string()),
            pids_limit: Some(self.pids_limit),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(image.to_string()),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            host_config: Some(host_config),
            working_dir: Some(CONTAINER_WORKSPACE.to_string()),
            network_disabled: Some(true),
            env: Some(vec!["LANG=C.UTF-8".to_string()]),
            labels: Some(HashMap::from([(
                "arenajudge.language".to_string(),
                language.to_string(),
            )])),
            ..Default::default()
        };

        let container = self.docker.create_container(Some(options), body).await?;
        let lease = ContainerLease {
            docker: self.docker.clone(),
            id: container.id,
            removed: false,
        };

        self.docker
            .start_container(
                lease.id(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await?;

        Ok(lease)
    }

    /// Write a file at an absolute path inside the container
    async fn write_file(
        &self,
        container_id: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), String> {
        // Argument length is bounded, so large files go over in chunks
        let mut first = true;
        for chunk in content.chunks(CONTAINER_WRITE_CHUNK_BYTES).chain(
            // An empty file still needs to be created
            content.is_empty().then_some(&[][..]),
        ) {
            let encoded = base64::engine::general_purpose::STANDARD.encode(chunk);
            let redirect = if first { ">" } else { ">>" };
            let cmd = format!("printf '%s' '{}' | base64 -d {} {}", encoded, redirect, path);
            first = false;

            let result = self
                .exec(container_id, &cmd, usize::MAX, Overflow::Kill, None)
                .await
                .map_err(|e| e.to_string())?;
            if result.exit_code != Some(0) {
                return Err(format!("failed to write {}: {}", path, result.stderr.trim()));
            }
        }
        Ok(())
    }

    /// Run a shell command in the container, capturing at most `cap` bytes per stream
    async fn exec(
        &self,
        container_id: &str,
        cmd: &str,
        cap: usize,
        overflow: Overflow,
        host_timeout: Option<Duration>,
    ) -> Result<ExecResult, bollard::errors::Error> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(vec!["/bin/sh", "-c", cmd]),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    working_dir: Some(CONTAINER_WORKSPACE),
                    ..Default::default()
                },
            )
            .await?;

        let mut result = ExecResult::default();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            let drain = async {
                let mut truncated = false;
                while let Some(msg) = output.next().await {
                    let (buffer, message) = match msg? {
                        LogOutput::StdOut { message } => (&mut stdout, message),
                        LogOutput::StdErr { message } => (&mut stderr, message),
                        _ => continue,
                    };
                    let room = cap.saturating_sub(buffer.len());
                    if message.len() > room {
                        buffer.extend_from_slice(&message[..room]);
                        truncated = true;
                        if overflow == Overflow::Kill {
                            break;
                        }
                        continue;
                    }
                    buffer.extend_from_slice(&message);
                }
                Ok::<bool, bollard::errors::Error>(truncated)
            };

            match host_timeout {
                Some(limit) => match timeout(limit, drain).await {
                    Ok(truncated) => result.truncated = truncated?,
                    Err(_) => result.timed_out = true,
                },
                None => result.truncated = drain.await?,
            }
        }

        if (result.truncated && overflow == Overflow::Kill) || result.timed_out {
            self.kill_all(container_id).await;
        }

        result.exit_code = self.docker.inspect_exec(&exec.id).await?.exit_code;
        result.stdout = String::from_utf8_lossy(&stdout).into_owned();
        result.stderr = String::from_utf8_lossy(&stderr).into_owned();
        Ok(result)
    }

    /// SIGKILL everything in the container except init
    async fn kill_all(&self, container_id: &str) {
        let kill = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(vec!["/bin/sh", "-c", "kill -KILL -1"]),
                    ..Default::default()
                },
            )
            .await;
        match kill {
            Ok(exec) => {
                if let Err(e) = self.docker.start_exec(&exec.id, None).await {
                    tracing::warn!(container = %container_id, "Failed to kill processes: {}", e);
                }
            }
            Err(e) => tracing::warn!(container = %container_id, "Failed to kill processes: {}", e),
        }
    }

    /// Kill whatever a run left running and wipe every scratch area
    async fn scrub(&self, container_id: &str) {
        match self
            .exec(container_id, SCRUB_COMMAND, 1024, Overflow::Discard, None)
            .await
        {
            Ok(result) if result.exit_code == Some(0) => {}
            Ok(result) => tracing::warn!(
                container = %container_id,
                exit_code = ?result.exit_code,
                "Scratch cleanup did not finish cleanly"
            ),
            Err(e) => tracing::warn!(container = %container_id, "Scratch cleanup failed: {}", e),
        }
    }

    /// Copy the sealed workspace into the scratch directory, feed the input and run once
    async fn run_in_scratch(
        &self,
        container_id: &str,
        run_command: &str,
        input: &str,
        limits: &ResourceLimits,
    ) -> Result<ExecutionOutput, ExecuteError> {
        let prepared = self
            .exec(container_id, &prepare_command(), 4096, Overflow::Discard, None)
            .await
            .map_err(|e| ExecuteError::Process(format!("prepare exec failed: {}", e)))?;
        if prepared.exit_code != Some(0) {
            return Err(ExecuteError::Process(format!(
                "failed to prepare run directory: {}",
                prepared.stderr.trim()
            )));
        }

        self.write_file(
            container_id,
            &format!("{}/input.txt", CONTAINER_RUN_DIR),
            input.as_bytes(),
        )
        .await
        .map_err(ExecuteError::Process)?;

        let started = Instant::now();
        let result = self
            .exec(
                container_id,
                &run_command_line(run_command, limits.time_limit),
                self.output_limit,
                Overflow::Kill,
                Some(limits.time_limit + HOST_TIMEOUT_GRACE),
            )
            .await
            .map_err(|e| ExecuteError::Process(format!("run exec failed: {}", e)))?;

        run_outcome(result, started.elapsed(), limits.time_limit)
    }

    fn lease<'a>(&self, artifact: &'a CompiledArtifact) -> Result<&'a ContainerLease, ExecuteError> {
        match artifact.workspace() {
            Workspace::Container(lease) => Ok(lease),
            _ => Err(ExecuteError::Process(
                "artifact was not built by the container sandbox".to_string(),
            )),
        }
    }
}

/// `kill -1` spares init and the calling shell
const SCRUB_COMMAND: &str =
    "kill -KILL -1 2>/dev/null; rm -rf /tmp/* /tmp/.[!.]* /dev/shm/* 2>/dev/null; true";

/// `timeout` argument in seconds with millisecond precision
fn seconds_arg(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}

fn prepare_command() -> String {
    format!(
        "rm -rf {run} && mkdir -p {run} && cp -R {workspace}/. {run}/ && chmod -R u+w {run}",
        run = CONTAINER_RUN_DIR,
        workspace = CONTAINER_WORKSPACE
    )
}

fn run_command_line(run_command: &str, time_limit: Duration) -> String {
    format!(
        "cd {run} && timeout -s KILL {} {} < input.txt",
        seconds_arg(time_limit),
        run_command,
        run = CONTAINER_RUN_DIR
    )
}

/// Classify a finished compile exec
fn compile_outcome(
    result: &ExecResult,
    elapsed: Duration,
    compile_timeout: Duration,
    image: &str,
) -> Result<(), CompileError> {
    let killed = result.exit_code == Some(KILLED_EXIT_CODE);
    if result.timed_out || (killed && elapsed >= compile_timeout) {
        return Err(CompileError::Diagnostics("Compilation timed out".to_string()));
    }
    if result.exit_code == Some(COMMAND_NOT_FOUND_EXIT_CODE) {
        return Err(CompileError::Toolchain(format!(
            "compiler not available in {}",
            image
        )));
    }
    // Truncated warnings do not fail a compile that exited cleanly
    if result.exit_code != Some(0) {
        let raw = format!("{}{}", result.stdout, result.stderr);
        return Err(CompileError::Diagnostics(sanitize_diagnostic(
            &raw,
            CONTAINER_WORKSPACE,
            MAX_DIAGNOSTIC_LENGTH,
        )));
    }
    Ok(())
}

/// Classify a finished run exec
fn run_outcome(
    result: ExecResult,
    elapsed: Duration,
    time_limit: Duration,
) -> Result<ExecutionOutput, ExecuteError> {
    let killed = result.exit_code == Some(KILLED_EXIT_CODE);
    if result.timed_out || (killed && elapsed >= time_limit) {
        return Err(ExecuteError::TimedOut);
    }

    // Shell convention: 128 + n means terminated by signal n
    let (exit_code, signal) = match result.exit_code {
        Some(code) if code > 128 && !result.truncated => (None, Some((code - 128) as i32)),
        Some(code) => (Some(code as i32), None),
        None => (None, None),
    };

    Ok(ExecutionOutput {
        stdout: result.stdout,
        stderr: sanitize_diagnostic(&result.stderr, CONTAINER_RUN_DIR, MAX_DIAGNOSTIC_LENGTH),
        exit_code,
        signal,
        elapsed,
        peak_memory_kb: None,
        truncated: result.truncated,
    })
}

#[async_trait]
impl Sandbox for DockerSandbox {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn compile(
        &self,
        source: &str,
        language: Language,
        limits: &ResourceLimits,
    ) -> Result<CompiledArtifact, CompileError> {
        let handler = self.registry.get(language).ok_or_else(|| {
            CompileError::Toolchain(format!("no handler registered for {}", language))
        })?;

        let lease = self
            .create_container(handler.image, language, limits)
            .await
            .map_err(|e| CompileError::Toolchain(format!("failed to create container: {}", e)))?;

        let source_file = handler.source_file(source);
        self.write_file(
            lease.id(),
            &format!("{}/{}", CONTAINER_WORKSPACE, source_file),
            source.as_bytes(),
        )
        .await
        .map_err(CompileError::Toolchain)?;

        if let Some(compile_cmd) = handler.compile_command(&source_file, limits.memory_limit_mb) {
            tracing::debug!(language = %language, command = %compile_cmd, "Compiling in container");

            let cmd = format!(
                "timeout -s KILL {} {} 2>&1",
                seconds_arg(self.compile_timeout),
                compile_cmd
            );
            let started = Instant::now();
            let result = self
                .exec(
                    lease.id(),
                    &cmd,
                    MAX_DIAGNOSTIC_LENGTH * 4,
                    Overflow::Discard,
                    Some(self.compile_timeout + HOST_TIMEOUT_GRACE),
                )
                .await
                .map_err(|e| CompileError::Toolchain(format!("compile exec failed: {}", e)))?;

            compile_outcome(&result, started.elapsed(), self.compile_timeout, handler.image)?;
        }

        let sealed = self
            .exec(
                lease.id(),
                &format!("chmod -R a-w {}", CONTAINER_WORKSPACE),
                1024,
                Overflow::Discard,
                None,
            )
            .await
            .map_err(|e| CompileError::Toolchain(format!("seal exec failed: {}", e)))?;
        if sealed.exit_code != Some(0) {
            return Err(CompileError::Toolchain(format!(
                "failed to seal workspace: {}",
                sealed.stderr.trim()
            )));
        }

        let run_command = handler.run_command(&source_file, limits.memory_limit_mb);
        Ok(CompiledArtifact::new(
            language,
            run_command,
            Workspace::Container(lease),
        ))
    }

    async fn execute(
        &self,
        artifact: &CompiledArtifact,
        input: &str,
        limits: &ResourceLimits,
    ) -> Result<ExecutionOutput, ExecuteError> {
        let lease = self.lease(artifact)?;
        let outcome = self
            .run_in_scratch(lease.id(), artifact.run_command(), input, limits)
            .await;
        self.scrub(lease.id()).await;
        outcome
    }

    async fn release(&self, artifact: CompiledArtifact) {
        if let Workspace::Container(lease) = artifact.into_workspace() {
            lease.remove().await;
        }
    }
}

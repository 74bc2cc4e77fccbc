//! Local process sandbox
//!
//! Runs each program as a child process in its own process group inside a
//! temporary directory, with `setrlimit` ceilings on CPU time, address space,
//! file size and (optionally) process count. A wall-clock timeout kills the
//! whole group with `SIGKILL`.
//!
//! The compiled workspace is sealed read-only. Every run gets a fresh scratch
//! copy of it, and whatever the run leaves behind is killed and deleted before
//! the next one.
//!
//! This backend does NOT isolate the filesystem or the network: a submission
//! can read anything the judge user can read and open sockets. Use it for
//! development and CI; production deployments use the Docker backend.

use std::ffi::OsString;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use nix::sys::resource::{Resource, getrlimit, setrlimit};
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::{constants::MAX_DIAGNOSTIC_LENGTH, models::Language};

use super::{
    CompileError, CompiledArtifact, ExecuteError, ExecutionOutput, ResourceLimits, Sandbox,
    Workspace,
    languages::{self, LanguageHandler, LanguageRegistry},
    output::{Overflow, read_capped, read_draining, sanitize_diagnostic},
};

/// How often `/proc/<pid>/status` is sampled for peak memory
const MEMORY_SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// File size ceiling while compiling (object files, class files)
const COMPILE_FILE_SIZE_LIMIT: u64 = 64 * 1024 * 1024;

const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Sandbox that runs submissions as rlimited local processes
pub struct ProcessSandbox {
    registry: &'static LanguageRegistry,
    compile_timeout: Duration,
    output_limit: usize,
    process_limit: Option<u64>,
}

impl ProcessSandbox {
    /// Create a new process sandbox
    pub fn new(compile_timeout: Duration, output_limit: usize, process_limit: Option<u64>) -> Self {
        tracing::warn!(
            "Process sandbox in use: submissions run without filesystem or network isolation"
        );

        Self {
            registry: languages::registry(),
            compile_timeout,
            output_limit,
            process_limit,
        }
    }

    fn handler(&self, language: Language) -> Option<&'static LanguageHandler> {
        self.registry.get(language)
    }

    /// Fresh writable copy of the sealed workspace for one run
    async fn scratch_copy(&self, workspace: &Path) -> Result<tempfile::TempDir, ExecuteError> {
        let scratch = tempfile::Builder::new()
            .prefix("arenajudge-run-")
            .tempdir()
            .map_err(|e| ExecuteError::Process(format!("failed to create run directory: {}", e)))?;

        let from = workspace.to_path_buf();
        let to = scratch.path().to_path_buf();
        tokio::task::spawn_blocking(move || copy_tree(&from, &to))
            .await
            .map_err(|e| ExecuteError::Process(format!("failed to copy workspace: {}", e)))?
            .map_err(|e| ExecuteError::Process(format!("failed to copy workspace: {}", e)))?;

        Ok(scratch)
    }

    /// Spawn `command` in `dir`, feed `input`, and wait at most `wall_limit`
    async fn run_command(
        &self,
        dir: &Path,
        command: &str,
        input: &[u8],
        wall_limit: Duration,
        rlimits: Rlimits,
        overflow: Overflow,
    ) -> Result<ExecutionOutput, ExecuteError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ExecuteError::Process("empty command".to_string()))?;
        // Relative program paths are resolved against the workspace, not our cwd
        let program_path: OsString = match program.strip_prefix("./") {
            Some(relative) => dir.join(relative).into_os_string(),
            None => program.into(),
        };

        let mut cmd = Command::new(&program_path);
        cmd.args(parts)
            .current_dir(dir)
            .env_clear()
            .env(
                "PATH",
                std::env::var("PATH").unwrap_or_else(|_| FALLBACK_PATH.to_string()),
            )
            .env("HOME", dir)
            .env("LANG", "C.UTF-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .process_group(0);

        // SAFETY: the closure only calls getrlimit/setrlimit, which are
        // async-signal-safe, and captures plain integers.
        unsafe {
            cmd.pre_exec(move || rlimits.apply());
        }

        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| ExecuteError::Process(format!("failed to spawn {}: {}", program, e)))?;
        let pid = child.id().map(|id| id as i32);

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecuteError::Process("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecuteError::Process("stderr not captured".to_string()))?;

        let cap = self.output_limit;
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A program that exits without reading its input closes the pipe
                let _ = stdin.write_all(input).await;
                let _ = stdin.shutdown().await;
            }
        };
        let collect_stdout = async {
            let captured = match overflow {
                Overflow::Kill => read_capped(stdout, cap).await,
                Overflow::Discard => read_draining(stdout, cap).await,
            };
            if overflow == Overflow::Kill && matches!(captured, Ok((_, true))) {
                kill_group(pid);
            }
            captured
        };
        let collect_stderr = async {
            let captured = match overflow {
                Overflow::Kill => read_capped(stderr, cap).await,
                Overflow::Discard => read_draining(stderr, cap).await,
            };
            if overflow == Overflow::Kill && matches!(captured, Ok((_, true))) {
                kill_group(pid);
            }
            captured
        };
        let wait = async {
            let mut peak_kb: Option<u64> = None;
            let mut ticker = tokio::time::interval(MEMORY_SAMPLE_INTERVAL);
            loop {
                tokio::select! {
                    status = child.wait() => return (status, peak_kb),
                    _ = ticker.tick() => {
                        if let Some(kb) = pid.and_then(read_peak_memory_kb) {
                            peak_kb = Some(peak_kb.map_or(kb, |peak| peak.max(kb)));
                        }
                    }
                }
            }
        };

        let run = async { tokio::join!(feed, collect_stdout, collect_stderr, wait) };
        let outcome = timeout(wall_limit, run).await;

        let ((), stdout, stderr, (status, peak_memory_kb)) = match outcome {
            Ok(finished) => finished,
            Err(_) => {
                kill_group(pid);
                let _ = child.wait().await;
                return Err(ExecuteError::TimedOut);
            }
        };
        let elapsed = started.elapsed();
        // Background children the program left in its group
        kill_group(pid);

        let status =
            status.map_err(|e| ExecuteError::Process(format!("failed to wait for child: {}", e)))?;
        let (stdout, stdout_truncated) =
            stdout.map_err(|e| ExecuteError::Process(format!("failed to read stdout: {}", e)))?;
        let (stderr, stderr_truncated) =
            stderr.map_err(|e| ExecuteError::Process(format!("failed to read stderr: {}", e)))?;

        // CPU-time ceiling reached before the wall clock
        if status.signal() == Some(Signal::SIGXCPU as i32) {
            return Err(ExecuteError::TimedOut);
        }

        Ok(ExecutionOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: sanitize_diagnostic(
                &String::from_utf8_lossy(&stderr),
                &dir.to_string_lossy(),
                MAX_DIAGNOSTIC_LENGTH,
            ),
            exit_code: status.code(),
            signal: status.signal(),
            elapsed,
            peak_memory_kb,
            truncated: stdout_truncated || stderr_truncated,
        })
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn compile(
        &self,
        source: &str,
        language: Language,
        limits: &ResourceLimits,
    ) -> Result<CompiledArtifact, CompileError> {
        let handler = self.handler(language).ok_or_else(|| {
            CompileError::Toolchain(format!("no handler registered for {}", language))
        })?;

        let dir = tempfile::Builder::new()
            .prefix("arenajudge-")
            .tempdir()
            .map_err(|e| CompileError::Toolchain(format!("failed to create workspace: {}", e)))?;

        let source_file = handler.source_file(source);
        tokio::fs::write(dir.path().join(&source_file), source)
            .await
            .map_err(|e| CompileError::Toolchain(format!("failed to write source: {}", e)))?;

        if let Some(compile_cmd) = handler.compile_command(&source_file, limits.memory_limit_mb) {
            tracing::debug!(language = %language, command = %compile_cmd, "Compiling");

            let rlimits = Rlimits {
                cpu_seconds: Some(self.compile_timeout.as_secs() + 1),
                address_space_bytes: None,
                processes: self.process_limit,
                file_size_bytes: Some(COMPILE_FILE_SIZE_LIMIT),
            };

            let output = match self
                .run_command(
                    dir.path(),
                    &compile_cmd,
                    &[],
                    self.compile_timeout,
                    rlimits,
                    Overflow::Discard,
                )
                .await
            {
                Ok(output) => output,
                Err(ExecuteError::TimedOut) => {
                    return Err(CompileError::Diagnostics("Compilation timed out".to_string()));
                }
                Err(ExecuteError::Process(message)) => {
                    return Err(CompileError::Toolchain(message));
                }
            };

            // Truncated warnings do not fail a compile that exited cleanly
            if output.exit_code != Some(0) || output.signal.is_some() {
                let raw = format!("{}{}", output.stdout, output.stderr);
                let workspace = dir.path().to_string_lossy();
                return Err(CompileError::Diagnostics(sanitize_diagnostic(
                    &raw,
                    &workspace,
                    MAX_DIAGNOSTIC_LENGTH,
                )));
            }
        }

        let sealed = dir.path().to_path_buf();
        tokio::task::spawn_blocking(move || seal_tree(&sealed))
            .await
            .map_err(|e| CompileError::Toolchain(format!("failed to seal workspace: {}", e)))?
            .map_err(|e| CompileError::Toolchain(format!("failed to seal workspace: {}", e)))?;

        let run_command = handler.run_command(&source_file, limits.memory_limit_mb);
        Ok(CompiledArtifact::new(language, run_command, Workspace::Local(dir)))
    }

    async fn execute(
        &self,
        artifact: &CompiledArtifact,
        input: &str,
        limits: &ResourceLimits,
    ) -> Result<ExecutionOutput, ExecuteError> {
        let Workspace::Local(dir) = artifact.workspace() else {
            return Err(ExecuteError::Process(
                "artifact was not built by the process sandbox".to_string(),
            ));
        };
        let handler = self.handler(artifact.language()).ok_or_else(|| {
            ExecuteError::Process(format!("no handler registered for {}", artifact.language()))
        })?;

        let scratch = self.scratch_copy(dir.path()).await?;

        let rlimits = Rlimits {
            // Rounded up, plus one second, so the wall clock normally fires first
            cpu_seconds: Some(limits.time_limit.as_secs() + 2),
            address_space_bytes: handler
                .limit_address_space
                .then(|| limits.memory_limit_bytes()),
            processes: self.process_limit,
            file_size_bytes: Some(self.output_limit as u64),
        };

        let output = self
            .run_command(
                scratch.path(),
                artifact.run_command(),
                input.as_bytes(),
                limits.time_limit,
                rlimits,
                Overflow::Kill,
            )
            .await;

        if let Err(e) = scratch.close() {
            tracing::warn!("Failed to remove run directory: {}", e);
        }
        output
    }

    async fn release(&self, artifact: CompiledArtifact) {
        if let Workspace::Local(dir) = artifact.into_workspace() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!(path = %path.display(), "Failed to remove workspace: {}", e);
            }
        }
    }
}

/// rlimit set applied in the child between fork and exec
#[derive(Debug, Clone, Copy, Default)]
struct Rlimits {
    cpu_seconds: Option<u64>,
    address_space_bytes: Option<u64>,
    processes: Option<u64>,
    file_size_bytes: Option<u64>,
}

impl Rlimits {
    fn apply(&self) -> std::io::Result<()> {
        if let Some(seconds) = self.cpu_seconds {
            // SIGXCPU at the soft limit, SIGKILL one second later
            lower_limit(Resource::RLIMIT_CPU, seconds, seconds + 1)?;
        }
        if let Some(bytes) = self.address_space_bytes {
            lower_limit(Resource::RLIMIT_AS, bytes, bytes)?;
        }
        if let Some(count) = self.processes {
            lower_limit(Resource::RLIMIT_NPROC, count, count)?;
        }
        if let Some(bytes) = self.file_size_bytes {
            lower_limit(Resource::RLIMIT_FSIZE, bytes, bytes)?;
        }
        Ok(())
    }
}

/// Set a limit without trying to raise it above the inherited hard limit
fn lower_limit(resource: Resource, soft: u64, hard: u64) -> std::io::Result<()> {
    let (_, current_hard) = getrlimit(resource)?;
    let hard = hard.min(current_hard);
    let soft = soft.min(hard);
    setrlimit(resource, soft, hard)?;
    Ok(())
}

/// Strip write permission from every file under `dir`
fn seal_tree(dir: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            seal_tree(&path)?;
            continue;
        }
        let mut permissions = entry.metadata()?.permissions();
        permissions.set_mode(permissions.mode() & !0o222);
        std::fs::set_permissions(&path, permissions)?;
    }
    Ok(())
}

/// Copy the files under `from` into `to`, made writable again
fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target: PathBuf = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            std::fs::create_dir(&target)?;
            copy_tree(&entry.path(), &target)?;
            continue;
        }
        std::fs::copy(entry.path(), &target)?;
        let mut permissions = std::fs::metadata(&target)?.permissions();
        permissions.set_mode(permissions.mode() | 0o200);
        std::fs::set_permissions(&target, permissions)?;
    }
    Ok(())
}

/// SIGKILL every process in the group led by `pid`
fn kill_group(pid: Option<i32>) {
    if let Some(pid) = pid {
        // ESRCH just means everything already exited
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
}

/// Peak resident set size (`VmHWM`) of a live process
fn read_peak_memory_kb(pid: i32) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    parse_vm_hwm(&status)
}

fn parse_vm_hwm(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmHWM:"))
        .and_then(|value| value.trim().trim_end_matches("kB").trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn sandbox() -> ProcessSandbox {
        ProcessSandbox::new(Duration::from_secs(10), 1024, None)
    }

    #[test]
    fn test_parse_vm_hwm() {
        let status = "Name:\tpython3\nVmPeak:\t   20000 kB\nVmHWM:\t    8412 kB\nVmRSS:\t 8000 kB\n";
        assert_eq!(parse_vm_hwm(status), Some(8412));
        assert_eq!(parse_vm_hwm("Name:\tzombie\n"), None);
    }

    #[tokio::test]
    async fn test_python_echo_roundtrip() {
        if !python_available() {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let sandbox = sandbox();
        let limits = ResourceLimits::new(5000, 256);
        let artifact = sandbox
            .compile("print(input()[::-1])", Language::Python, &limits)
            .await
            .unwrap();

        let output = sandbox.execute(&artifact, "abc\n", &limits).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "cba");

        sandbox.release(artifact).await;
    }

    #[tokio::test]
    async fn test_infinite_loop_is_killed() {
        if !python_available() {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let sandbox = sandbox();
        let limits = ResourceLimits::new(300, 256);
        let artifact = sandbox
            .compile("while True:\n    pass\n", Language::Python, &limits)
            .await
            .unwrap();

        let started = Instant::now();
        let result = sandbox.execute(&artifact, "", &limits).await;
        assert_eq!(result, Err(ExecuteError::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(3));

        sandbox.release(artifact).await;
    }

    #[tokio::test]
    async fn test_runaway_output_is_truncated() {
        if !python_available() {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let sandbox = sandbox();
        let limits = ResourceLimits::new(5000, 256);
        let artifact = sandbox
            .compile("while True:\n    print('x' * 100)\n", Language::Python, &limits)
            .await
            .unwrap();

        let output = sandbox.execute(&artifact, "", &limits).await.unwrap();
        assert!(output.truncated);
        assert!(output.stdout.len() <= 1024);

        sandbox.release(artifact).await;
    }

    #[tokio::test]
    async fn test_workspace_removed_on_release_and_drop() {
        let sandbox = sandbox();
        let limits = ResourceLimits::new(1000, 64);

        let artifact = sandbox
            .compile("print(1)", Language::Python, &limits)
            .await
            .unwrap();
        let Workspace::Local(dir) = artifact.workspace() else {
            panic!("expected a local workspace");
        };
        let path = dir.path().to_path_buf();
        assert!(path.join("solution.py").exists());
        sandbox.release(artifact).await;
        assert!(!path.exists());

        let artifact = sandbox
            .compile("print(2)", Language::Python, &limits)
            .await
            .unwrap();
        let Workspace::Local(dir) = artifact.workspace() else {
            panic!("expected a local workspace");
        };
        let path = dir.path().to_path_buf();
        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_toolchain_is_not_a_diagnostic() {
        let mut registry = LanguageRegistry::empty();
        registry.register(LanguageHandler {
            compile_command: Some("arenajudge-no-such-compiler {source}"),
            ..languages::c::handler()
        });
        let sandbox = ProcessSandbox {
            registry: Box::leak(Box::new(registry)),
            compile_timeout: Duration::from_secs(5),
            output_limit: 1024,
            process_limit: None,
        };

        let result = sandbox
            .compile("int main(){}", Language::C, &ResourceLimits::new(1000, 64))
            .await;
        assert!(matches!(result, Err(CompileError::Toolchain(_))), "{result:?}");
    }

    /// Sandbox whose C slot runs shell scripts, so tests need no compiler
    fn shell_sandbox(compile_command: Option<&'static str>) -> ProcessSandbox {
        let mut registry = LanguageRegistry::empty();
        registry.register(LanguageHandler {
            source_naming: languages::SourceNaming::Fixed("run.sh"),
            compile_command,
            run_command: "sh run.sh",
            limit_address_space: false,
            ..languages::c::handler()
        });
        ProcessSandbox {
            registry: Box::leak(Box::new(registry)),
            compile_timeout: Duration::from_secs(5),
            output_limit: 1024,
            process_limit: None,
        }
    }

    #[tokio::test]
    async fn test_files_written_by_one_run_are_gone_in_the_next() {
        let sandbox = shell_sandbox(None);
        let limits = ResourceLimits::new(2000, 64);
        let script = "if [ -f memo.txt ]; then echo \"seen:$(cat memo.txt)\"; else echo fresh; fi\n\
                      read line\n\
                      echo \"$line\" > memo.txt\n";
        let artifact = sandbox.compile(script, Language::C, &limits).await.unwrap();

        let first = sandbox.execute(&artifact, "case1\n", &limits).await.unwrap();
        let second = sandbox.execute(&artifact, "case2\n", &limits).await.unwrap();
        assert_eq!(first.stdout.trim(), "fresh");
        assert_eq!(second.stdout.trim(), "fresh");

        let Workspace::Local(dir) = artifact.workspace() else {
            panic!("expected a local workspace");
        };
        assert!(!dir.path().join("memo.txt").exists());
        sandbox.release(artifact).await;
    }

    #[tokio::test]
    async fn test_background_processes_do_not_outlive_the_run() {
        let sandbox = shell_sandbox(None);
        let limits = ResourceLimits::new(2000, 64);
        let artifact = sandbox
            .compile("sleep 30 >/dev/null 2>&1 &\necho $!\n", Language::C, &limits)
            .await
            .unwrap();

        let output = sandbox.execute(&artifact, "", &limits).await.unwrap();
        let pid: i32 = output.stdout.trim().parse().unwrap();

        let mut alive = true;
        for _ in 0..100 {
            let status = std::fs::read_to_string(format!("/proc/{}/status", pid));
            alive = status.is_ok_and(|s| !s.contains("State:\tZ"));
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!alive, "background process {pid} survived the run");
        sandbox.release(artifact).await;
    }

    #[tokio::test]
    async fn test_noisy_but_successful_compile_is_not_a_failure() {
        let sandbox = shell_sandbox(Some("sh {source}"));
        let limits = ResourceLimits::new(2000, 64);

        // Far more output than the capture limit, then a clean exit
        let artifact = sandbox
            .compile("yes warning | head -n 20000\nexit 0\n", Language::C, &limits)
            .await;
        assert!(artifact.is_ok(), "{:?}", artifact.err());

        let broken = sandbox
            .compile("echo 'error: nope'\nexit 1\n", Language::C, &limits)
            .await;
        assert!(
            matches!(&broken, Err(CompileError::Diagnostics(d)) if d.contains("error: nope")),
            "{broken:?}"
        );
    }
}

//! Configure/build wrapper with merged output capture
//!
//! Runs the project's two build phases and hands back one merged log per
//! phase. A non-zero exit is an ordinary result; only a process that cannot
//! be spawned, or one that outlives its time limit, is an error.

use crate::config::{ConfigError, RepairConfig};
use crate::error::{RepairError, RepairResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

/// Outcome of one configure or build invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResult {
    /// Whether the command exited zero
    pub succeeded: bool,
    /// Stdout and stderr interleaved in write order, unfiltered
    pub raw_log: String,
    /// Exit code if the process exited normally
    pub exit_code: Option<i32>,
    /// Wall-clock duration
    pub duration_ms: u64,
}

impl BuildResult {
    /// Successful result with the given log
    pub fn success(raw_log: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            raw_log: raw_log.into(),
            exit_code: Some(0),
            duration_ms: 0,
        }
    }

    /// Failed result with the given log
    pub fn failure(raw_log: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            raw_log: raw_log.into(),
            exit_code: Some(1),
            duration_ms: 0,
        }
    }
}

/// The build collaborator
#[async_trait]
pub trait BuildRunner: Send + Sync {
    /// Prepare the build-output directory and run the configure phase
    async fn configure(&self) -> RepairResult<BuildResult>;

    /// Run the build phase
    async fn build(&self) -> RepairResult<BuildResult>;
}

/// Runs configure/build as child processes in the project root
#[derive(Debug, Clone)]
pub struct CommandBuildRunner {
    working_dir: PathBuf,
    build_dir: PathBuf,
    configure_argv: Vec<String>,
    build_argv: Vec<String>,
    timeout_secs: u64,
}

impl CommandBuildRunner {
    /// Create a runner from session configuration
    pub fn from_config(config: &RepairConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            working_dir: config.project_root.clone(),
            build_dir: config.build_dir_path(),
            configure_argv: config.configure_argv()?,
            build_argv: config.build_argv()?,
            timeout_secs: config.build_timeout_secs,
        })
    }

    /// Run one command with the configured timeout and merge its output.
    ///
    /// Stdout and stderr share one pipe, so the log keeps the order the
    /// tool wrote in. On Unix the child leads its own process group and a
    /// timeout signals the whole group (make and the compilers it spawned).
    async fn run(&self, stage: &str, argv: &[String]) -> RepairResult<BuildResult> {
        let Some((program, args)) = argv.split_first() else {
            return Err(RepairError::LaunchFailure {
                program: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };
        let launch_failure = |source: std::io::Error| RepairError::LaunchFailure {
            program: program.clone(),
            source,
        };

        tracing::info!(stage, command = %argv.join(" "), "Running");

        let (mut reader, writer) = std::io::pipe().map_err(launch_failure)?;
        let writer_err = writer.try_clone().map_err(launch_failure)?;

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(writer_err))
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(launch_failure)?;
        // The command still holds the write ends; EOF only arrives once it is gone.
        drop(cmd);
        let pgid = child.id();

        let reading = tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).map(|_| buf)
        });

        let timeout_dur = Duration::from_secs(self.timeout_secs);
        let finished = tokio::time::timeout(timeout_dur, async {
            let status = child.wait().await?;
            let bytes = reading
                .await
                .map_err(std::io::Error::other)??;
            Ok::<_, std::io::Error>((status, bytes))
        })
        .await;

        let (status, bytes) = match finished {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => return Err(launch_failure(e)),
            Err(_) => {
                kill_group(pgid);
                tracing::warn!(stage, secs = self.timeout_secs, "Timed out; killed process group");
                return Err(RepairError::timeout(stage, self.timeout_secs));
            }
        };
        let raw_log = String::from_utf8_lossy(&bytes).into_owned();

        let result = BuildResult {
            succeeded: status.success(),
            raw_log,
            exit_code: status.code(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::debug!(
            stage,
            succeeded = result.succeeded,
            exit_code = ?result.exit_code,
            log_bytes = result.raw_log.len(),
            "Finished"
        );

        Ok(result)
    }
}

/// SIGKILL every process in the group led by `pgid`.
#[cfg(unix)]
fn kill_group(pgid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pgid else { return };
    if let Err(e) = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        // ESRCH: the group already exited
        if e != nix::errno::Errno::ESRCH {
            tracing::warn!(pgid, error = %e, "Failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: Option<u32>) {}

#[async_trait]
impl BuildRunner for CommandBuildRunner {
    async fn configure(&self) -> RepairResult<BuildResult> {
        tokio::fs::create_dir_all(&self.build_dir)
            .await
            .map_err(|e| RepairError::write(&self.build_dir, e))?;
        self.run("configure", &self.configure_argv).await
    }

    async fn build(&self) -> RepairResult<BuildResult> {
        self.run("build", &self.build_argv).await
    }
}

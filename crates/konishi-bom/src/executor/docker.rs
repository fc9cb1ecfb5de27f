//! [`Executor`] backed by the `docker` CLI.
//!
//! The container runs `/bin/sh` with stdin held open so it stays alive
//! between commands; `close` writes `exit` to that shell through
//! `docker attach` and falls back to `docker stop` if the shell does not
//! exit in time.

use std::io::Read;
use std::process::{Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ExecOutput, Executor, TarStream, first_tar_entry};
use crate::error::ExecutorError;

/// Exit status `docker exec` uses for its own failures.
const DOCKER_EXEC_FAILURE: i32 = 125;

/// Settings for [`DockerExecutor`].
#[derive(Debug, Clone)]
pub struct DockerExecutorConfig {
    /// Path or name of the docker binary.
    pub binary: String,
    /// How long to wait for the shell to exit before force-stopping.
    pub close_timeout: Duration,
}

impl Default for DockerExecutorConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_owned(),
            close_timeout: Duration::from_secs(5),
        }
    }
}

/// An ephemeral container started from an image.
#[derive(Debug)]
pub struct DockerExecutor {
    config: DockerExecutorConfig,
    container_id: String,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl DockerExecutor {
    /// Create and start a container from `image`.
    ///
    /// Fails with [`ExecutorError::UnsupportedBaseImage`] when the image has
    /// no `/bin/sh`. `cancel` aborts any in-flight [`Executor::exec`].
    pub async fn start(
        image: &str,
        config: DockerExecutorConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ExecutorError> {
        let created = run_docker(
            &config.binary,
            &[
                "create",
                "--interactive",
                "--rm",
                "--entrypoint",
                "/bin/sh",
                image,
            ],
        )
        .await?;
        let created = check("create", created)?;
        let container_id = String::from_utf8_lossy(&created.stdout).trim().to_owned();

        let started = run_docker(&config.binary, &["start", &container_id]).await?;
        if !started.status.success() {
            let stderr = String::from_utf8_lossy(&started.stderr).to_lowercase();
            // `--rm` only applies once the container has run
            if let Err(e) = run_docker(&config.binary, &["rm", "--force", &container_id]).await {
                warn!(container = %container_id, error = %e, "failed to remove container");
            }
            if stderr.contains("no such file or directory")
                || stderr.contains("executable file not found")
            {
                return Err(ExecutorError::UnsupportedBaseImage {
                    image: image.to_owned(),
                });
            }
            return Err(ExecutorError::Docker {
                command: "start".to_owned(),
                reason: stderr.trim().to_owned(),
            });
        }

        info!(image, container = %container_id, "started container");
        Ok(Self {
            config,
            container_id,
            cancel,
            closed: AtomicBool::new(false),
        })
    }

    /// Identifier of the running container.
    #[must_use]
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    fn source(&self, path: &str) -> String {
        format!("{}:{path}", self.container_id)
    }

    async fn shutdown_gracefully(&self) -> Result<(), ExecutorError> {
        let mut attach = Command::new(&self.config.binary)
            .args(["attach", &self.container_id])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                program: self.config.binary.clone(),
                source,
            })?;
        let mut stdin = attach.stdin.take().ok_or_else(|| ExecutorError::Docker {
            command: "attach".to_owned(),
            reason: "stdin not captured".to_owned(),
        })?;
        stdin
            .write_all(b"exit\n")
            .await
            .map_err(|e| ExecutorError::Docker {
                command: "attach".to_owned(),
                reason: e.to_string(),
            })?;
        drop(stdin);

        let waited = run_docker(&self.config.binary, &["wait", &self.container_id]).await?;
        check("wait", waited)?;
        Ok(())
    }
}

impl Executor for DockerExecutor {
    async fn exec(&self, cmd: &[&str]) -> Result<ExecOutput, ExecutorError> {
        debug!(container = %self.container_id, cmd = %cmd.join(" "), "exec");
        let child = Command::new(&self.config.binary)
            .arg("exec")
            .arg(&self.container_id)
            .args(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                program: self.config.binary.clone(),
                source,
            })?;

        let output = tokio::select! {
            out = child.wait_with_output() => out.map_err(|source| ExecutorError::Spawn {
                program: self.config.binary.clone(),
                source,
            })?,
            () = self.cancel.cancelled() => return Err(ExecutorError::Cancelled),
        };

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code == DOCKER_EXEC_FAILURE {
            return Err(ExecutorError::Docker {
                command: "exec".to_owned(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(ExecOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code,
        })
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, ExecutorError> {
        let output = run_docker(&self.config.binary, &["cp", &self.source(path), "-"]).await?;
        if !output.status.success() {
            return Err(copy_error(path, &output.stderr));
        }
        let path = path.to_owned();
        tokio::task::spawn_blocking(move || first_tar_entry(output.stdout.as_slice(), &path))
            .await
            .map_err(|e| ExecutorError::Docker {
                command: "cp".to_owned(),
                reason: e.to_string(),
            })?
    }

    async fn read_dir(&self, path: &str) -> Result<TarStream, ExecutorError> {
        debug!(container = %self.container_id, path, "streaming directory");
        let mut child = std::process::Command::new(&self.config.binary)
            .args(["cp", &self.source(path), "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                program: self.config.binary.clone(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or_else(|| ExecutorError::Docker {
            command: "cp".to_owned(),
            reason: "stdout not captured".to_owned(),
        })?;
        Ok(Box::new(ChildStream {
            child,
            stdout,
            path: path.to_owned(),
            finished: false,
        }))
    }

    async fn close(&self) -> Result<(), ExecutorError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let timeout = self.config.close_timeout;
        let graceful = tokio::time::timeout(timeout, self.shutdown_gracefully()).await;
        match graceful {
            Ok(Ok(())) => {
                debug!(container = %self.container_id, "container exited");
                return Ok(());
            }
            Ok(Err(e)) => {
                warn!(container = %self.container_id, error = %e, "graceful shutdown failed, stopping container");
            }
            Err(_) => {
                warn!(container = %self.container_id, ?timeout, "container did not exit in time, stopping container");
            }
        }
        let secs = timeout.as_secs().to_string();
        let stopped =
            run_docker(&self.config.binary, &["stop", "--time", &secs, &self.container_id])
                .await?;
        if stopped.status.success() {
            Ok(())
        } else {
            Err(ExecutorError::CloseTimeout(timeout))
        }
    }
}

async fn run_docker(binary: &str, args: &[&str]) -> Result<Output, ExecutorError> {
    debug!(binary, args = %args.join(" "), "running docker");
    Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ExecutorError::Spawn {
            program: binary.to_owned(),
            source,
        })
}

fn check(command: &str, output: Output) -> Result<Output, ExecutorError> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(ExecutorError::Docker {
            command: command.to_owned(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

fn copy_error(path: &str, stderr: &[u8]) -> ExecutorError {
    let message = String::from_utf8_lossy(stderr).trim().to_owned();
    let lower = message.to_lowercase();
    let kind = if lower.contains("could not find") || lower.contains("no such") {
        std::io::ErrorKind::NotFound
    } else {
        std::io::ErrorKind::Other
    };
    ExecutorError::Read {
        path: path.to_owned(),
        source: std::io::Error::new(kind, message),
    }
}

/// Stdout of a running `docker cp`; reports the process failure at EOF.
struct ChildStream {
    child: std::process::Child,
    stdout: std::process::ChildStdout,
    path: String,
    finished: bool,
}

impl Read for ChildStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.stdout.read(buf)?;
        if n > 0 || buf.is_empty() || self.finished {
            return Ok(n);
        }
        self.finished = true;
        let mut stderr = Vec::new();
        if let Some(mut pipe) = self.child.stderr.take() {
            pipe.read_to_end(&mut stderr)?;
        }
        let status = self.child.wait()?;
        if status.success() {
            Ok(0)
        } else {
            match copy_error(&self.path, &stderr) {
                ExecutorError::Read { source, .. } => Err(source),
                other => Err(std::io::Error::other(other.to_string())),
            }
        }
    }
}

impl Drop for ChildStream {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_maps_to_not_found() {
        let err = copy_error(
            "/var/lib/dpkg/status",
            b"Error response from daemon: Could not find the file /var/lib/dpkg/status in container abc\n",
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn other_copy_failures_are_not_not_found() {
        let err = copy_error("/etc/passwd", b"permission denied");
        assert!(!err.is_not_found());
    }

    #[test]
    fn default_config_uses_docker_binary() {
        let cfg = DockerExecutorConfig::default();
        assert_eq!(cfg.binary, "docker");
        assert_eq!(cfg.close_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_binary_fails_to_spawn() {
        let cfg = DockerExecutorConfig {
            binary: "/nonexistent/konishi-docker".to_owned(),
            ..DockerExecutorConfig::default()
        };
        let err = DockerExecutor::start("alpine:3.19", cfg, CancellationToken::new())
            .await
            .expect_err("no binary");
        assert!(matches!(err, ExecutorError::Spawn { .. }));
    }

    #[tokio::test]
    #[ignore = "requires a running docker daemon"]
    async fn alpine_container_runs_apk() {
        let exec = DockerExecutor::start(
            "alpine:3.19",
            DockerExecutorConfig::default(),
            CancellationToken::new(),
        )
        .await
        .expect("start container");
        let out = exec.exec(&["apk", "--version"]).await.expect("exec");
        assert!(out.success());
        let installed = exec
            .read_file("/lib/apk/db/installed")
            .await
            .expect("read installed db");
        assert!(!installed.is_empty());
        exec.close().await.expect("close");
        exec.close().await.expect("second close is a no-op");
    }
}

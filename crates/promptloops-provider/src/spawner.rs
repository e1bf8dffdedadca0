use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, trace};

use crate::{ProviderConfig, ProviderError, ProviderOutput};

/// Utility for spawning CLI model runners
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Spawn a process, capture its output, and enforce the configured timeout
    pub async fn spawn(
        binary: &Path,
        args: &[&str],
        config: &ProviderConfig,
    ) -> Result<ProviderOutput, ProviderError> {
        let start = Instant::now();

        debug!(
            binary = %binary.display(),
            arg_count = args.len(),
            working_dir = %config.working_dir.display(),
            "Spawning provider process"
        );

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .current_dir(&config.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ProviderError::NotFound(binary.display().to_string())
            }
            _ => ProviderError::SpawnFailed(e),
        })?;

        // Dropping the child on timeout kills the process
        let (stdout, stderr, exit_code) = match config.timeout {
            Some(limit) => tokio::time::timeout(limit, Self::collect(child))
                .await
                .map_err(|_| ProviderError::Timeout(limit))??,
            None => Self::collect(child).await?,
        };
        let duration = start.elapsed();

        debug!(
            exit_code,
            duration_ms = duration.as_millis(),
            "Provider process completed"
        );

        if exit_code != 0 {
            return Err(ProviderError::classify(exit_code, &stderr));
        }

        Ok(ProviderOutput::new(stdout, stderr, duration))
    }

    async fn collect(mut child: Child) -> Result<(String, String, i32), ProviderError> {
        let stdout_handle = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::ExecutionFailed("stdout not captured".into()))?;
        let stderr_handle = child
            .stderr
            .take()
            .ok_or_else(|| ProviderError::ExecutionFailed("stderr not captured".into()))?;

        let mut stdout_reader = BufReader::new(stdout_handle).lines();
        let mut stderr_reader = BufReader::new(stderr_handle).lines();

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut stderr_open = true;

        // Read both streams concurrently
        loop {
            tokio::select! {
                biased;

                result = stdout_reader.next_line() => {
                    match result {
                        Ok(Some(line)) => {
                            trace!(line = %line, "stdout");
                            push_line(&mut stdout, &line);
                        }
                        Ok(None) => {
                            // stdout closed, drain stderr
                            while let Ok(Some(line)) = stderr_reader.next_line().await {
                                trace!(line = %line, "stderr");
                                push_line(&mut stderr, &line);
                            }
                            break;
                        }
                        Err(e) => {
                            return Err(ProviderError::ExecutionFailed(format!(
                                "Failed to read stdout: {}",
                                e
                            )));
                        }
                    }
                }
                result = stderr_reader.next_line(), if stderr_open => {
                    match result {
                        Ok(Some(line)) => {
                            trace!(line = %line, "stderr");
                            push_line(&mut stderr, &line);
                        }
                        Ok(None) => stderr_open = false,
                        Err(e) => {
                            return Err(ProviderError::ExecutionFailed(format!(
                                "Failed to read stderr: {}",
                                e
                            )));
                        }
                    }
                }
            }
        }

        let status = child.wait().await?;
        Ok((stdout, stderr, status.code().unwrap_or(-1)))
    }
}

fn push_line(buffer: &mut String, line: &str) {
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(line);
}

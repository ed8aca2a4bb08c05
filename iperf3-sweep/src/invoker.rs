//! Runs the iperf3 client as a subprocess.
//!
//! One call runs one attempt. The child is spawned with `kill_on_drop` so it
//! is reaped on every exit path, including the caller dropping the future on
//! cancellation. A deadline of test duration plus a grace period guards each
//! run; on expiry the child gets SIGTERM, then SIGKILL.

use crate::config::SweepConfig;
use crate::error::{ConfigurationError, MeasurementError};
use crate::model::{AttemptRequest, Protocol};
use crate::parser;
use std::future::Future;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Time allowed after SIGTERM before the child is killed
const TERMINATE_WAIT_MS: u64 = 2000;

/// Time allowed to drain stdout/stderr once the child has exited
const OUTPUT_DRAIN_MS: u64 = 1000;

/// Longest diagnostic text kept from the tool's output
const MAX_DIAGNOSTIC_LEN: usize = 500;

/// Something that can run one measurement attempt and return its raw output
pub trait MeasurementTool {
    fn measure(
        &self,
        request: &AttemptRequest,
    ) -> impl Future<Output = Result<String, MeasurementError>> + Send;
}

/// Invokes the external iperf3 client
#[derive(Debug, Clone)]
pub struct Iperf3Invoker {
    /// Program and leading arguments, e.g. `["iperf3"]`
    command: Vec<String>,

    /// Added to the test duration to form the deadline
    grace: Duration,

    terminate_wait: Duration,
}

impl Iperf3Invoker {
    /// Create an invoker for the given command prefix
    pub fn new(command: Vec<String>, grace: Duration) -> Self {
        Self {
            command,
            grace,
            terminate_wait: Duration::from_millis(TERMINATE_WAIT_MS),
        }
    }

    pub fn from_config(config: &SweepConfig) -> Self {
        Self::new(
            config.tool_command.clone(),
            Duration::from_millis(config.grace_ms),
        )
    }

    /// Override how long a timed-out child gets to exit after SIGTERM
    pub fn with_terminate_wait(mut self, wait: Duration) -> Self {
        self.terminate_wait = wait;
        self
    }

    /// Client arguments for one attempt
    pub fn client_args(request: &AttemptRequest) -> Vec<String> {
        let mut args = vec![
            "-c".to_string(),
            request.server.clone(),
            "-p".to_string(),
            request.port.to_string(),
            "-t".to_string(),
            request.duration_secs.to_string(),
            "-P".to_string(),
            request.parallel.to_string(),
            "-b".to_string(),
            request.target.to_rate_arg(),
            "-J".to_string(),
        ];
        if request.protocol == Protocol::Udp {
            args.push("-u".to_string());
        }
        args
    }

    /// Deadline for one attempt
    pub fn deadline(&self, request: &AttemptRequest) -> Duration {
        Duration::from_secs(request.duration_secs) + self.grace
    }

    fn command_for(&self, extra_args: &[String]) -> Result<Command, ConfigurationError> {
        let (program, leading) = self
            .command
            .split_first()
            .filter(|(program, _)| !program.is_empty())
            .ok_or(ConfigurationError::EmptyToolCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(leading)
            .args(extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }

    /// Check that the tool can be launched, returning its version banner
    pub async fn preflight(&self) -> Result<String, ConfigurationError> {
        let program = self.command.first().cloned().unwrap_or_default();
        let mut cmd = self.command_for(&["--version".to_string()])?;

        let output = tokio::time::timeout(Duration::from_secs(5), cmd.output())
            .await
            .map_err(|_| ConfigurationError::ToolUnavailable {
                program: program.clone(),
                reason: "'--version' did not return within 5 seconds".to_string(),
            })?
            .map_err(|e| ConfigurationError::ToolUnavailable {
                program: program.clone(),
                reason: if e.kind() == std::io::ErrorKind::NotFound {
                    "not found; install it first (Debian/Ubuntu: apt install iperf3, RHEL/CentOS: yum install iperf3)".to_string()
                } else {
                    e.to_string()
                },
            })?;

        let banner = String::from_utf8_lossy(&output.stdout);
        let banner = banner.lines().next().unwrap_or_default().trim().to_string();
        tracing::debug!("Measurement tool banner: {}", banner);
        Ok(banner)
    }

    /// Run one attempt and return the tool's standard output
    pub async fn run(&self, request: &AttemptRequest) -> Result<String, MeasurementError> {
        let target = request.target;
        let args = Self::client_args(request);
        let mut cmd = self
            .command_for(&args)
            .map_err(|e| MeasurementError::Spawn {
                target,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
            })?;

        tracing::debug!("Running {} {}", self.command.join(" "), args.join(" "));

        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|source| MeasurementError::Spawn { target, source })?;

        let mut stdout_task = drain(child.stdout.take());
        let mut stderr_task = drain(child.stderr.take());

        let deadline = self.deadline(request);
        let status = match tokio::time::timeout(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                stdout_task.abort();
                stderr_task.abort();
                return Err(MeasurementError::Io { target, source });
            }
            Err(_) => {
                tracing::warn!(
                    "Attempt at {} exceeded its {:.1}s deadline, terminating",
                    target,
                    deadline.as_secs_f64()
                );
                terminate(&mut child, self.terminate_wait).await;
                let stdout = collect(&mut stdout_task).await;
                let stderr = collect(&mut stderr_task).await;
                return Err(MeasurementError::Timeout {
                    target,
                    elapsed_secs: started.elapsed().as_secs_f64(),
                    diagnostic: diagnostic_text(&stdout, &stderr),
                });
            }
        };

        let stdout = collect(&mut stdout_task).await;
        let stderr = collect(&mut stderr_task).await;

        if !status.success() {
            return Err(MeasurementError::Exit {
                target,
                status: status.to_string(),
                diagnostic: diagnostic_text(&stdout, &stderr),
            });
        }

        if !stderr.trim().is_empty() {
            tracing::debug!("Measurement tool stderr: {}", stderr.trim());
        }
        Ok(stdout)
    }
}

impl MeasurementTool for Iperf3Invoker {
    async fn measure(&self, request: &AttemptRequest) -> Result<String, MeasurementError> {
        self.run(request).await
    }
}

fn drain<R>(reader: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            if let Err(e) = reader.read_to_end(&mut buf).await {
                tracing::debug!("Failed reading tool output: {}", e);
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

async fn collect(task: &mut JoinHandle<String>) -> String {
    match tokio::time::timeout(Duration::from_millis(OUTPUT_DRAIN_MS), &mut *task).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::debug!("Output reader task failed: {}", e);
            String::new()
        }
        Err(_) => {
            task.abort();
            String::new()
        }
    }
}

/// SIGTERM first so the tool can tell the server the test is over, SIGKILL
/// if it does not exit in time
async fn terminate(child: &mut Child, wait: Duration) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: `pid` is our own child and has not been reaped yet
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc == 0 {
                if let Ok(Ok(status)) = tokio::time::timeout(wait, child.wait()).await {
                    tracing::debug!("Measurement tool exited after SIGTERM: {}", status);
                    return;
                }
            }
        }
    }
    #[cfg(not(unix))]
    let _ = wait;

    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill measurement tool: {}", e);
    }
}

/// Best description of a failure: stderr, else the JSON `error` field, else
/// the head of stdout
fn diagnostic_text(stdout: &str, stderr: &str) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return truncate(stderr);
    }
    if let Ok(report) = parser::parse_report(stdout) {
        if let Some(error) = report.error {
            return truncate(&error);
        }
    }
    let stdout = stdout.trim();
    if stdout.is_empty() {
        "no output".to_string()
    } else {
        truncate(stdout)
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_DIAGNOSTIC_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

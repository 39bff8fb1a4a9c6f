use crate::lock::LockError;
use crate::manifest::LockSettings;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs the external provider lock command.
pub trait LockRunner {
    /// Regenerate the lock file for `provider_source` inside `workdir`.
    fn lock_providers(&self, workdir: &Path, provider_source: &str) -> Result<(), LockError>;
}

/// `terraform providers lock` as a child process with a timeout.
#[derive(Debug, Clone)]
pub struct TerraformCli {
    program: PathBuf,
    extra_args: Vec<String>,
    timeout: Duration,
}

impl TerraformCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn from_settings(settings: &LockSettings) -> Self {
        Self::new(&settings.command)
            .with_extra_args(settings.extra_args.clone())
            .with_timeout(Duration::from_secs(settings.timeout_secs))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Options passed before the provider source, e.g. `-platform=linux_amd64`.
    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command_line(&self, provider_source: &str) -> String {
        let mut parts = vec![
            self.program.display().to_string(),
            "providers".to_string(),
            "lock".to_string(),
        ];
        parts.extend(self.extra_args.iter().cloned());
        parts.push(provider_source.to_string());
        parts.join(" ")
    }
}

impl Default for TerraformCli {
    fn default() -> Self {
        Self::new("terraform")
    }
}

impl LockRunner for TerraformCli {
    fn lock_providers(&self, workdir: &Path, provider_source: &str) -> Result<(), LockError> {
        let command_line = self.command_line(provider_source);
        debug!(command = %command_line, workdir = %workdir.display(), "spawning lock command");

        let mut cmd = Command::new(&self.program);
        cmd.current_dir(workdir)
            .args(["providers", "lock"])
            .args(&self.extra_args)
            .arg(provider_source)
            .env("TF_IN_AUTOMATION", "1")
            .env("TF_INPUT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group so wrapper scripts' children die with it
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|source| LockError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let output = wait_with_timeout(child, self.timeout).map_err(|source| LockError::Io {
            path: workdir.to_path_buf(),
            source,
        })?;

        let Some(output) = output else {
            return Err(LockError::Timeout {
                command: command_line,
                timeout: self.timeout,
            });
        };

        if !output.status.success() {
            return Err(LockError::CommandFailed {
                command: command_line,
                code: output.status.code().unwrap_or(-1),
                stderr: output.stderr.trim().to_string(),
            });
        }

        debug!(stdout = %output.stdout.trim(), "lock command finished");
        Ok(())
    }
}

struct CommandOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Wait for `child`, killing its process group once `timeout` elapses (`Ok(None)`).
///
/// Both pipes are drained on helper threads so a chatty child cannot block
/// on a full pipe while we poll. On timeout the drain threads are detached:
/// a grandchild that escaped the kill may still hold the pipes open.
fn wait_with_timeout(mut child: Child, timeout: Duration) -> std::io::Result<Option<CommandOutput>> {
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let deadline = Instant::now() + timeout;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            kill_process_group(&mut child);
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Some(CommandOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    }))
}

/// SIGKILL the child's process group, falling back to the child alone.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    // process_group(0) made the child the group leader, so pgid == pid
    let group = format!("-{}", child.id());
    let killed = Command::new("kill")
        .args(["-KILL", "--", &group])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false);
    if !killed {
        debug!(pid = child.id(), "process group kill failed; killing child only");
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

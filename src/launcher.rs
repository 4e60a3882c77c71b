//! Emulator process creation and teardown.
//!
//! Builds the `s3270` command line from a [`Config`] and spawns it with
//! piped stdio. The caller owns the returned process and must terminate it.

use crate::config::Config;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::Read;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default emulator executable, looked up on `PATH`.
pub const DEFAULT_EMULATOR: &str = "s3270";

/// Bytes of emulator stderr kept for diagnostics; older output is dropped.
pub const STDERR_TAIL_LIMIT: usize = 16 * 1024;

/// Errors that can occur while starting or stopping the emulator.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(
        "emulator executable {} not found; install the x3270 suite or point --emulator at s3270",
        .program.display()
    )]
    NotFound { program: PathBuf },

    #[error("failed to start emulator {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("emulator started without a {0} pipe")]
    MissingPipe(&'static str),

    #[error("failed to send signal to emulator: {0}")]
    Signal(#[source] nix::Error),

    #[error("failed to wait for emulator: {0}")]
    Wait(#[source] std::io::Error),
}

/// The emulator command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl EmulatorCommand {
    /// Derive the startup arguments from a configuration.
    pub fn new(program: impl Into<PathBuf>, config: &Config) -> Self {
        let mut args: Vec<OsString> = vec![
            "-model".into(),
            config.model.to_string().into(),
            "-port".into(),
            config.port.to_string().into(),
            "-charset".into(),
            config.code_page.name().into(),
        ];
        if let Some(trace) = &config.trace_file {
            args.push("-trace".into());
            args.push("-tracefile".into());
            args.push(trace.as_os_str().to_owned());
        }
        if !config.verify_cert {
            args.push("-noverifycert".into());
        }
        Self {
            program: program.into(),
            args,
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Start the emulator.
    pub fn spawn(&self) -> Result<Spawned, LaunchError> {
        debug!(program = %self.program.display(), args = ?self.args, "starting emulator");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    LaunchError::NotFound {
                        program: self.program.clone(),
                    }
                } else {
                    LaunchError::Spawn {
                        program: self.program.clone(),
                        source,
                    }
                }
            })?;

        let stdin = child.stdin.take().ok_or(LaunchError::MissingPipe("stdin"));
        let stdout = child.stdout.take().ok_or(LaunchError::MissingPipe("stdout"));
        let mut process = EmulatorProcess::new(child);
        let (stdin, stdout) = match (stdin, stdout) {
            (Ok(stdin), Ok(stdout)) => (stdin, stdout),
            (Err(e), _) | (_, Err(e)) => {
                process.kill_and_reap();
                return Err(e);
            }
        };
        info!(pid = process.pid(), "emulator started");
        Ok(Spawned {
            process,
            stdin,
            stdout,
        })
    }
}

/// A freshly spawned emulator with its script streams.
pub struct Spawned {
    pub process: EmulatorProcess,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

/// Last bytes the emulator wrote to stderr, filled by a reader thread so
/// the emulator never blocks on a full pipe.
#[derive(Debug, Default, Clone)]
struct StderrTail(Arc<Mutex<VecDeque<u8>>>);

impl StderrTail {
    fn drain(&self, mut stderr: impl Read + Send + 'static) -> std::io::Result<JoinHandle<()>> {
        let tail = self.clone();
        std::thread::Builder::new()
            .name("emulator-stderr".into())
            .spawn(move || {
                let mut buf = [0u8; 4096];
                loop {
                    match stderr.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => tail.push(&buf[..n]),
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                        Err(e) => {
                            debug!("stderr read failed: {}", e);
                            break;
                        }
                    }
                }
            })
    }

    fn push(&self, bytes: &[u8]) {
        let mut tail = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        tail.extend(bytes);
        let excess = tail.len().saturating_sub(STDERR_TAIL_LIMIT);
        tail.drain(..excess);
    }

    fn text(&self) -> String {
        let tail = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let (front, back) = tail.as_slices();
        let mut bytes = front.to_vec();
        bytes.extend_from_slice(back);
        String::from_utf8_lossy(&bytes).trim().to_string()
    }
}

/// A running emulator process.
pub struct EmulatorProcess {
    child: Child,
    stderr: StderrTail,
    drain: Option<JoinHandle<()>>,
}

impl EmulatorProcess {
    fn new(mut child: Child) -> Self {
        let stderr = StderrTail::default();
        let drain = child.stderr.take().and_then(|pipe| match stderr.drain(pipe) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("failed to start stderr reader: {}", e);
                None
            }
        });
        Self {
            child,
            stderr,
            drain,
        }
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Send a signal to the emulator.
    pub fn signal(&self, sig: Signal) -> Result<(), LaunchError> {
        let pid = i32::try_from(self.pid()).map_err(|_| LaunchError::Signal(nix::errno::Errno::ESRCH))?;
        signal::kill(Pid::from_raw(pid), sig).map_err(LaunchError::Signal)
    }

    /// Check if the emulator has exited without blocking.
    /// Returns `Some(exit_code)` if exited, None if still running.
    pub fn try_wait(&mut self) -> Result<Option<i32>, LaunchError> {
        Ok(self
            .child
            .try_wait()
            .map_err(LaunchError::Wait)?
            .map(exit_code))
    }

    /// Wait for the emulator to exit (blocking).
    pub fn wait(&mut self) -> Result<i32, LaunchError> {
        self.child.wait().map(exit_code).map_err(LaunchError::Wait)
    }

    /// Wait up to `grace` for a voluntary exit, then SIGTERM, then SIGKILL.
    /// The child is always reaped.
    pub fn terminate(&mut self, grace: Duration) -> Result<i32, LaunchError> {
        if let Some(code) = self.wait_for(grace)? {
            debug!(code, "emulator exited");
            return Ok(code);
        }
        warn!(pid = self.pid(), "emulator still running, sending SIGTERM");
        if self.signal(Signal::SIGTERM).is_ok()
            && let Some(code) = self.wait_for(grace)?
        {
            return Ok(code);
        }
        warn!(pid = self.pid(), "emulator ignored SIGTERM, killing");
        self.kill_and_reap();
        self.wait()
    }

    /// The tail of what the emulator wrote to stderr, at most
    /// [`STDERR_TAIL_LIMIT`] bytes. Once the emulator has exited, waits
    /// briefly for the reader thread to catch up.
    pub fn stderr_output(&mut self) -> Option<String> {
        if matches!(self.try_wait(), Ok(Some(_))) {
            let deadline = Instant::now() + Duration::from_millis(500);
            while self.drain.as_ref().is_some_and(|h| !h.is_finished()) && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            if let Some(handle) = self.drain.take_if(|h| h.is_finished()) {
                let _ = handle.join();
            }
        }
        let output = self.stderr.text();
        (!output.is_empty()).then_some(output)
    }

    fn wait_for(&mut self, timeout: Duration) -> Result<Option<i32>, LaunchError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(code) = self.try_wait()? {
                return Ok(Some(code));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn kill_and_reap(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!("kill failed: {}", e);
        }
        let _ = self.child.wait();
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

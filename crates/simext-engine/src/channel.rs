//! ---
//! simext_section: "02-engine-driver"
//! simext_subsection: "module"
//! simext_type: "source"
//! simext_scope: "code"
//! simext_description: "Line-oriented channel to the engine process."
//! simext_version: "v0.0.0-prealpha"
//! simext_owner: "tbd"
//! ---
//! The engine is launched as a child process and spoken to through its
//! standard streams, one value per line. Standard output is drained by a
//! single pump thread so that reads can be bounded by a timeout.
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use simext_common::EngineConfig;
use simext_logging::{log_lifecycle_event, sim_debug, sim_warn, LifecycleOutcome, LogContext};

use crate::errors::{EngineError, Result};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Transport used by the step protocol.
pub trait LineChannel {
    /// Write `line` followed by a newline and flush it to the peer.
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Block until the next complete line is available; the newline is stripped.
    fn read_line(&mut self) -> Result<String>;

    /// Stop the peer. Never fails and may be called more than once.
    fn terminate(&mut self);
}

/// What the pump thread forwards for each line of engine output.
#[derive(Debug)]
enum Received {
    Line(String),
    /// Bytes that are not UTF-8, lossily decoded for the error report.
    Malformed(String),
    Failed(io::Error),
}

/// Channel to an engine running as a child process.
#[derive(Debug)]
pub struct ProcessChannel {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<Received>,
    read_timeout: Option<Duration>,
    shutdown_grace: Duration,
    engine: String,
    terminated: bool,
}

impl ProcessChannel {
    /// Launch the engine described by `config`.
    ///
    /// The child runs with its working directory set to the installation
    /// directory; the host's own working directory is left untouched.
    pub fn start(config: &EngineConfig) -> Result<Self> {
        let install_dir = config
            .install_dir()
            .map_err(|err| launch_error(&config.executable, io::Error::other(format!("{err:#}"))))?;
        let path = config
            .executable_path()
            .map_err(|err| launch_error(&config.executable, io::Error::other(format!("{err:#}"))))?;
        if !path.is_file() {
            return Err(launch_error(
                &path,
                io::Error::new(io::ErrorKind::NotFound, "engine executable not found"),
            ));
        }

        let engine = path.display().to_string();
        let mut child = Command::new(&path)
            .args(&config.args)
            .current_dir(&install_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| launch_error(&path, source))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (stdin, stdout) = match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                reap(&mut child);
                return Err(launch_error(
                    &path,
                    io::Error::other("engine standard streams were not captured"),
                ));
            }
        };

        let (tx, lines) = mpsc::channel();
        if let Err(source) = thread::Builder::new()
            .name("simext-engine-stdout".to_owned())
            .spawn(move || pump(stdout, tx))
        {
            reap(&mut child);
            return Err(launch_error(&path, source));
        }

        let ctx = LogContext::new().with_engine(&engine);
        log_lifecycle_event(
            Some(&ctx),
            "engine.launch",
            &format!("pid {} in {}", child.id(), install_dir.display()),
            LifecycleOutcome::Success,
        );

        Ok(Self {
            child,
            stdin: Some(stdin),
            lines,
            read_timeout: config.read_timeout,
            shutdown_grace: config.shutdown_grace,
            engine,
            terminated: false,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Display form of the engine executable path.
    pub fn engine(&self) -> &str {
        &self.engine
    }

    fn context(&self) -> LogContext<'_> {
        LogContext::new().with_engine(&self.engine)
    }

    fn exited(&mut self) -> Option<String> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(format!("engine exited ({status})")),
            Ok(None) => None,
            Err(err) => Some(format!("engine status unavailable: {err}")),
        }
    }
}

impl LineChannel for ProcessChannel {
    fn write_line(&mut self, line: &str) -> Result<()> {
        if let Some(reason) = self.exited() {
            return Err(EngineError::ChannelClosed(reason));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EngineError::ChannelClosed("engine input already closed".to_owned()))?;
        let written = stdin
            .write_all(line.as_bytes())
            .and_then(|()| stdin.write_all(b"\n"))
            .and_then(|()| stdin.flush());
        match written {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                Err(EngineError::ChannelClosed(format!("engine input closed: {err}")))
            }
            Err(err) => Err(EngineError::Io(err)),
        }
    }

    fn read_line(&mut self) -> Result<String> {
        if self.terminated {
            return Err(EngineError::ChannelClosed("engine terminated".to_owned()));
        }
        let received = match self.read_timeout {
            Some(timeout) => match self.lines.recv_timeout(timeout) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => {
                    sim_warn!(
                        context = self.context(),
                        "engine silent for {:?}, terminating",
                        timeout
                    );
                    self.terminate();
                    return Err(EngineError::ChannelTimeout(timeout));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(EngineError::ChannelClosed("end of engine output".to_owned()))
                }
            },
            None => self
                .lines
                .recv()
                .map_err(|_| EngineError::ChannelClosed("end of engine output".to_owned()))?,
        };
        match received {
            Received::Line(line) => Ok(line),
            Received::Malformed(line) => Err(EngineError::Protocol { line }),
            Received::Failed(err) => Err(EngineError::ChannelClosed(format!(
                "engine output unreadable: {err}"
            ))),
        }
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        // Closing stdin is the engine's cue to leave its read loop.
        drop(self.stdin.take());

        let deadline = Instant::now() + self.shutdown_grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    log_lifecycle_event(
                        Some(&self.context()),
                        "engine.terminate",
                        &format!("engine exited ({status})"),
                        LifecycleOutcome::Success,
                    );
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL_INTERVAL),
                Ok(None) => {
                    reap(&mut self.child);
                    log_lifecycle_event(
                        Some(&self.context()),
                        "engine.terminate",
                        &format!("engine killed after {:?} grace period", self.shutdown_grace),
                        LifecycleOutcome::Fault,
                    );
                    return;
                }
                Err(err) => {
                    reap(&mut self.child);
                    log_lifecycle_event(
                        Some(&self.context()),
                        "engine.terminate",
                        &format!("engine status unavailable ({err}), killed"),
                        LifecycleOutcome::Fault,
                    );
                    return;
                }
            }
        }
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn launch_error(path: &Path, source: io::Error) -> EngineError {
    EngineError::Launch {
        path: PathBuf::from(path),
        source,
    }
}

fn reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        sim_debug!("kill of engine pid {} failed: {}", child.id(), err);
    }
    if let Err(err) = child.wait() {
        sim_debug!("wait on engine pid {} failed: {}", child.id(), err);
    }
}

/// Forward stdout lines in order until end of stream or until the receiver is gone.
fn pump(stdout: ChildStdout, tx: Sender<Received>) {
    let mut reader = BufReader::new(stdout);
    loop {
        let mut buf = Vec::new();
        let received = match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                match String::from_utf8(buf) {
                    Ok(line) => Received::Line(line),
                    Err(err) => {
                        Received::Malformed(String::from_utf8_lossy(err.as_bytes()).into_owned())
                    }
                }
            }
            Err(err) => {
                let _ = tx.send(Received::Failed(err));
                return;
            }
        };
        if tx.send(received).is_err() {
            return;
        }
    }
}

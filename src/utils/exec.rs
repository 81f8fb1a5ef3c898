//! External command execution.
//!
//! Builder-based API for running a process with captured output and
//! cooperative cancellation.
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! let captured = Cmd::from_slice(&["node", "tools/compile.mjs"])
//!     .args(["--kind", "resource"])
//!     .cwd(root)
//!     .cancel(flag.clone())
//!     .run_captured()?;
//! ```

use anyhow::{Context, Result};
use regex::Regex;
use std::{
    ffi::{OsStr, OsString},
    io::Read,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

/// Polling interval while waiting for a child that may be cancelled.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Command builder for external process execution.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    cancel: Option<Arc<AtomicBool>>,
}

/// Outcome of a process run with merged stdout/stderr.
#[derive(Debug)]
pub struct Captured {
    pub status: Option<ExitStatus>,
    pub output: String,
    pub cancelled: bool,
}

impl Captured {
    pub fn success(&self) -> bool {
        !self.cancelled && self.status.is_some_and(|s| s.success())
    }
}

impl Cmd {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Create from a command array (e.g., `["node", "tools/compile.mjs"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        let args: Vec<_> = iter.map(|s| s.as_ref().to_owned()).collect();
        Self {
            program,
            args,
            ..Default::default()
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Kill the child when `flag` becomes true.
    pub fn cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// Spawn failures are errors; a non-zero exit is reported through
    /// [`Captured::success`].
    pub fn run_captured(self) -> Result<Captured> {
        let name = self.program_name();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn `{name}`"))?;

        // Pipes are drained on their own threads so a chatty child never
        // blocks on a full pipe while we poll for exit.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let (status, cancelled) = wait_or_cancel(&mut child, self.cancel.as_deref())
            .with_context(|| format!("Failed to wait for `{name}`"))?;

        let mut output = join_reader(stdout);
        let err = join_reader(stderr);
        if !err.trim().is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&err);
        }

        Ok(Captured {
            status,
            output,
            cancelled,
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn wait_or_cancel(
    child: &mut Child,
    cancel: Option<&AtomicBool>,
) -> std::io::Result<(Option<ExitStatus>, bool)> {
    let Some(cancel) = cancel else {
        return child.wait().map(|s| (Some(s), false));
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((Some(status), false));
        }
        if cancel.load(Ordering::SeqCst) {
            let _ = child.kill();
            let _ = child.wait();
            return Ok((None, true));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Strip ANSI escape codes from captured output.
pub fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());
    re.replace_all(s, "")
}

use std::ffi::{OsStr, OsString};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::UtilError;
use crate::Result;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of running a subprocess.
#[derive(Debug)]
pub struct GitCommandResult {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl GitCommandResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Signal that terminated the process, if any.
    pub fn signal(&self) -> Option<i32> {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            self.status.signal()
        }
        #[cfg(not(unix))]
        {
            None
        }
    }
}

/// Builder for subprocess execution.
///
/// Output is always captured. The idle timeout measures time since the
/// child last wrote to stdout or stderr, not total run time.
pub struct GitCommand {
    program: OsString,
    args: Vec<OsString>,
    env_vars: Vec<(OsString, OsString)>,
    input: Option<Vec<u8>>,
    working_dir: Option<PathBuf>,
    idle_timeout: Option<Duration>,
    max_output: Option<usize>,
    #[cfg_attr(not(unix), allow(dead_code))]
    memory_limit: Option<u64>,
}

impl GitCommand {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            env_vars: Vec::new(),
            input: None,
            working_dir: None,
            idle_timeout: None,
            max_output: None,
            memory_limit: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Self {
        for arg in args {
            self.args.push(arg.as_ref().to_os_string());
        }
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, val: impl AsRef<OsStr>) -> Self {
        self.env_vars
            .push((key.as_ref().to_os_string(), val.as_ref().to_os_string()));
        self
    }

    /// Bytes written to the child's stdin, which is then closed.
    pub fn input(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.input = Some(data.into());
        self
    }

    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Kill the child once it has been silent for `duration`.
    pub fn idle_timeout(mut self, duration: Duration) -> Self {
        self.idle_timeout = Some(duration);
        self
    }

    /// Kill the child once stdout plus stderr exceed `bytes`.
    pub fn max_output(mut self, bytes: usize) -> Self {
        self.max_output = Some(bytes);
        self
    }

    /// Cap the child's address space at `bytes` (unix only). Allocations
    /// past the cap fail inside the child.
    pub fn memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, val) in &self.env_vars {
            cmd.env(key, val);
        }
        cmd.stdin(if self.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            if let Some(bytes) = self.memory_limit {
                limit_address_space(&mut cmd, bytes);
            }
        }
        cmd
    }

    fn command_string(&self) -> String {
        let mut s = self.program.to_string_lossy().to_string();
        for arg in &self.args {
            s.push(' ');
            s.push_str(&arg.to_string_lossy());
        }
        s
    }

    /// Run the command to completion, capturing its output.
    pub fn run(&self) -> Result<GitCommandResult> {
        let cmd_str = self.command_string();
        let subprocess_err = |source| UtilError::Subprocess {
            command: cmd_str.clone(),
            source,
        };

        let mut child = self.build_command().spawn().map_err(subprocess_err)?;
        tracing::debug!(command = %cmd_str, pid = child.id(), "started subprocess");

        let watch = Arc::new(OutputWatch::new(self.max_output));
        let stdin_writer = match (child.stdin.take(), self.input.clone()) {
            (Some(mut stdin), Some(data)) => Some(std::thread::spawn(move || {
                // A child that exits early closes the pipe; its status tells the story.
                let _ = stdin.write_all(&data);
            })),
            _ => None,
        };
        let stdout_reader = child.stdout.take().map(|s| watch.spawn_reader(s));
        let stderr_reader = child.stderr.take().map(|s| watch.spawn_reader(s));

        let status = match self.wait(&mut child, &watch) {
            Ok(status) => status,
            Err(Stop::Idle) => {
                kill(&mut child);
                return Err(UtilError::SubprocessIdle {
                    command: cmd_str,
                    idle: self.idle_timeout.unwrap_or_default(),
                });
            }
            Err(Stop::Overflow(limit)) => {
                kill(&mut child);
                return Err(UtilError::OutputLimit {
                    command: cmd_str,
                    limit,
                });
            }
            Err(Stop::Io(e)) => {
                kill(&mut child);
                return Err(subprocess_err(e));
            }
        };

        if let Some(handle) = stdin_writer {
            let _ = handle.join();
        }
        let stdout = join_reader(stdout_reader).map_err(subprocess_err)?;
        let stderr = join_reader(stderr_reader).map_err(subprocess_err)?;
        if let Some(limit) = self.max_output {
            if watch.overflowed.load(Ordering::Relaxed) {
                return Err(UtilError::OutputLimit {
                    command: cmd_str,
                    limit,
                });
            }
        }
        Ok(GitCommandResult {
            status,
            stdout,
            stderr,
        })
    }

    fn wait(&self, child: &mut Child, watch: &OutputWatch) -> std::result::Result<ExitStatus, Stop> {
        loop {
            if let Some(status) = child.try_wait().map_err(Stop::Io)? {
                return Ok(status);
            }
            if let Some(limit) = self.max_output {
                if watch.overflowed.load(Ordering::Relaxed) {
                    return Err(Stop::Overflow(limit));
                }
            }
            if let Some(idle) = self.idle_timeout {
                if watch.idle_for() > idle {
                    return Err(Stop::Idle);
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Spawn the command without waiting for it to complete.
    pub fn spawn(&self) -> Result<Child> {
        self.build_command()
            .spawn()
            .map_err(|e| UtilError::Subprocess {
                command: self.command_string(),
                source: e,
            })
    }
}

#[cfg(unix)]
fn limit_address_space(cmd: &mut Command, bytes: u64) {
    use std::os::unix::process::CommandExt;
    let limit = bytes as libc::rlim_t;
    // setrlimit is async-signal-safe, so it may run between fork and exec.
    unsafe {
        cmd.pre_exec(move || {
            let rlim = libc::rlimit {
                rlim_cur: limit,
                rlim_max: limit,
            };
            if libc::setrlimit(libc::RLIMIT_AS, &rlim) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

enum Stop {
    Idle,
    Overflow(usize),
    Io(std::io::Error),
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn join_reader(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> std::io::Result<Vec<u8>> {
    match handle {
        Some(h) => h
            .join()
            .unwrap_or_else(|_| Err(std::io::Error::other("output reader panicked"))),
        None => Ok(Vec::new()),
    }
}

/// Shared bookkeeping for the threads draining the child's pipes.
struct OutputWatch {
    started: Instant,
    last_activity_ms: AtomicU64,
    total: AtomicU64,
    limit: Option<usize>,
    overflowed: AtomicBool,
}

impl OutputWatch {
    fn new(limit: Option<usize>) -> Self {
        Self {
            started: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            total: AtomicU64::new(0),
            limit,
            overflowed: AtomicBool::new(false),
        }
    }

    fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(last)
    }

    fn record(&self, n: usize) {
        let now = self.started.elapsed().as_millis() as u64;
        self.last_activity_ms.store(now, Ordering::Relaxed);
        let total = self.total.fetch_add(n as u64, Ordering::Relaxed) + n as u64;
        if self.limit.is_some_and(|limit| total > limit as u64) {
            self.overflowed.store(true, Ordering::Relaxed);
        }
    }

    fn spawn_reader<R: Read + Send + 'static>(
        self: &Arc<Self>,
        mut pipe: R,
    ) -> JoinHandle<std::io::Result<Vec<u8>>> {
        let watch = Arc::clone(self);
        std::thread::spawn(move || {
            let mut out = Vec::new();
            let mut buf = [0u8; 8192];
            loop {
                let n = pipe.read(&mut buf)?;
                if n == 0 {
                    return Ok(out);
                }
                watch.record(n);
                if !watch.overflowed.load(Ordering::Relaxed) {
                    out.extend_from_slice(&buf[..n]);
                }
            }
        })
    }
}

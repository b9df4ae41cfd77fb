use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::Command,
    sync::oneshot,
    task::JoinHandle,
    time,
};
use tracing::{debug, warn};

use crate::{error::Error, types::ResourceLimits, Result};

/// Host variables passed through to children; everything else is cleared.
const PASSTHROUGH_ENV: &[&str] = &[
    "PATH",
    "HOME",
    "LANG",
    "LC_ALL",
    "JAVA_HOME",
    "RUSTUP_HOME",
    "RUSTUP_TOOLCHAIN",
    "CARGO_HOME",
];

const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// How long pipe readers may keep draining once the child is gone. A
/// descendant that escaped the process group can hold a pipe open forever.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

type Captured = (Vec<u8>, bool);

/// A pipe reader running on its own task. Sending on `stop` makes it return
/// whatever it has captured so far.
struct StreamReader {
    task: JoinHandle<std::io::Result<Captured>>,
    stop: oneshot::Sender<()>,
}

impl StreamReader {
    fn spawn<R>(reader: R, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (stop, stopped) = oneshot::channel();
        Self {
            task: tokio::spawn(read_capped(reader, limit, stopped)),
            stop,
        }
    }
}

/// What one child process did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal or timed out
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub timed_out: bool,
    /// Either stream hit the capture limit
    pub truncated: bool,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs one command to completion or deadline
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    limits: ResourceLimits,
    max_output_bytes: usize,
}

impl ProcessRunner {
    pub fn new(limits: ResourceLimits, max_output_bytes: usize) -> Self {
        Self {
            limits,
            max_output_bytes,
        }
    }

    pub fn max_output_bytes(&self) -> usize {
        self.max_output_bytes
    }

    /// RLIMIT_CPU for a step with wall-clock `timeout`. Never below the
    /// deadline, so a long compile ends as a timeout rather than SIGXCPU.
    fn cpu_limit(&self, timeout: Duration) -> u64 {
        let deadline = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0) + 1;
        u64::from(self.limits.cpu_time).max(deadline)
    }

    /// Run `argv` in `working_dir` with a hard wall-clock deadline.
    ///
    /// The child gets its own process group; on deadline the whole group is
    /// killed and whatever output was produced so far is returned with
    /// `timed_out` set. A program that cannot be started is an `Err`, never a
    /// panic.
    pub async fn run(
        &self,
        argv: &[String],
        working_dir: &Path,
        env: &[(String, String)],
        input: Option<&str>,
        timeout: Duration,
    ) -> Result<ProcessOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Internal("empty command".to_string()))?;
        let program_path = resolve_program(program, working_dir)?;

        debug!("Process runner - Command: {:?}", program_path);
        debug!("Process runner - Args: {:?}", args);
        debug!("Process runner - Working dir: {:?}", working_dir);

        let mut command = Command::new(&program_path);
        command
            .args(args)
            .env_clear()
            .envs(PASSTHROUGH_ENV.iter().filter_map(|key| {
                std::env::var_os(key).map(|value| (*key, value))
            }))
            .env("TMPDIR", working_dir)
            .envs(env.iter().map(|(k, v)| (k, v)))
            .current_dir(working_dir)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if std::env::var_os("PATH").is_none() {
            command.env("PATH", DEFAULT_PATH);
        }

        #[cfg(unix)]
        {
            use nix::sys::resource::{setrlimit, Resource};

            command.process_group(0);

            let file_size = self.limits.file_size;
            let cpu_time = self.cpu_limit(timeout);
            unsafe {
                command.pre_exec(move || {
                    setrlimit(Resource::RLIMIT_FSIZE, file_size, file_size)?;
                    setrlimit(Resource::RLIMIT_CPU, cpu_time, cpu_time)?;
                    Ok(())
                });
            }
        }

        let start = Instant::now();
        let mut child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ToolchainUnavailable(program.clone()),
            _ => Error::Spawn {
                program: program.clone(),
                source: e,
            },
        })?;
        let pid = child.id();

        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            let input = input.as_bytes().to_vec();
            tokio::spawn(async move {
                // a child that exits without reading its input closes the pipe
                if let Err(e) = stdin.write_all(&input).await {
                    debug!("Failed to write stdin: {}", e);
                }
            });
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("stderr was not captured".to_string()))?;
        let stdout_reader = StreamReader::spawn(stdout, self.max_output_bytes);
        let stderr_reader = StreamReader::spawn(stderr, self.max_output_bytes);

        let (status, timed_out) = match time::timeout(timeout, child.wait()).await {
            Ok(status) => (Some(status?), false),
            Err(_) => {
                warn!(
                    "Process {:?} exceeded {:?}, killing process group",
                    pid, timeout
                );
                kill_process_group(pid);
                if let Err(e) = child.kill().await {
                    debug!("Child already reaped: {}", e);
                }
                (None, true)
            }
        };
        // sweep descendants left behind by a child that exited on its own
        kill_process_group(pid);

        let elapsed = start.elapsed();
        let (stdout, stdout_truncated) = collect(stdout_reader).await;
        let (stderr, stderr_truncated) = collect(stderr_reader).await;

        let (exit_code, signal) = match status {
            Some(status) => (status.code(), exit_signal(&status)),
            None => (None, None),
        };

        debug!(
            "Process {:?} finished: exit_code={:?} signal={:?} timed_out={} elapsed={:?}",
            pid, exit_code, signal, timed_out, elapsed
        );

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
            signal,
            timed_out,
            truncated: stdout_truncated || stderr_truncated,
            elapsed,
        })
    }
}

fn resolve_program(program: &str, working_dir: &Path) -> Result<PathBuf> {
    if program.contains('/') {
        let path = Path::new(program);
        return Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            working_dir.join(path)
        });
    }
    which::which(program).map_err(|_| Error::ToolchainUnavailable(program.to_string()))
}

/// Read a stream to EOF, or until `stop` fires, keeping at most `limit`
/// bytes. Bytes past the limit are still drained so the child never blocks
/// on a full pipe.
async fn read_capped<R>(
    mut reader: R,
    limit: usize,
    mut stop: oneshot::Receiver<()>,
) -> std::io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];

    loop {
        let n = tokio::select! {
            read = reader.read(&mut chunk) => read?,
            _ = &mut stop => break,
        };
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.len());
        if n > room {
            captured.extend_from_slice(&chunk[..room]);
            truncated = true;
        } else {
            captured.extend_from_slice(&chunk[..n]);
        }
    }

    Ok((captured, truncated))
}

async fn collect(reader: StreamReader) -> Captured {
    let StreamReader { mut task, stop } = reader;

    let joined = match time::timeout(DRAIN_GRACE, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            warn!("Output pipe still open after child exit, keeping what was read");
            // the reader may have finished in the meantime; then nobody listens
            let _ = stop.send(());
            task.await
        }
    };

    match joined {
        Ok(Ok(captured)) => captured,
        Ok(Err(e)) => {
            warn!("Failed to read child output: {}", e);
            (Vec::new(), false)
        }
        Err(e) => {
            warn!("Output reader task failed: {}", e);
            (Vec::new(), false)
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => debug!("killpg({}) failed: {}", pid, e),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// pytest's "no tests collected", which is what testmon reports when no
/// test touches the changed code.
pub const NO_TESTS_COLLECTED: i32 = 5;

pub const INCREMENTAL_DATA: &str = ".testmondata";
pub const INCREMENTAL_SNAPSHOT: &str = ".testmondata-initial";

/// A one-shot timer that runs `on_expiry` unless cancelled first.
pub struct Watchdog {
    cancel: Option<Sender<()>>,
    fired: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn start(timeout: Duration, on_expiry: impl FnOnce() + Send + 'static) -> Self {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let handle = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = cancelled.recv_timeout(timeout) {
                flag.store(true, Ordering::SeqCst);
                on_expiry();
            }
        });
        Watchdog {
            cancel: Some(cancel),
            fired,
            handle: Some(handle),
        }
    }

    /// Stops the timer and waits for it. Returns whether it had already fired.
    /// Calling it again is a no-op.
    pub fn cancel(&mut self) -> bool {
        drop(self.cancel.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.has_fired()
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    use std::os::unix::process::CommandExt;
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    // Own process group, so a timeout can take down the whole tree.
    cmd.process_group(0);
    cmd
}

#[cfg(not(unix))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!("killpg({pid}) failed: {e}");
    }
}

#[cfg(not(unix))]
fn kill_process_group(pid: u32) {
    let status = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        debug!("taskkill {pid} failed: {e}");
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(-1)
}

fn spawn_reader(stream: impl Read + Send + 'static, lines: Sender<String>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if lines.send(line).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Keep the pipe open so the child never sees EPIPE.
                    debug!("ignoring read error on test output: {e}");
                    if let Err(e) = std::io::copy(&mut reader, &mut std::io::sink()) {
                        debug!("giving up on test output: {e}");
                    }
                    break;
                }
            }
        }
    })
}

/// Runs `command` through the shell, handing each output line to `on_line`
/// as it arrives. Returns the exit code, or [`Error::Timeout`] when the
/// deadline passed and the process group was killed.
pub fn popen_streaming_output(
    command: &str,
    mut on_line: impl FnMut(&str),
    timeout: Option<Duration>,
) -> Result<i32> {
    let mut child = shell(command)
        .env("OBJC_DISABLE_INITIALIZE_FORK_SAFETY", "YES")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let (tx, rx) = mpsc::channel();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, tx.clone()));
    }
    drop(tx);

    let pid = child.id();
    let mut watchdog = timeout.map(|t| Watchdog::start(t, move || kill_process_group(pid)));

    for line in rx {
        on_line(&line);
    }
    for reader in readers {
        let _ = reader.join();
    }
    let status = child.wait()?;

    let timed_out = watchdog.as_mut().is_some_and(Watchdog::cancel);
    if timed_out {
        return Err(Error::Timeout {
            command: command.to_string(),
            seconds: timeout.map(|t| t.as_secs_f64()).unwrap_or_default(),
        });
    }
    Ok(exit_code(status))
}

/// Whether an exit code counts as a green test run.
pub fn tests_passed(code: i32, incremental: bool) -> bool {
    code == 0 || (incremental && code == NO_TESTS_COLLECTED)
}

/// Runs the configured test command.
#[derive(Debug, Clone)]
pub struct TestRunner {
    pub command: String,
    pub swallow_output: bool,
    pub incremental: bool,
    /// Where testmon keeps its data.
    pub data_dir: PathBuf,
}

impl TestRunner {
    pub fn new(command: &str, swallow_output: bool) -> Self {
        TestRunner {
            command: command.to_string(),
            swallow_output,
            incremental: command.contains("--testmon"),
            data_dir: PathBuf::from("."),
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// The clean run. testmon data is left as the last run left it, and is
    /// what gets snapshotted afterwards.
    pub fn baseline_passes(&self, on_line: impl FnMut(&str)) -> Result<bool> {
        self.run(None, on_line)
    }

    /// Runs the suite against a mutant, starting testmon from the baseline
    /// snapshot. `on_line` sees every output line; unless output is
    /// swallowed the lines are echoed too.
    pub fn tests_pass(&self, timeout: Option<Duration>, on_line: impl FnMut(&str)) -> Result<bool> {
        if self.incremental {
            restore_incremental_snapshot(&self.data_dir)?;
        }
        self.run(timeout, on_line)
    }

    fn run(&self, timeout: Option<Duration>, mut on_line: impl FnMut(&str)) -> Result<bool> {
        let swallow = self.swallow_output;
        let code = popen_streaming_output(
            &self.command,
            |line| {
                if !swallow {
                    println!("{line}");
                }
                on_line(line);
            },
            timeout,
        )?;
        debug!("`{}` exited with {code}", self.command);
        Ok(tests_passed(code, self.incremental))
    }
}

/// Runs a hook command, returning its combined output. Failures are logged
/// and otherwise ignored.
pub fn run_hook(command: &str) -> String {
    let mut output = Vec::new();
    match popen_streaming_output(command, |line| output.push(line.to_string()), None) {
        Ok(0) => {}
        Ok(code) => warn!("hook `{command}` exited with {code}"),
        Err(e) => warn!("hook `{command}` failed: {e}"),
    }
    output.join("\n")
}

/// Keeps a copy of testmon's database as it was after the clean run, so
/// every mutant starts from the same selection state.
pub fn snapshot_incremental_data(dir: &Path) -> Result<()> {
    let data = dir.join(INCREMENTAL_DATA);
    if !data.exists() {
        warn!("{} not found after the baseline run", data.display());
        return Ok(());
    }
    std::fs::copy(&data, dir.join(INCREMENTAL_SNAPSHOT))?;
    Ok(())
}

pub fn restore_incremental_snapshot(dir: &Path) -> Result<()> {
    let snapshot = dir.join(INCREMENTAL_SNAPSHOT);
    if snapshot.exists() {
        std::fs::copy(&snapshot, dir.join(INCREMENTAL_DATA))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Fails once, then serves the rest of its data.
    struct Flaky {
        failed: bool,
        data: Cursor<Vec<u8>>,
        drained: Arc<AtomicBool>,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(std::io::Error::other("device hiccup"));
            }
            let n = self.data.read(buf)?;
            if n == 0 {
                self.drained.store(true, Ordering::SeqCst);
            }
            Ok(n)
        }
    }

    #[test]
    fn read_errors_keep_the_stream_drained() {
        let drained = Arc::new(AtomicBool::new(false));
        let stream = Flaky {
            failed: false,
            data: Cursor::new(b"one\ntwo\n".to_vec()),
            drained: drained.clone(),
        };
        let (tx, rx) = mpsc::channel();
        spawn_reader(stream, tx).join().unwrap();
        assert!(drained.load(Ordering::SeqCst));
        drop(rx);
    }
}

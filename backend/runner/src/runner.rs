use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

use armdeck_core::{BrokerError, CommandSpec};

/// Capacity of the merged output line channel. The session pump drains this
/// continuously; the bound only matters if the pump itself is wedged.
const LINE_CHANNEL_CAPACITY: usize = 1024;

/// Handle to one spawned subprocess.
///
/// Stdout and stderr are merged into a single line channel fed by two
/// background reader tasks. The `Child` itself is owned by a dedicated reaper
/// task that is the only caller of `Child::wait`; the exit status fans out
/// through a watch channel. That keeps [`ProcessRunner::terminate`] and
/// [`ProcessRunner::try_wait`] lock-free even while another caller is parked
/// in [`ProcessRunner::wait`], which matters when a child closes its output
/// pipes but keeps running.
#[derive(Debug)]
pub struct ProcessRunner {
    program: String,
    pid: Option<u32>,
    stdin: Mutex<Option<ChildStdin>>,
    lines: Mutex<mpsc::Receiver<String>>,
    exit: watch::Receiver<Option<ExitStatus>>,
    /// Asks the reaper task to hard-kill the child it owns.
    kill: mpsc::Sender<()>,
}

impl ProcessRunner {
    /// Spawn the subprocess described by `spec`.
    pub fn spawn(spec: CommandSpec) -> Result<Self, BrokerError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.envs)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.workdir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| BrokerError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        let pid = child.id();
        debug!(program = %spec.program, pid, "spawned subprocess");

        let stdout = child.stdout.take().expect("stdout is piped");
        let stderr = child.stderr.take().expect("stderr is piped");
        let stdin = child.stdin.take().expect("stdin is piped");

        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        tokio::spawn(pump_lines(BufReader::new(stdout), tx.clone()));
        tokio::spawn(pump_lines(BufReader::new(stderr), tx));

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = mpsc::channel(1);
        tokio::spawn(reap(child, exit_tx, kill_rx));

        Ok(Self {
            program: spec.program,
            pid,
            stdin: Mutex::new(Some(stdin)),
            lines: Mutex::new(rx),
            exit: exit_rx,
            kill: kill_tx,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Next line of merged output, or `None` once both pipes have reached
    /// EOF. Cancel-safe.
    pub async fn read_line(&self) -> Option<String> {
        self.lines.lock().await.recv().await
    }

    /// Write raw bytes to the subprocess's stdin.
    ///
    /// Fails with [`BrokerError::Write`] once the process has exited or the
    /// pipe is otherwise closed, rather than surfacing an unrelated fault.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), BrokerError> {
        if self.try_wait().is_some() {
            return Err(BrokerError::Write("process has exited".into()));
        }
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| BrokerError::Write("input pipe closed".into()))?;
        let result = async {
            stdin.write_all(bytes).await?;
            stdin.flush().await
        }
        .await;
        if let Err(err) = result {
            // A broken pipe means the child is gone; drop the handle so
            // later writes fail fast.
            *guard = None;
            return Err(BrokerError::Write(err.to_string()));
        }
        Ok(())
    }

    /// Non-blocking exit check against the reaper's last observation.
    pub fn try_wait(&self) -> Option<ExitStatus> {
        *self.exit.borrow()
    }

    /// Wait for the subprocess to exit and return its status.
    pub async fn wait(&self) -> std::io::Result<ExitStatus> {
        let mut exit = self.exit.clone();
        let seen = exit
            .wait_for(|status| status.is_some())
            .await
            .map_err(|_| std::io::Error::other("subprocess reaper exited without a status"))?;
        (*seen).ok_or_else(|| std::io::Error::other("subprocess exit status missing"))
    }

    /// Terminate the subprocess: SIGTERM, then after `grace` a hard kill.
    ///
    /// Safe to call repeatedly and after the process has already exited
    /// (both are no-ops, not errors). Signals go through the stored pid and
    /// the reaper's kill channel, never through the `Child` handle, so this
    /// returns even while the output pump is parked in [`Self::wait`].
    pub async fn terminate(&self, grace: Duration) -> std::io::Result<()> {
        if self.try_wait().is_some() {
            return Ok(());
        }

        self.send_term();
        match tokio::time::timeout(grace, self.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(program = %self.program, status = ?status, "terminated after SIGTERM");
            }
            Err(_) => {
                warn!(program = %self.program, grace_ms = grace.as_millis() as u64,
                    "subprocess ignored SIGTERM, killing");
                let _ = self.kill.try_send(());
                self.wait().await?;
            }
        }
        Ok(())
    }

    #[cfg(unix)]
    fn send_term(&self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        if let Some(pid) = self.pid {
            if let Err(err) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!(pid, error = %err, "failed to deliver SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    fn send_term(&self) {
        // No TERM equivalent: fall through to the hard kill path.
    }
}

/// Sole owner and waiter of the `Child`. Publishes the exit status once and
/// services hard-kill requests in the meantime.
async fn reap(
    mut child: Child,
    exit_tx: watch::Sender<Option<ExitStatus>>,
    mut kill_rx: mpsc::Receiver<()>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(()) = kill_rx.recv() => {
                if let Err(err) = child.start_kill() {
                    debug!(error = %err, "kill requested for an already-exited process");
                }
            }
        }
    };
    match status {
        Ok(status) => {
            let _ = exit_tx.send(Some(status));
        }
        Err(err) => {
            // Dropping the sender without a status turns waiters into errors.
            warn!(error = %err, "failed to reap subprocess");
        }
    }
}

async fn pump_lines<R>(reader: BufReader<R>, tx: mpsc::Sender<String>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(error = %err, "output pipe read error");
                break;
            }
        }
    }
}

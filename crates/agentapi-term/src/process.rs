use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;
use tokio::sync::watch;

use crate::emulator::TerminalEmulator;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Agents repaint in bursts. A snapshot taken less than this long after the
/// last grid update may capture a half-drawn frame, so `read_screen` waits
/// for a quiet window before rendering.
const SCREEN_QUIET_WINDOW: Duration = Duration::from_millis(16);
const SCREEN_QUIET_PROBES: u32 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TermError {
    #[error("terminal configuration error: {0}")]
    Configuration(String),
    #[error("terminal process error: {0}")]
    Process(String),
    #[error("agent exited with non-zero code {0}")]
    NonZeroExit(u32),
    #[error("terminal internal error: {0}")]
    Internal(String),
}

pub type TermResult<T> = Result<T, TermError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProcessConfig {
    pub program: String,
    pub args: Vec<String>,
    pub term_width: u16,
    pub term_height: u16,
}

struct ScreenState {
    emulator: TerminalEmulator,
    last_update: Instant,
}

/// A child process attached to an emulated VT100 terminal.
///
/// A dedicated thread drains the PTY and feeds every chunk to the emulator
/// under the write half of `screen`; `read_screen` only ever takes the read
/// half. If the drain thread exits (EOF or read error) the grid stops
/// advancing; this is logged but not recovered.
pub struct AgentProcess {
    screen: Arc<RwLock<ScreenState>>,
    writer: Mutex<Box<dyn Write + Send>>,
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    child_pid: Option<u32>,
    exit_rx: watch::Receiver<Option<Result<u32, String>>>,
}

impl std::fmt::Debug for AgentProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentProcess")
            .field("child_pid", &self.child_pid)
            .finish_non_exhaustive()
    }
}

fn process_error(error: impl std::fmt::Display) -> TermError {
    TermError::Process(error.to_string())
}

impl AgentProcess {
    /// Spawn `program args…` inside a fresh PTY with `TERM=vt100` and start
    /// draining its output. Spawn failure is fatal to the caller.
    pub fn spawn(config: AgentProcessConfig) -> TermResult<Self> {
        if config.program.trim().is_empty() {
            return Err(TermError::Configuration(
                "agent program must not be empty".to_owned(),
            ));
        }

        let emulator = TerminalEmulator::new(config.term_width, config.term_height)?;

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                cols: config.term_width,
                rows: config.term_height,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(process_error)?;

        let mut command = CommandBuilder::new(&config.program);
        for arg in &config.args {
            command.arg(arg);
        }
        // vt100 is what the emulator speaks; telling the child keeps it from
        // emitting escape sequences the parser would mangle.
        command.env("TERM", "vt100");

        let mut child = pair.slave.spawn_command(command).map_err(process_error)?;
        drop(pair.slave);

        let reader = pair.master.try_clone_reader().map_err(process_error)?;
        let writer = pair.master.take_writer().map_err(process_error)?;
        let killer = child.clone_killer();
        let child_pid = child.process_id();

        let screen = Arc::new(RwLock::new(ScreenState {
            emulator,
            last_update: Instant::now(),
        }));
        spawn_drain_thread(reader, Arc::clone(&screen));

        let (exit_tx, exit_rx) = watch::channel(None);
        std::thread::spawn(move || {
            let outcome = match child.wait() {
                Ok(status) => Ok(status.exit_code()),
                Err(error) => Err(error.to_string()),
            };
            let _ = exit_tx.send(Some(outcome));
        });

        Ok(Self {
            screen,
            writer: Mutex::new(writer),
            master: Mutex::new(Some(pair.master)),
            killer: Mutex::new(killer),
            child_pid,
            exit_rx,
        })
    }

    /// Forward keystrokes to the child through the PTY.
    pub fn write(&self, data: &[u8]) -> TermResult<usize> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| TermError::Internal("pty writer lock poisoned".to_owned()))?;
        writer.write_all(data).map_err(process_error)?;
        writer.flush().map_err(process_error)?;
        Ok(data.len())
    }

    /// Render the current screen contents.
    ///
    /// Acts as a soft vsync: if the grid was updated less than 16 ms ago,
    /// wait up to two further 16 ms intervals for the repaint burst to
    /// settle, then snapshot regardless.
    pub async fn read_screen(&self) -> String {
        for _ in 0..SCREEN_QUIET_PROBES {
            {
                let state = self.screen.read().expect("screen lock poisoned");
                if state.last_update.elapsed() >= SCREEN_QUIET_WINDOW {
                    return state.emulator.contents();
                }
            }
            tokio::time::sleep(SCREEN_QUIET_WINDOW).await;
        }
        let state = self.screen.read().expect("screen lock poisoned");
        state.emulator.contents()
    }

    /// Block until the child exits. Returns [`TermError::NonZeroExit`] for
    /// non-zero exit codes.
    pub async fn wait(&self) -> TermResult<()> {
        let mut exit_rx = self.exit_rx.clone();
        let outcome = exit_rx
            .wait_for(|outcome| outcome.is_some())
            .await
            .map_err(|_| TermError::Internal("exit watcher dropped".to_owned()))?
            .clone()
            .expect("checked above");
        match outcome {
            Ok(0) => Ok(()),
            Ok(code) => Err(TermError::NonZeroExit(code)),
            Err(message) => Err(TermError::Process(format!(
                "failed to wait for agent process: {message}"
            ))),
        }
    }

    /// Interrupt the child, escalating to a forceful kill if it has not
    /// exited within `timeout`, then close the PTY. An already-exited child
    /// is not an error.
    pub async fn close(&self, timeout: Duration) -> TermResult<()> {
        tracing::info!("closing agent process");
        self.interrupt();

        let mut exit_rx = self.exit_rx.clone();
        let exited = matches!(
            tokio::time::timeout(timeout, exit_rx.wait_for(|outcome| outcome.is_some())).await,
            Ok(Ok(_))
        );
        if !exited {
            tracing::warn!("agent did not exit after interrupt; killing it");
            let mut killer = self
                .killer
                .lock()
                .map_err(|_| TermError::Internal("child killer lock poisoned".to_owned()))?;
            // The child may have been reaped between the timeout and the
            // kill; failures here are not actionable.
            if let Err(error) = killer.kill() {
                tracing::debug!(%error, "kill after close timeout failed");
            }
        }

        let mut master = self
            .master
            .lock()
            .map_err(|_| TermError::Internal("pty master lock poisoned".to_owned()))?;
        drop(master.take());
        Ok(())
    }

    #[cfg(unix)]
    fn interrupt(&self) {
        if let Some(pid) = self.child_pid {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGINT);
            }
        }
    }

    #[cfg(not(unix))]
    fn interrupt(&self) {}
}

fn spawn_drain_thread(mut reader: Box<dyn Read + Send>, screen: Arc<RwLock<ScreenState>>) {
    std::thread::spawn(move || {
        let mut buffer = [0_u8; READ_CHUNK_SIZE];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => {
                    let mut state = screen.write().expect("screen lock poisoned");
                    state.emulator.process(&buffer[..read]);
                    state.last_update = Instant::now();
                }
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => {
                    tracing::error!(%error, "error reading from pseudo terminal");
                    break;
                }
            }
        }
    });
}

use futures_util::StreamExt;
use signal_hook::consts::SIGWINCH;
use signal_hook_tokio::{Handle as SignalsHandle, Signals};
use std::io::{self, Stdout};
use std::sync::{Arc, Mutex};
use termion::raw::{IntoRawMode, RawTerminal};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

use crate::SshError;

const DEFAULT_TERM: &str = "xterm-256color";

/// The local terminal an interactive session is attached to.
pub trait Terminal: Send + Sync {
    /// Value for the remote `TERM`.
    fn term(&self) -> String;

    /// Columns and rows, or `None` when not attached to a tty.
    fn size(&self) -> Option<(u16, u16)>;

    fn enable_raw_mode(&self) -> io::Result<()>;

    fn disable_raw_mode(&self);
}

/// Process stdin/stdout via `termion`. Raw mode is skipped when stdout is not a tty.
pub struct StdTerminal {
    term: Option<String>,
    raw: Mutex<Option<RawTerminal<Stdout>>>,
}

impl StdTerminal {
    pub fn new(term: Option<String>) -> Self {
        Self {
            term,
            raw: Mutex::new(None),
        }
    }
}

impl Terminal for StdTerminal {
    fn term(&self) -> String {
        self.term.clone().unwrap_or_else(|| DEFAULT_TERM.to_string())
    }

    fn size(&self) -> Option<(u16, u16)> {
        termion::terminal_size().ok()
    }

    fn enable_raw_mode(&self) -> io::Result<()> {
        let stdout = io::stdout();
        if !termion::is_tty(&stdout) {
            return Ok(());
        }
        let raw = stdout.into_raw_mode()?;
        if let Ok(mut slot) = self.raw.lock() {
            *slot = Some(raw);
        }
        Ok(())
    }

    fn disable_raw_mode(&self) {
        // Dropping the RawTerminal restores the saved termios.
        if let Ok(mut slot) = self.raw.lock() {
            slot.take();
        }
    }
}

/// Holds the terminal in raw mode until dropped.
pub(crate) struct RawModeGuard {
    terminal: Arc<dyn Terminal>,
}

impl RawModeGuard {
    pub(crate) fn enter(terminal: Arc<dyn Terminal>) -> Result<Self, SshError> {
        terminal.enable_raw_mode().map_err(SshError::RawMode)?;
        Ok(Self { terminal })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        self.terminal.disable_raw_mode();
    }
}

/// Background task turning SIGWINCH into terminal sizes.
pub(crate) struct ResizeWatcher {
    signals: SignalsHandle,
    task: Option<JoinHandle<()>>,
}

impl ResizeWatcher {
    pub(crate) fn spawn(
        terminal: Arc<dyn Terminal>,
        sizes: mpsc::Sender<(u16, u16)>,
    ) -> Result<Self, SshError> {
        let mut signals = Signals::new([SIGWINCH]).map_err(SshError::Signals)?;
        let handle = signals.handle();

        let task = tokio::spawn(async move {
            while signals.next().await.is_some() {
                let Some(size) = terminal.size() else {
                    continue;
                };
                if sizes.send(size).await.is_err() {
                    break;
                }
            }
            debug!("Resize watcher stopped");
        });

        Ok(Self {
            signals: handle,
            task: Some(task),
        })
    }

    /// Close the signal stream and wait for the task to drain.
    pub(crate) async fn stop(mut self) {
        self.signals.close();
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                debug!(%error, "Resize watcher task failed");
            }
        }
    }
}

impl Drop for ResizeWatcher {
    fn drop(&mut self) {
        self.signals.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

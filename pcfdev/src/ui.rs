use pcfdev_vm::Ui;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::sync::Mutex;
use tracing::warn;

/// Line-oriented prompts on a pair of streams, normally the process's own.
pub struct TerminalUi<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
}

impl TerminalUi<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> TerminalUi<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> TerminalUi<R, W> {
    fn write(&self, message: &str, newline: bool) -> io::Result<()> {
        let Ok(mut output) = self.output.lock() else {
            return Err(io::Error::other("output lock poisoned"));
        };
        output.write_all(message.as_bytes())?;
        if newline {
            output.write_all(b"\n")?;
        }
        output.flush()
    }

    fn read_line(&self) -> io::Result<String> {
        let Ok(mut input) = self.input.lock() else {
            return Err(io::Error::other("input lock poisoned"));
        };
        let mut line = String::new();
        input.read_line(&mut line)?;
        Ok(line)
    }
}

impl<R: BufRead + Send, W: Write + Send> Ui for TerminalUi<R, W> {
    fn say(&self, message: &str) {
        if let Err(error) = self.write(message, true) {
            warn!(%error, "Failed to write to terminal");
        }
    }

    /// Anything but "y" or "yes" declines, including end of input.
    fn confirm(&self, message: &str) -> bool {
        let answer = self.write(message, false).and_then(|()| self.read_line());
        match answer {
            Ok(answer) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(error) => {
                warn!(%error, "Failed to read answer");
                false
            }
        }
    }
}

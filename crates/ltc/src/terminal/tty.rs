//! Line entry straight from the controlling terminal.

use std::io::{self, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::debug;

use crate::error::ExitStatus;
use crate::exit_handler::ExitHandler;

/// Reads lines from an interactive terminal.
pub trait TerminalReader: Send {
    /// Reads one line. Typed characters are echoed only with `echo`; the
    /// final Enter is never echoed.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read.
    fn read_line(&mut self, echo: bool) -> io::Result<String>;
}

/// Reads key presses from the TTY in raw mode.
///
/// Every prompt goes through here, so nothing typed ahead is left behind
/// in a stdin buffer between a username and a password. The raw-mode
/// restore callback is registered with the exit handler before raw mode
/// is entered, so an exit during entry always leaves the TTY usable.
#[derive(Debug, Clone)]
pub struct TtyReader {
    exit_handler: ExitHandler,
}

impl TtyReader {
    /// Creates a reader tied to `exit_handler`.
    #[must_use]
    pub const fn new(exit_handler: ExitHandler) -> Self {
        Self { exit_handler }
    }
}

impl TerminalReader for TtyReader {
    fn read_line(&mut self, echo: bool) -> io::Result<String> {
        self.exit_handler.on_exit(|| {
            let _ = disable_raw_mode();
        });
        enable_raw_mode()?;
        let mut out = io::stdout();
        let result = read_until_enter(&self.exit_handler, |edit| {
            if echo {
                let _ = match edit {
                    Edit::Push(c) => write!(out, "{c}"),
                    Edit::Pop => write!(out, "\u{8} \u{8}"),
                };
                let _ = out.flush();
            }
        });
        disable_raw_mode()?;
        result
    }
}

enum Edit {
    Push(char),
    Pop,
}

fn read_until_enter(exit_handler: &ExitHandler, mut on_edit: impl FnMut(Edit)) -> io::Result<String> {
    let mut line = String::new();
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }
        match code {
            KeyCode::Enter => return Ok(line),
            // Raw mode swallows SIGINT, so Ctrl-C arrives as a key press.
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                debug!("interrupt during terminal entry");
                exit_handler.exit_with(ExitStatus::SigInt);
                return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
            }
            KeyCode::Backspace => {
                if line.pop().is_some() {
                    on_edit(Edit::Pop);
                }
            }
            KeyCode::Char(c) => {
                line.push(c);
                on_edit(Edit::Push(c));
            }
            _ => {}
        }
    }
}

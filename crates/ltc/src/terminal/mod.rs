//! Terminal I/O surface.
//!
//! Every user-facing line goes through a [`Ui`]. The production
//! implementation writes to stdout and reads from stdin; tests drive a
//! [`TerminalUi`] over in-memory buffers.

pub mod colors;
pub mod cursor;
mod table;
mod tty;

use std::io::{self, BufRead, Write};

use parking_lot::Mutex;
use tracing::debug;

pub use tty::{TerminalReader, TtyReader};
pub use table::{align_columns, visible_width};

/// Line-oriented user interaction.
pub trait Ui: Send {
    /// Writes `text` as-is.
    fn say(&mut self, text: &str);

    /// Writes `text` followed by a newline.
    fn say_line(&mut self, text: &str) {
        self.say(text);
        self.say("\n");
    }

    /// Writes a bare newline.
    fn say_new_line(&mut self) {
        self.say("\n");
    }

    /// Writes a progress dot.
    fn dot(&mut self) {
        self.say(".");
    }

    /// Reports an argument error.
    fn say_incorrect_usage(&mut self, message: &str) {
        if message.is_empty() {
            self.say_line("Incorrect Usage");
        } else {
            self.say_line(&format!("Incorrect Usage: {message}"));
        }
    }

    /// Prints `text` and reads one line of input, without its line ending.
    ///
    /// # Errors
    ///
    /// Returns an error if input cannot be read.
    fn prompt(&mut self, text: &str) -> io::Result<String>;

    /// Like [`Ui::prompt`], with echo suppressed when attached to a TTY.
    ///
    /// # Errors
    ///
    /// Returns an error if input cannot be read.
    fn prompt_for_password(&mut self, text: &str) -> io::Result<String>;
}

/// [`Ui`] over a reader and a writer.
pub struct TerminalUi<R, W> {
    input: R,
    output: W,
    tty: Option<Box<dyn TerminalReader>>,
}

impl<R, W> std::fmt::Debug for TerminalUi<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalUi")
            .field("tty", &self.tty.is_some())
            .finish_non_exhaustive()
    }
}

impl<R: BufRead + Send, W: Write + Send> TerminalUi<R, W> {
    /// Creates a UI. Prompts read lines from `input` until a
    /// [`TerminalReader`] is attached.
    #[must_use]
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            tty: None,
        }
    }

    /// Reads every prompt answer through `reader` instead of `input`,
    /// with echo suppressed for passwords.
    #[must_use]
    pub fn with_tty_reader(mut self, reader: impl TerminalReader + 'static) -> Self {
        self.tty = Some(Box::new(reader));
        self
    }

    /// Everything written so far.
    #[must_use]
    pub const fn output(&self) -> &W {
        &self.output
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }

    fn read_answer(&mut self, echo: bool) -> io::Result<String> {
        match self.tty.as_mut() {
            Some(tty) => {
                let answer = tty.read_line(echo);
                self.say_new_line();
                answer
            }
            None => self.read_line(),
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> Ui for TerminalUi<R, W> {
    fn say(&mut self, text: &str) {
        let result = self
            .output
            .write_all(text.as_bytes())
            .and_then(|()| self.output.flush());
        if let Err(e) = result {
            debug!(error = %e, "failed to write to terminal");
        }
    }

    fn prompt(&mut self, text: &str) -> io::Result<String> {
        self.say(text);
        self.read_answer(true)
    }

    fn prompt_for_password(&mut self, text: &str) -> io::Result<String> {
        self.say(text);
        self.read_answer(false)
    }
}

/// [`Ui`] handle that several concurrent writers share through a lock.
///
/// Each call takes the lock for its own duration only, so lines from
/// different writers interleave but never split.
pub struct SharedUi<'a, 'u> {
    inner: &'a Mutex<&'u mut dyn Ui>,
}

impl<'a, 'u> SharedUi<'a, 'u> {
    /// Creates a handle on `inner`.
    #[must_use]
    pub const fn new(inner: &'a Mutex<&'u mut dyn Ui>) -> Self {
        Self { inner }
    }
}

impl std::fmt::Debug for SharedUi<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedUi").finish_non_exhaustive()
    }
}

impl Ui for SharedUi<'_, '_> {
    fn say(&mut self, text: &str) {
        self.inner.lock().say(text);
    }

    fn prompt(&mut self, text: &str) -> io::Result<String> {
        self.inner.lock().prompt(text)
    }

    fn prompt_for_password(&mut self, text: &str) -> io::Result<String> {
        self.inner.lock().prompt_for_password(text)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Cursor;

    use super::TerminalUi;

    /// In-memory UI used across command tests.
    pub type BufferUi = TerminalUi<Cursor<Vec<u8>>, Vec<u8>>;

    /// Creates a UI that answers prompts with `input`.
    pub fn buffer_ui(input: &str) -> BufferUi {
        TerminalUi::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    /// Everything the UI has written.
    pub fn written(ui: &BufferUi) -> String {
        String::from_utf8_lossy(ui.output()).into_owned()
    }
}

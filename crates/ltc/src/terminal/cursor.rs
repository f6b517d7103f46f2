//! Cursor movement escape sequences used for in-place redraws.

/// Moves the cursor up `lines` rows.
#[must_use]
pub fn up(lines: usize) -> String {
    format!("\x1b[{lines}A")
}

/// Clears from the cursor to the end of the line.
#[must_use]
pub const fn clear_to_end_of_line() -> &'static str {
    "\x1b[0K"
}

/// Clears from the cursor to the end of the display.
#[must_use]
pub const fn clear_to_end_of_display() -> &'static str {
    "\x1b[0J"
}

/// Hides the cursor.
#[must_use]
pub const fn hide() -> &'static str {
    "\x1b[?25l"
}

/// Shows the cursor.
#[must_use]
pub const fn show() -> &'static str {
    "\x1b[?25h"
}

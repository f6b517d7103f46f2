//! ANSI color helpers.

/// Bright red.
pub const RED: &str = "\x1b[91m";
/// Cyan.
pub const CYAN: &str = "\x1b[36m";
/// Green.
pub const GREEN: &str = "\x1b[32m";
/// Yellow.
pub const YELLOW: &str = "\x1b[33m";
/// Blue.
pub const BLUE: &str = "\x1b[34m";
/// Magenta.
pub const MAGENTA: &str = "\x1b[35m";
/// Purple, underlined.
pub const PURPLE_UNDERLINE: &str = "\x1b[35;4m";
/// Bold.
pub const BOLD: &str = "\x1b[1m";
/// Gray.
pub const GRAY: &str = "\x1b[90m";
/// Reset to the terminal's default rendition.
pub const DEFAULT: &str = "\x1b[0m";

/// Number of invisible bytes a single color wrap adds to a string.
pub const COLOR_CODE_LENGTH: usize = RED.len() + DEFAULT.len();

/// Wraps `text` in `code`. Whitespace-only text is returned as-is so
/// column padding stays intact.
#[must_use]
pub fn color_text(code: &str, text: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }
    format!("{code}{text}{DEFAULT}")
}

/// Red text.
#[must_use]
pub fn red(text: &str) -> String {
    color_text(RED, text)
}

/// Cyan text.
#[must_use]
pub fn cyan(text: &str) -> String {
    color_text(CYAN, text)
}

/// Green text.
#[must_use]
pub fn green(text: &str) -> String {
    color_text(GREEN, text)
}

/// Yellow text.
#[must_use]
pub fn yellow(text: &str) -> String {
    color_text(YELLOW, text)
}

/// Blue text.
#[must_use]
pub fn blue(text: &str) -> String {
    color_text(BLUE, text)
}

/// Magenta text.
#[must_use]
pub fn magenta(text: &str) -> String {
    color_text(MAGENTA, text)
}

/// Purple underlined text.
#[must_use]
pub fn purple_underline(text: &str) -> String {
    color_text(PURPLE_UNDERLINE, text)
}

/// Bold text.
#[must_use]
pub fn bold(text: &str) -> String {
    color_text(BOLD, text)
}

/// Gray text.
#[must_use]
pub fn gray(text: &str) -> String {
    color_text(GRAY, text)
}

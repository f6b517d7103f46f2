//! Tab-stop column alignment that ignores ANSI color codes.

use once_cell::sync::Lazy;
use regex::Regex;

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").unwrap_or_else(|_| unreachable!()));

/// Number of characters `text` occupies on screen.
#[must_use]
pub fn visible_width(text: &str) -> usize {
    ANSI_ESCAPE.replace_all(text, "").chars().count()
}

/// Aligns tab-separated cells into columns.
///
/// Each column is as wide as its widest cell plus `padding` spaces. The
/// last cell of a row is never padded.
#[must_use]
pub fn align_columns(rows: &[Vec<String>], padding: usize) -> Vec<String> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(visible_width(cell));
        }
    }

    rows.iter()
        .map(|row| {
            let mut line = String::new();
            for (i, cell) in row.iter().enumerate() {
                line.push_str(cell);
                if i + 1 < row.len() {
                    let fill = widths[i] + padding - visible_width(cell);
                    line.push_str(&" ".repeat(fill));
                }
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::colors;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| (*c).to_string()).collect()
    }

    #[test]
    fn visible_width_skips_escape_codes() {
        assert_eq!(visible_width(&colors::red("cell-1")), 6);
        assert_eq!(visible_width("\x1b[2A\x1b[0Kabc"), 3);
    }

    #[test]
    fn aligns_columns_by_widest_cell() {
        let lines = align_columns(
            &[row(&["Cells", "Zone", "Memory"]), row(&["cell-10", "z1", "128M"])],
            2,
        );
        assert_eq!(lines[0], "Cells    Zone  Memory");
        assert_eq!(lines[1], "cell-10  z1    128M");
    }

    #[test]
    fn colored_cells_align_like_plain_ones() {
        let lines = align_columns(
            &[row(&[&colors::red("ab"), "x"]), row(&["abcd", "y"])],
            1,
        );
        assert_eq!(visible_width(&lines[0]), visible_width(&lines[1]));
    }
}

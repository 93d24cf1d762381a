mod pointer;

pub use pointer::Pointer;

use std::fmt::{Debug, Formatter, Result};

const BLANK: &str = "";
const PIPE: &str = "|";
const EQUAL: &str = "=";
const HIGHLIGHT: &str = "^";

/// Describes a type that can be associated with an Error and used
/// to print a visualization.
pub trait Visual: Debug {
    /// Display the visualization by writing to the given Formatter.
    fn display(
        &self,
        formatter: &mut Formatter<'_>,
        template: Option<&str>,
        help: Option<&str>,
    ) -> Result;
}

/// Locate a byte offset within the given lines.
///
/// The line index counts bytes, because the offset is a byte position
/// in the source, while the returned column is a display width so the
/// pointer lines up under multi-byte text.
fn get_line_and_column(lines: &[&str], offset: usize) -> (usize, usize) {
    let mut n = 0;

    for (i, line) in lines.iter().enumerate() {
        let len = line.len() + 1;
        if n + len > offset {
            return (i, get_width(&line[..offset - n]));
        }
        n += len;
    }

    let length = lines.len();
    let last = lines.last().map(|line| get_width(line)).unwrap_or(0);

    (length, last)
}

/// Wrapper for UnicodeWidthStr::width.
fn get_width(s: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(s)
}

#[cfg(test)]
mod tests {
    use super::get_line_and_column;

    #[test]
    fn test_line_and_column() {
        let lines = vec!["first", "second line"];

        assert_eq!(get_line_and_column(&lines, 0), (0, 0));
        assert_eq!(get_line_and_column(&lines, 6), (1, 0));
        assert_eq!(get_line_and_column(&lines, 13), (1, 7));
    }

    #[test]
    fn test_column_counts_width_not_bytes() {
        // "héllo " is 7 bytes but 6 columns wide.
        let lines = vec!["héllo {{ name }}"];

        assert_eq!(get_line_and_column(&lines, 7), (0, 6));
    }
}

//! Virtual text display.
//!
//! The control loop composes the screen in a [`VirtualDisplay`] and flushes
//! it to the physical panel once per iteration (and right before any
//! blocking wait). Lines are fixed width, padded with spaces, and ASCII
//! only: characters the panel font cannot show are replaced with `?`.
//!
//! # Examples
//!
//! ```
//! use platescan_firmware::display::{Alignment, VirtualDisplay, align_text};
//!
//! let mut display = VirtualDisplay::new(4, 21, "TAP YOUR CARD");
//! assert_eq!(display.frame()[0], "    TAP YOUR CARD    ");
//!
//! display.show(&["USER 7", "ITEMS: 3"]);
//! assert_eq!(display.frame()[1], "      ITEMS: 3       ");
//! assert_eq!(display.frame()[3], " ".repeat(21));
//!
//! assert_eq!(align_text("USER 7", 9, Alignment::Right), "   USER 7");
//! ```

use platescan_core::constants::{DEFAULT_DISPLAY_COLUMNS, DEFAULT_DISPLAY_LINES};

/// Text alignment options for display lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Text starts at column 0, padded with spaces on the right.
    Left,
    /// Text centered, extra space on the right if the padding is odd.
    Center,
    /// Text ends at the last column, padded with spaces on the left.
    Right,
}

/// Fixed-size text buffer mirroring the status display.
#[derive(Debug, Clone)]
pub struct VirtualDisplay {
    lines: usize,
    columns: usize,
    buffer: Vec<String>,
}

impl VirtualDisplay {
    /// Create a display showing `default_message` centered on the first line.
    ///
    /// A display always has at least one line and one column.
    pub fn new(lines: usize, columns: usize, default_message: impl Into<String>) -> Self {
        let lines = lines.max(1);
        let columns = columns.max(1);
        let mut display = Self {
            lines,
            columns,
            buffer: vec![" ".repeat(columns); lines],
        };
        let message: String = default_message.into();
        display.show(&[message.as_str()]);
        display
    }

    pub fn builder() -> VirtualDisplayBuilder {
        VirtualDisplayBuilder::default()
    }

    /// Replace the whole screen, one entry per line, centered.
    ///
    /// Lines beyond the display height are dropped; missing lines are
    /// blanked.
    pub fn show(&mut self, lines: &[&str]) {
        for (index, slot) in self.buffer.iter_mut().enumerate() {
            let text = lines.get(index).copied().unwrap_or("");
            *slot = align_text(&sanitize_text(text), self.columns, Alignment::Center);
        }
    }

    /// Owned copy of the screen, ready for a [`DisplayPanel`](platescan_hardware::DisplayPanel).
    pub fn frame(&self) -> Vec<String> {
        self.buffer.clone()
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn columns(&self) -> usize {
        self.columns
    }
}

/// Builder for [`VirtualDisplay`].
///
/// # Examples
///
/// ```
/// use platescan_firmware::display::VirtualDisplay;
///
/// let display = VirtualDisplay::builder().with_size(2, 16).build();
///
/// assert_eq!(display.lines(), 2);
/// assert_eq!(display.frame()[0], " TAP YOUR CARD  ");
/// ```
#[derive(Debug)]
pub struct VirtualDisplayBuilder {
    lines: usize,
    columns: usize,
    default_message: String,
}

impl VirtualDisplayBuilder {
    pub fn with_size(mut self, lines: usize, columns: usize) -> Self {
        self.lines = lines;
        self.columns = columns;
        self
    }

    pub fn build(self) -> VirtualDisplay {
        VirtualDisplay::new(self.lines, self.columns, self.default_message)
    }
}

impl Default for VirtualDisplayBuilder {
    fn default() -> Self {
        Self {
            lines: DEFAULT_DISPLAY_LINES,
            columns: DEFAULT_DISPLAY_COLUMNS,
            default_message: "TAP YOUR CARD".to_string(),
        }
    }
}

/// Truncate text to at most `max_chars` characters.
///
/// ```
/// use platescan_firmware::display::truncate_text;
///
/// assert_eq!(truncate_text("SCANNING...", 8), "SCANNING");
/// assert_eq!(truncate_text("OK", 8), "OK");
/// ```
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Align text within a fixed width, padding with spaces.
///
/// Text longer than `width` is truncated.
///
/// ```
/// use platescan_firmware::display::{align_text, Alignment};
///
/// assert_eq!(align_text("4/5", 7, Alignment::Left), "4/5    ");
/// assert_eq!(align_text("4/5", 7, Alignment::Center), "  4/5  ");
/// assert_eq!(align_text("4/5", 7, Alignment::Right), "    4/5");
/// ```
pub fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let char_count = text.chars().count();
    if char_count >= width {
        return truncate_text(text, width);
    }

    let padding = width - char_count;
    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left_pad = padding / 2;
            let right_pad = padding - left_pad;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
        }
    }
}

/// Drop control characters, replace non-ASCII with `?`, and trim.
fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn display() -> VirtualDisplay {
        VirtualDisplay::new(4, 21, "TAP YOUR CARD")
    }

    #[test]
    fn test_new_display_with_default_message() {
        let frame = display().frame();
        assert_eq!(frame.len(), 4);
        assert_eq!(frame[0], "    TAP YOUR CARD    ");
        assert!(frame.iter().all(|line| line.len() == 21));
        assert!(frame[1..].iter().all(|line| line.trim().is_empty()));
    }

    #[test]
    fn test_text_truncated_to_columns() {
        let mut display = display();
        display.show(&["ABCDEFGHIJKLMNOPQRSTUVWXYZ"]);
        assert_eq!(display.frame()[0], "ABCDEFGHIJKLMNOPQRSTU");
    }

    #[rstest]
    #[case("HELLO", 9, Alignment::Left, "HELLO    ")]
    #[case("HELLO", 9, Alignment::Center, "  HELLO  ")]
    #[case("HELLO", 10, Alignment::Center, "  HELLO   ")]
    #[case("HELLO", 9, Alignment::Right, "    HELLO")]
    #[case("HELLO", 5, Alignment::Right, "HELLO")]
    #[case("", 3, Alignment::Center, "   ")]
    fn test_align_text(
        #[case] text: &str,
        #[case] width: usize,
        #[case] alignment: Alignment,
        #[case] expected: &str,
    ) {
        assert_eq!(align_text(text, width, alignment), expected);
    }

    #[test]
    fn test_show_replaces_screen() {
        let mut display = display();
        display.show(&["USER 7", "3 ITEMS"]);

        let frame = display.frame();
        assert_eq!(frame[0].trim(), "USER 7");
        assert_eq!(frame[1].trim(), "3 ITEMS");
        assert_eq!(frame[2].trim(), "");
    }

    #[test]
    fn test_show_drops_extra_lines() {
        let mut display = VirtualDisplay::new(2, 10, "");
        display.show(&["A", "B", "C"]);
        let frame = display.frame();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame[1].trim(), "B");
    }

    #[test]
    fn test_show_sanitizes_text() {
        let mut display = VirtualDisplay::new(1, 9, "");
        display.show(&["CAF\u{c9}\t1"]);
        assert_eq!(display.frame()[0], "  CAF?1  ");
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("  RESULT\t42%\n "), "RESULT42%");
        assert_eq!(sanitize_text("CAF\u{c9}"), "CAF?");
    }

    #[test]
    fn test_zero_size_is_clamped() {
        let display = VirtualDisplay::new(0, 0, "X");
        assert_eq!(display.lines(), 1);
        assert_eq!(display.columns(), 1);
        assert_eq!(display.frame(), vec!["X".to_string()]);
    }

    #[test]
    fn test_builder_default() {
        let display = VirtualDisplay::builder().build();
        assert_eq!(display.lines(), DEFAULT_DISPLAY_LINES);
        assert_eq!(display.columns(), DEFAULT_DISPLAY_COLUMNS);
        assert_eq!(display.frame()[0].trim(), "TAP YOUR CARD");
    }
}

//! Terminal-noise stripping (§4.B "Output hygiene"). The session keeps raw bytes around for
//! diagnostics but never hands raw bytes to a parser.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// CSI/OSC escape sequences, and the odd lone backspace/carriage-return a NOS shell emits
    /// while redrawing a line.
    static ref ANSI_ESCAPE: Regex =
        Regex::new(r"\x1b\[[0-9;?]*[a-zA-Z]|\x1b\][^\x07]*\x07|\x1b[()][A-B0-2]|[\x08]").unwrap();
}

/// Strips ANSI/terminal escape sequences and normalizes line endings to `\n`.
pub fn clean(raw: &str) -> String {
    let without_escapes = ANSI_ESCAPE.replace_all(raw, "");
    without_escapes.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_cursor_movement_and_color() {
        let raw = "\x1b[2K\x1b[1;32mLEAF-A#\x1b[0m show version\r\n";
        assert_eq!(clean(raw), "LEAF-A# show version\n");
    }

    #[test]
    fn normalizes_bare_cr() {
        assert_eq!(clean("a\rb\r\nc"), "a\nb\nc");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(clean("show lldp neighbors\n"), "show lldp neighbors\n");
    }
}

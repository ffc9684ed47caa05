//! ANSI escape stripping for PTY-flavored CLI output.

use once_cell::sync::Lazy;
use regex::Regex;

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").unwrap());

// Cursor-movement fragments that survive when the ESC byte was consumed
// elsewhere (seen in practice with the calibrate CLI's redrawn tables).
static BARE_CONTROL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(?:\d+[A-G]|2?K)").unwrap());

/// Strip ANSI escape sequences, carriage returns, and stray cursor-control
/// fragments, then trim surrounding whitespace.
pub fn clean_line(raw: &str) -> String {
    let no_escape = ANSI_ESCAPE.replace_all(raw, "");
    let no_control = BARE_CONTROL.replace_all(&no_escape, "");
    no_control.replace('\r', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_codes() {
        assert_eq!(clean_line("\x1b[32mCalibrating...\x1b[0m"), "Calibrating...");
    }

    #[test]
    fn strips_cursor_movement() {
        assert_eq!(clean_line("\x1b[8A\x1b[Kj1.pos | 1.0"), "j1.pos | 1.0");
        assert_eq!(clean_line("[8A[2Kj1.pos | 1.0"), "j1.pos | 1.0");
    }

    #[test]
    fn strips_carriage_returns_and_trims() {
        assert_eq!(clean_line("  progress 50%\r"), "progress 50%");
    }

    #[test]
    fn plain_text_untouched() {
        assert_eq!(clean_line("Press ENTER to continue..."), "Press ENTER to continue...");
    }
}

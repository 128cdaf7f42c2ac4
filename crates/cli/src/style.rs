//! Shared styling utilities for operator output.

use console::Style;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Row for a check that is switched off (dim hollow dot), aligned with the
/// ✓/✗/⚠ rows.
pub fn disabled(msg: &str) -> String {
    let style = Style::new().dim();
    format!("{} {}", style.apply_to("○"), style.apply_to(msg))
}

#[cfg(test)]
mod tests {
    use console::strip_ansi_codes;

    use super::*;

    #[test]
    fn test_rows_share_marker_layout() {
        assert_eq!(strip_ansi_codes(&success("Editor  ok")), "✓ Editor  ok");
        assert_eq!(strip_ansi_codes(&error("Editor  up")), "✗ Editor  up");
        assert_eq!(
            strip_ansi_codes(&disabled("Editor  Check disabled")),
            "○ Editor  Check disabled"
        );
    }
}

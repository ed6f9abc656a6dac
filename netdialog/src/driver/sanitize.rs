//! Output clean-up applied after a command completes.

use std::borrow::Cow;

use memchr::memchr;

use crate::channel::PatternSpec;

const BACKSPACE: u8 = 0x08;

/// Convert `\r\r\n`, `\r\n` and `\n\r` to `\n`, then any stray `\r` to `\n`.
pub fn normalize_linefeeds(text: &str) -> String {
    text.replace("\r\r\n", "\n")
        .replace("\r\n", "\n")
        .replace("\n\r", "\n")
        .replace('\r', "\n")
}

/// Undo a device repainting the echoed command line.
///
/// Some consoles redraw a long command with backspaces, which leaves the
/// completion pattern glued to the echo. When the first line holds a
/// backspace, `pattern.*$` is removed from that line only; everything after
/// the first newline is untouched. Backspace-free output is returned as is.
pub fn repaint_correction<'a>(output: &'a str, repaint: &PatternSpec) -> Cow<'a, str> {
    let end = memchr(b'\n', output.as_bytes()).unwrap_or(output.len());
    let first = &output[..end];
    if memchr(BACKSPACE, first.as_bytes()).is_none() {
        return Cow::Borrowed(output);
    }
    let fixed = repaint.regex().replace_all(first, "");
    Cow::Owned(format!("{}{}", fixed, &output[end..]))
}

/// Remove the echoed command from the top of `output`.
///
/// Backspaces are dropped first; the first line goes if it starts with the
/// command.
pub fn strip_command(command: &str, output: &str) -> String {
    let output = output.replace(BACKSPACE as char, "");
    let command = command.trim();
    if command.is_empty() {
        return output;
    }
    match output.split_once('\n') {
        Some((first, rest)) if first.trim_start().starts_with(command) => rest.to_string(),
        None if output.trim_start().starts_with(command) => String::new(),
        _ => output,
    }
}

/// Remove the trailing prompt line if it contains `base_prompt`.
pub fn strip_prompt(base_prompt: &str, output: &str) -> String {
    if base_prompt.is_empty() {
        return output.to_string();
    }
    match output.rsplit_once('\n') {
        Some((head, last)) if last.contains(base_prompt) => head.to_string(),
        None if output.contains(base_prompt) => String::new(),
        _ => output.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_linefeeds() {
        assert_eq!(normalize_linefeeds("a\r\r\nb\r\nc\n\rd\re"), "a\nb\nc\nd\ne");
    }

    #[test]
    fn test_repaint_removes_pattern_from_first_line_only() {
        let pattern = PatternSpec::new(r"RP/0/RP0/CPU0:R1\(config\)#.*$").unwrap();
        let output = "interface Gi0/0/0/0\x08\x08RP/0/RP0/CPU0:R1(config)#junk\nRP/0/RP0/CPU0:R1(config)#";
        let fixed = repaint_correction(output, &pattern);
        assert_eq!(
            fixed,
            "interface Gi0/0/0/0\x08\x08\nRP/0/RP0/CPU0:R1(config)#"
        );
    }

    #[test]
    fn test_repaint_is_identity_without_backspace() {
        let pattern = PatternSpec::new(r"R1#.*$").unwrap();
        for output in ["show clock\nR1#", "R1# tail", "", "\n\n"] {
            let once = repaint_correction(output, &pattern);
            assert!(matches!(once, Cow::Borrowed(_)));
            assert_eq!(repaint_correction(&once, &pattern), output);
        }
    }

    #[test]
    fn test_strip_command() {
        assert_eq!(strip_command("show clock", "show clock\n12:00:00 UTC\nR1#"), "12:00:00 UTC\nR1#");
        assert_eq!(strip_command("show clock", "12:00\nR1#"), "12:00\nR1#");
        assert_eq!(strip_command("sh\n", "sh\x08\x08sh\nout"), "out");
    }

    #[test]
    fn test_strip_prompt() {
        assert_eq!(strip_prompt("R1", "12:00:00 UTC\nR1#"), "12:00:00 UTC");
        assert_eq!(strip_prompt("R1", "12:00:00 UTC\nfoo"), "12:00:00 UTC\nfoo");
        assert_eq!(strip_prompt("", "x\nR1#"), "x\nR1#");
    }
}

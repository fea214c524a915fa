//! Text helpers for audit rationales and worker diagnostics.

const ELLIPSIS: &str = "...";

/// Shorten `text` to at most `max_len` bytes, appending `...` when cut.
///
/// The cut always lands on a UTF-8 boundary, so the result may be a few bytes
/// shorter than `max_len`.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len.saturating_sub(ELLIPSIS.len());
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &text[..end], ELLIPSIS)
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One-line excerpt of possibly multi-line output
pub fn excerpt(text: &str, max_len: usize) -> String {
    truncate(&single_line(text), max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_untouched() {
        assert_eq!(truncate("aggregate 4.20", 32), "aggregate 4.20");
        assert_eq!(truncate("", 0), "");
    }

    #[test]
    fn test_long_rationale_is_cut_with_ellipsis() {
        let reason = "criterion 'tone' scored 1.5, below hard floor 2.0";
        let cut = truncate(reason, 20);
        assert_eq!(cut, "criterion 'tone' ...");
        assert!(cut.len() <= 20);
    }

    #[test]
    fn test_cut_respects_char_boundaries() {
        // each 'é' is two bytes
        let cut = truncate("ééééé", 6);
        assert_eq!(cut, "é...");
        assert!(cut.is_char_boundary(cut.len()));
    }

    #[test]
    fn test_excerpt_flattens_stderr() {
        let stderr = "error: bad input\n  at line 3\n\n";
        assert_eq!(excerpt(stderr, 100), "error: bad input at line 3");
        assert_eq!(excerpt(stderr, 10), "error: ...");
    }
}

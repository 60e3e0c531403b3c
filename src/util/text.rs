use std::borrow::Cow;

/// Ellipsis appended when a string is shortened.
const ELLIPSIS: &str = "...";
/// Character count of [`ELLIPSIS`].
const ELLIPSIS_LEN: usize = 3;

/// Truncates a string to at most `max_chars` Unicode scalar values.
///
/// Chat platforms count embed field limits in characters, not bytes or
/// terminal columns, so this works on `char`s. When the string has to be
/// shortened, the last three characters of the budget are spent on `"..."`.
///
/// # Returns
///
/// - `Cow::Borrowed(s)` when the string already fits (no allocation)
/// - `Cow::Owned` with the cut string and ellipsis otherwise
/// - For `max_chars <= 3`, the first `max_chars` characters without ellipsis
///
/// # Examples
///
/// ```
/// use diffhook::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello World", 8), "Hello...");
/// assert_eq!(truncate_chars("Test", 2), "Te");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    let mut indices = s.char_indices();

    // Fast path: nth(max_chars) is None when the string has <= max_chars chars
    if indices.nth(max_chars).is_none() {
        return Cow::Borrowed(s);
    }

    if max_chars <= ELLIPSIS_LEN {
        let end = s
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(s.len());
        return Cow::Owned(s[..end].to_string());
    }

    let keep = max_chars - ELLIPSIS_LEN;
    let cut = s
        .char_indices()
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len());
    Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
}

/// Strips characters that are not allowed in XML 1.0 character data.
///
/// Diff summaries come straight out of wiki page text and occasionally
/// carry stray control bytes; the rasterizer parses its input as XML and
/// rejects the whole document on a single one of them.
///
/// Strips:
/// - C0 control chars except tab, newline and carriage return
/// - DEL (0x7F)
/// - The noncharacters U+FFFE and U+FFFF
///
/// Returns `Cow::Borrowed` when nothing needs stripping (the common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_forbidden) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|c| !is_forbidden(*c)).collect())
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{7f}')
        || c == '\u{fffe}'
        || c == '\u{ffff}'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_truncation() {
        assert_eq!(truncate_chars("Hello World", 8), "Hello...");
        assert_eq!(truncate_chars("Short", 10), "Short");
    }

    #[test]
    fn test_exact_fit_is_borrowed() {
        let result = truncate_chars("Exact", 5);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "Exact");
    }

    #[test]
    fn test_multibyte_counts_chars() {
        // 5 chars, 15 bytes: counting bytes would cut inside a codepoint
        assert_eq!(truncate_chars("日本語の本", 5), "日本語の本");
        assert_eq!(truncate_chars("日本語の本です", 5), "日本...");
    }

    #[test]
    fn test_edge_case_widths() {
        assert_eq!(truncate_chars("Test", 0), "");
        assert_eq!(truncate_chars("Test", 1), "T");
        assert_eq!(truncate_chars("Test", 3), "Tes");
        assert_eq!(truncate_chars("Testing", 4), "T...");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_strip_clean_text_is_borrowed() {
        let input = "plain text\twith tab\nand newline";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_strip_removes_controls() {
        assert_eq!(strip_control_chars("a\u{0}b\u{1b}c\u{7f}d"), "abcd");
        assert_eq!(strip_control_chars("keep\r\n"), "keep\r\n");
        assert_eq!(strip_control_chars("x\u{fffe}y"), "xy");
    }
}

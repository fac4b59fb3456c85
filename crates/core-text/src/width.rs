//! Display-width helpers.
//!
//! All layout decisions in the menu (truncation, wrapping, right-aligned counters, caret
//! placement) go through these functions so that wide characters never drift the grid.
//! Zero-width characters count as zero cells; control characters count as zero as well.

use unicode_width::UnicodeWidthChar;

fn char_width(c: char) -> usize {
    c.width().unwrap_or(0)
}

pub fn display_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// Longest prefix of `s` that fits in `cols` cells, and whether anything was cut.
pub fn truncate_to_width(s: &str, cols: usize) -> (&str, bool) {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        let w = char_width(c);
        if used + w > cols {
            return (&s[..idx], true);
        }
        used += w;
    }
    (s, false)
}

/// Split `s` into consecutive chunks of at most `cols` cells. Always yields at least one
/// chunk. A character wider than `cols` gets a chunk of its own.
pub fn wrap_to_width(s: &str, cols: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        let w = char_width(c);
        if used + w > cols && idx > start {
            out.push(&s[start..idx]);
            start = idx;
            used = 0;
        }
        used += w;
    }
    out.push(&s[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn width_counts_wide_chars() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("日本"), 4);
        assert_eq!(display_width(""), 0);
    }

    #[test]
    fn truncate_reports_cut() {
        assert_eq!(truncate_to_width("abcdef", 4), ("abcd", true));
        assert_eq!(truncate_to_width("abc", 4), ("abc", false));
        assert_eq!(truncate_to_width("日本語", 3), ("日", true));
    }

    #[test]
    fn wrap_splits_into_rows() {
        assert_eq!(wrap_to_width("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(wrap_to_width("abc", 3), vec!["abc"]);
        assert_eq!(wrap_to_width("", 3), vec![""]);
        assert_eq!(wrap_to_width("日本語", 4), vec!["日本", "語"]);
    }

    #[test]
    fn wrap_never_loops_on_narrow_width() {
        assert_eq!(wrap_to_width("日本", 1), vec!["日", "本"]);
    }
}

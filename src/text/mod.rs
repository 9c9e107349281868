//! Cleanup helpers for ragged model output.

use once_cell::sync::Lazy;
use regex::Regex;

static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|\s)(?:\d+[.)]|[-*+•▪●])\s+").expect("list marker pattern is valid"));

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Switches for [`fix_formatting`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    /// Drop every character that is not a letter or whitespace
    pub strip_non_letters: bool,
    /// Drop bullets and `1.`/`1)` style numbering
    pub strip_list_markers: bool,
}

/// Flattens multi-line model output into a single line.
///
/// Everything before the first blank line is treated as a title and dropped;
/// the remaining blocks are joined with spaces and leftover newlines become
/// spaces.
///
/// ```
/// use gguf_llama::text::{fix_formatting, FormatOptions};
///
/// let text = "Title\n\nBody line one\nBody line two";
/// assert_eq!(fix_formatting(text, FormatOptions::default()), "Body line one Body line two");
/// ```
pub fn fix_formatting(text: &str, options: FormatOptions) -> String {
    tracing::debug!("Trying to fix formatting, this might have some undesired effects");
    let mut changed = false;

    let mut fixed = if text.contains("\n\n") {
        changed = true;
        text.split("\n\n").skip(1).collect::<Vec<_>>().join(" ")
    } else {
        text.to_string()
    };

    if fixed.contains('\n') {
        fixed = fixed.replace('\n', " ");
        changed = true;
    }
    if options.strip_non_letters {
        fixed = remove_non_letters(&fixed);
        changed = true;
    }
    if options.strip_list_markers {
        fixed = remove_list_formatting(&fixed);
    }

    if changed {
        tracing::debug!("The text has been successfully modified");
    }
    fixed
}

/// Keeps letters and single spaces only.
pub fn remove_non_letters(text: &str) -> String {
    let letters: String = text
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_whitespace())
        .collect();
    collapse_whitespace(&letters)
}

/// Removes bullet points and list numbering.
pub fn remove_list_formatting(text: &str) -> String {
    let stripped = LIST_MARKER.replace_all(text, "${1}");
    collapse_whitespace(&stripped)
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_block_is_dropped() {
        let fixed = fix_formatting("Title\n\nBody line one\nBody line two", FormatOptions::default());
        assert_eq!(fixed, "Body line one Body line two");
    }

    #[test]
    fn test_blocks_after_title_are_joined() {
        let fixed = fix_formatting("Header\n\nfirst block\n\nsecond block", FormatOptions::default());
        assert_eq!(fixed, "first block second block");
    }

    #[test]
    fn test_single_newlines_only() {
        let fixed = fix_formatting("one\ntwo\nthree", FormatOptions::default());
        assert_eq!(fixed, "one two three");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(fix_formatting("already clean", FormatOptions::default()), "already clean");
    }

    #[test]
    fn test_strip_non_letters() {
        let options = FormatOptions {
            strip_non_letters: true,
            ..Default::default()
        };
        assert_eq!(fix_formatting("Hello, world!\n42 times.", options), "Hello world times");
    }

    #[test]
    fn test_strip_list_markers() {
        let options = FormatOptions {
            strip_list_markers: true,
            ..Default::default()
        };
        let fixed = fix_formatting("Steps\n\n1. mix\n2. bake\n- serve", options);
        assert_eq!(fixed, "mix bake serve");
    }

    #[test]
    fn test_list_markers_keep_hyphenated_words() {
        assert_eq!(remove_list_formatting("* well-known fact"), "well-known fact");
    }

    #[test]
    fn test_remove_non_letters_keeps_unicode_letters() {
        assert_eq!(remove_non_letters("Zürich: 3°C"), "Zürich C");
    }
}

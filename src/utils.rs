// src/utils.rs

/// Longest file stem we will produce, in characters.
pub const MAX_FILE_STEM_CHARS: usize = 150;

/// Stem used when company and role sanitize down to nothing
pub const FALLBACK_FILE_STEM: &str = "Unnamed Job Posting";

/// Collapse every run of whitespace (newlines included) into a single space
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim each line and collapse runs of blank lines into one blank line
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        out.push_str(line);
        pending_blank = false;
    }

    out
}

/// Keep at most `max_chars` characters. Returns the (possibly shortened) text and
/// whether anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

/// Turn an arbitrary label into a file stem that is valid on every common
/// platform.
pub fn sanitize_file_stem(name: &str) -> String {
    // Tabs and newlines are control characters too; keep them as word breaks
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .collect();

    let collapsed = collapse_whitespace(&cleaned);
    let (limited, _) = truncate_chars(&collapsed, MAX_FILE_STEM_CHARS);
    // Windows refuses names ending in a dot or space
    let limited = limited.trim_end_matches(['.', ' ']);

    if limited.is_empty() {
        FALLBACK_FILE_STEM.to_string()
    } else {
        limited.to_string()
    }
}

/// Normalize line endings to `\n`
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Acme \n\t Corp  "), "Acme Corp");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(
            collapse_blank_lines("  a \n\n\n   \n b\nc\n\n"),
            "a\n\nb\nc"
        );
        assert_eq!(collapse_blank_lines("\n\n  \n"), "");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), ("hé", true));
        assert_eq!(truncate_chars("héllo", 5), ("héllo", false));
        assert_eq!(truncate_chars("", 3), ("", false));
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(
            sanitize_file_stem("Acme Corp - Backend Engineer"),
            "Acme Corp - Backend Engineer"
        );
        assert_eq!(
            sanitize_file_stem("A/B: \"Test\" <Co> - Dev|Ops?*"),
            "AB Test Co - DevOps"
        );
        assert_eq!(sanitize_file_stem("Acme\n -\tDev"), "Acme - Dev");
        assert_eq!(sanitize_file_stem("Acme - Senior\tDeveloper"), "Acme - Senior Developer");
        assert_eq!(sanitize_file_stem("Acme\u{7}Corp - Dev"), "AcmeCorp - Dev");
        assert_eq!(sanitize_file_stem("???"), FALLBACK_FILE_STEM);
        assert_eq!(sanitize_file_stem("Acme Inc."), "Acme Inc");
    }

    #[test]
    fn test_sanitize_file_stem_limits_length() {
        let long = "x".repeat(400);
        assert_eq!(sanitize_file_stem(&long).chars().count(), MAX_FILE_STEM_CHARS);
    }

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\r\nb\rc\n"), "a\nb\nc\n");
    }
}

//! Recognizers for tool-result framing and "@"-mention envelopes
//!
//! File bodies enter the conversation in a few fixed textual shapes: the
//! two-block result of a file tool call, and the `<file_content>` envelopes
//! the mention pre-processor injects into a user message. These recognizers
//! identify those shapes so duplicated bodies can be replaced without
//! touching anything around them.

use std::sync::LazyLock;

use regex::Regex;

/// File tools whose results embed a complete copy of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileTool {
    Read,
    Write,
    Replace,
}

static TOOL_RESULT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(read_file|write_to_file|replace_in_file) for '([^']+)'\] Result:\n?$").unwrap()
});

static FILE_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)(<file_content path="([^"]*)">).*?(</file_content>)"#).unwrap()
});

static FINAL_FILE_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)(<final_file_content path="[^"]*">).*?(</final_file_content>)"#).unwrap()
});

/// Parse the first block of a user message as a tool-result header.
///
/// The header must match exactly (an optional trailing newline aside);
/// anything else is not a tool call.
pub(crate) fn parse_tool_result_header(text: &str) -> Option<(FileTool, &str)> {
    let caps = TOOL_RESULT_HEADER.captures(text)?;
    let tool = match caps.get(1)?.as_str() {
        "read_file" => FileTool::Read,
        "write_to_file" => FileTool::Write,
        "replace_in_file" => FileTool::Replace,
        _ => return None,
    };
    Some((tool, caps.get(2)?.as_str()))
}

/// One `<file_content>` envelope found in a block of text
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MentionMatch {
    /// Path attribute of the envelope
    pub path: String,
    /// The entire envelope, exactly as it appears in the block
    pub envelope: String,
    /// The opening tag, preserved verbatim for rewrites
    open: String,
}

impl MentionMatch {
    /// The envelope with its body swapped for `body`, tags untouched
    pub fn with_body(&self, body: &str) -> String {
        format!("{}{}</file_content>", self.open, body)
    }
}

/// Find every mention envelope in a block of text.
///
/// Several envelopes may coexist in one block, one per mentioned path.
pub(crate) fn find_file_mentions(text: &str) -> Vec<MentionMatch> {
    FILE_CONTENT
        .captures_iter(text)
        .map(|caps| MentionMatch {
            path: caps[2].to_string(),
            envelope: caps[0].to_string(),
            open: caps[1].to_string(),
        })
        .collect()
}

/// Replace the body of the first `<final_file_content>` envelope in a block,
/// leaving the tags and any surrounding text untouched.
///
/// Returns `None` when the block carries no envelope, which happens when the
/// user rejected the edit.
pub(crate) fn replace_final_file_body(text: &str, body: &str) -> Option<String> {
    let caps = FINAL_FILE_CONTENT.captures(text)?;
    let whole = caps.get(0)?;
    let open = caps.get(1)?.as_str();
    let close = caps.get(2)?.as_str();

    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..whole.start()]);
    out.push_str(open);
    out.push_str(body);
    out.push_str(close);
    out.push_str(&text[whole.end()..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Tool-result headers ---

    #[test]
    fn test_header_read_file() {
        let parsed = parse_tool_result_header("[read_file for 'src/main.rs'] Result:");
        assert_eq!(parsed, Some((FileTool::Read, "src/main.rs")));
    }

    #[test]
    fn test_header_trailing_newline_optional() {
        let parsed = parse_tool_result_header("[write_to_file for 'a.txt'] Result:\n");
        assert_eq!(parsed, Some((FileTool::Write, "a.txt")));
    }

    #[test]
    fn test_header_replace_in_file() {
        let parsed = parse_tool_result_header("[replace_in_file for 'b.txt'] Result:");
        assert_eq!(parsed, Some((FileTool::Replace, "b.txt")));
    }

    #[test]
    fn test_header_rejects_other_tools() {
        assert!(parse_tool_result_header("[execute_command for 'ls'] Result:").is_none());
    }

    #[test]
    fn test_header_rejects_extra_text() {
        assert!(parse_tool_result_header("[read_file for 'a.txt'] Result: ok").is_none());
        assert!(parse_tool_result_header("x[read_file for 'a.txt'] Result:").is_none());
        assert!(parse_tool_result_header("[read_file for 'a.txt'] Result:\n\n").is_none());
    }

    // --- Mention envelopes ---

    #[test]
    fn test_find_mentions_multiple_paths() {
        let text = "see <file_content path=\"a.txt\">alpha</file_content> and \
                    <file_content path=\"b.txt\">beta</file_content>";
        let mentions = find_file_mentions(text);
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[0].path, "a.txt");
        assert_eq!(
            mentions[0].envelope,
            "<file_content path=\"a.txt\">alpha</file_content>"
        );
        assert_eq!(mentions[1].path, "b.txt");
    }

    #[test]
    fn test_mention_body_spans_lines() {
        let text = "<file_content path=\"a.txt\">line1\nline2\n</file_content>";
        let mentions = find_file_mentions(text);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].envelope, text);
    }

    #[test]
    fn test_mention_with_body_preserves_tags() {
        let mentions = find_file_mentions("<file_content path=\"a.txt\">alpha</file_content>");
        assert_eq!(
            mentions[0].with_body("gone"),
            "<file_content path=\"a.txt\">gone</file_content>"
        );
    }

    #[test]
    fn test_no_mentions_in_plain_text() {
        assert!(find_file_mentions("just some text").is_empty());
    }

    // --- final_file_content envelopes ---

    #[test]
    fn test_replace_final_file_body_keeps_surroundings() {
        let text = "The edit was applied.\n\
                    <final_file_content path=\"src/lib.rs\">old\ncontents</final_file_content>\n\
                    Done.";
        let replaced = replace_final_file_body(text, "notice").unwrap();
        assert_eq!(
            replaced,
            "The edit was applied.\n\
             <final_file_content path=\"src/lib.rs\">notice</final_file_content>\n\
             Done."
        );
    }

    #[test]
    fn test_replace_final_file_body_absent_envelope() {
        assert!(replace_final_file_body("The user rejected this edit.", "notice").is_none());
    }
}

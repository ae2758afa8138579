//! Duplicate file-read detection
//!
//! A single pass over the in-range conversation that finds file bodies
//! appearing more than once, in tool results and in mention envelopes, and
//! plans the rewrites that will keep only the most recent copy intact.

use std::collections::{BTreeMap, HashMap};

use tern_ai::{Content, Message};

use crate::history::{ContextHistory, EditType};
use crate::notice::NoticeProvider;
use crate::parse::{FileTool, find_file_mentions, parse_tool_result_header, replace_final_file_body};

/// Block index that carries the file body in a result or mention message.
/// Replacements only ever apply where the recorded search text still matches,
/// so a body living elsewhere is simply never rewritten.
pub(crate) const FILE_BLOCK: usize = 1;

/// One occurrence of a file body that can be rewritten
#[derive(Debug, Clone)]
pub(crate) struct FileReadOccurrence {
    pub message_index: usize,
    pub edit_type: EditType,
    /// Exact text to replace; empty means the whole block
    pub search: String,
    /// Text that takes its place
    pub replacement: String,
}

/// Everything one detector pass learned about the conversation
#[derive(Debug, Default)]
pub(crate) struct DuplicateScan {
    /// Candidate occurrences grouped by file path, in message order
    pub file_reads: BTreeMap<String, Vec<FileReadOccurrence>>,
    /// Every mention path present per message, replaced or not
    pub mention_paths: HashMap<usize, Vec<String>>,
}

/// Scan `[start_from, len)` for file bodies that may be duplicates.
///
/// Messages already rewritten in a previous pass are skipped via their
/// recorded edit type; partially rewritten mention blocks contribute only
/// their still-intact envelopes.
pub(crate) fn scan_file_reads(
    messages: &[Message],
    history: &ContextHistory,
    start_from: usize,
    notices: &dyn NoticeProvider,
) -> DuplicateScan {
    let mut scan = DuplicateScan::default();

    for (index, message) in messages.iter().enumerate().skip(start_from) {
        let Message::User { content, .. } = message else {
            continue;
        };
        if content.is_empty() {
            continue;
        }

        // Shortcut via prior edits: non-mention entries are already fully
        // optimized; mention entries may still have envelopes left.
        let mut already_replaced: Vec<String> = Vec::new();
        if let Some(edits) = history.get(index) {
            if edits.edit_type != EditType::FileMention {
                continue;
            }
            if let Some(update) = edits.blocks.get(&FILE_BLOCK).and_then(|u| u.last()) {
                let replaced = update.metadata.first().cloned().unwrap_or_default();
                let all = update.metadata.get(1).cloned().unwrap_or_default();
                if replaced.len() == all.len() {
                    continue;
                }
                already_replaced = replaced;
            }
        }

        let Some(first_text) = content.first().and_then(Content::as_text) else {
            continue;
        };

        if let Some((tool, path)) = parse_tool_result_header(first_text) {
            let Some(body_text) = content.get(FILE_BLOCK).and_then(Content::as_text) else {
                continue;
            };
            match tool {
                FileTool::Read => {
                    scan.file_reads
                        .entry(path.to_string())
                        .or_default()
                        .push(FileReadOccurrence {
                            message_index: index,
                            edit_type: EditType::ReadFileTool,
                            search: String::new(),
                            replacement: notices.duplicate_file_read_notice(),
                        });
                }
                FileTool::Write | FileTool::Replace => {
                    // An absent envelope means the user rejected the edit.
                    if let Some(replacement) =
                        replace_final_file_body(body_text, &notices.duplicate_file_read_notice())
                    {
                        scan.file_reads
                            .entry(path.to_string())
                            .or_default()
                            .push(FileReadOccurrence {
                                message_index: index,
                                edit_type: EditType::AlterFileTool,
                                search: String::new(),
                                replacement,
                            });
                    }
                }
            }
        } else if let Some(body_text) = content.get(FILE_BLOCK).and_then(Content::as_text) {
            let mentions = find_file_mentions(body_text);
            if mentions.is_empty() {
                continue;
            }
            let mut paths = Vec::with_capacity(mentions.len());
            for mention in &mentions {
                paths.push(mention.path.clone());
                if already_replaced.contains(&mention.path) {
                    continue;
                }
                scan.file_reads
                    .entry(mention.path.clone())
                    .or_default()
                    .push(FileReadOccurrence {
                        message_index: index,
                        edit_type: EditType::FileMention,
                        search: mention.envelope.clone(),
                        replacement: mention.with_body(&notices.duplicate_file_read_notice()),
                    });
            }
            scan.mention_paths.insert(index, paths);
        }
    }

    scan
}

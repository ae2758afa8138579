//! Application of duplicate-read rewrites to the edit history
//!
//! Turns a detector scan into timestamped updates. Tool-result blocks get a
//! single whole-block replacement. Mention blocks are rewritten through a
//! per-message text cache so that several mentions in one message compose,
//! both within one pass and across passes.

use std::collections::{HashMap, HashSet};

use tern_ai::{Content, Message};

use crate::dedup::{DuplicateScan, FILE_BLOCK};
use crate::history::{ContextHistory, ContextUpdate, EditType};

/// Result of applying one detector scan
#[derive(Debug, Default)]
pub(crate) struct OptimizeOutcome {
    /// Whether any update was recorded
    pub changed: bool,
    /// Message indices that received an update in this pass
    pub updated: HashSet<usize>,
}

/// Rewrite every occurrence of a duplicated file body except the last one.
///
/// The most recent copy stays intact as the authoritative view of the file.
pub(crate) fn apply_duplicate_updates(
    history: &mut ContextHistory,
    scan: DuplicateScan,
    messages: &[Message],
    timestamp: i64,
) -> OptimizeOutcome {
    let mut outcome = OptimizeOutcome::default();
    // Per-message rewrite state for mention blocks: (current text, replaced paths)
    let mut mention_state: HashMap<usize, (String, Vec<String>)> = HashMap::new();

    for (path, occurrences) in &scan.file_reads {
        if occurrences.len() < 2 {
            continue;
        }
        for occurrence in &occurrences[..occurrences.len() - 1] {
            match occurrence.edit_type {
                EditType::ReadFileTool | EditType::AlterFileTool => {
                    history.push_update(
                        occurrence.message_index,
                        occurrence.edit_type,
                        FILE_BLOCK,
                        ContextUpdate::text(timestamp, occurrence.replacement.clone()),
                    );
                    outcome.updated.insert(occurrence.message_index);
                }
                EditType::FileMention => {
                    if !mention_state.contains_key(&occurrence.message_index) {
                        let seed = match history.latest(occurrence.message_index, FILE_BLOCK) {
                            Some(update) => (
                                update.content.first().cloned().unwrap_or_default(),
                                update.metadata.first().cloned().unwrap_or_default(),
                            ),
                            None => (
                                original_block_text(messages, occurrence.message_index),
                                Vec::new(),
                            ),
                        };
                        mention_state.insert(occurrence.message_index, seed);
                    }
                    if let Some((text, replaced)) =
                        mention_state.get_mut(&occurrence.message_index)
                    {
                        *text = text.replacen(&occurrence.search, &occurrence.replacement, 1);
                        replaced.push(path.clone());
                    }
                }
                EditType::Undefined | EditType::NoFileRead => {}
            }
        }
    }

    // One coalesced update per mention message rewritten in this pass.
    for (message_index, (text, replaced)) in mention_state {
        let all_paths = scan
            .mention_paths
            .get(&message_index)
            .cloned()
            .unwrap_or_default();
        history.push_update(
            message_index,
            EditType::FileMention,
            FILE_BLOCK,
            ContextUpdate {
                timestamp,
                kind: "text".to_string(),
                content: vec![text],
                metadata: vec![replaced, all_paths],
            },
        );
        outcome.updated.insert(message_index);
    }

    outcome.changed = !outcome.updated.is_empty();
    outcome
}

fn original_block_text(messages: &[Message], message_index: usize) -> String {
    messages
        .get(message_index)
        .and_then(|m| m.content().get(FILE_BLOCK))
        .and_then(Content::as_text)
        .map(str::to_string)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::scan_file_reads;
    use crate::notice::{NoticeProvider, StandardNotices};
    use tern_ai::Message;

    fn read_result(path: &str, body: &str) -> Message {
        Message::user_with_content(vec![
            Content::text(format!("[read_file for '{path}'] Result:")),
            Content::text(body),
        ])
    }

    fn mention_msg(body: &str) -> Message {
        Message::user_with_content(vec![Content::text("User request"), Content::text(body)])
    }

    fn run_pass(
        history: &mut ContextHistory,
        messages: &[Message],
        timestamp: i64,
    ) -> OptimizeOutcome {
        let scan = scan_file_reads(messages, history, 2, &StandardNotices);
        apply_duplicate_updates(history, scan, messages, timestamp)
    }

    #[test]
    fn test_single_occurrence_is_untouched() {
        let messages = vec![
            Message::user("task"),
            Message::assistant("ok"),
            read_result("a.txt", "contents"),
        ];
        let mut history = ContextHistory::new();
        let outcome = run_pass(&mut history, &messages, 100);
        assert!(!outcome.changed);
        assert!(history.is_empty());
    }

    #[test]
    fn test_last_read_occurrence_is_kept() {
        let messages = vec![
            Message::user("task"),
            Message::assistant("ok"),
            read_result("a.txt", "v1"),
            Message::assistant("ok"),
            read_result("a.txt", "v2"),
            Message::assistant("ok"),
            read_result("a.txt", "v3"),
        ];
        let mut history = ContextHistory::new();
        let outcome = run_pass(&mut history, &messages, 100);
        assert!(outcome.changed);
        assert_eq!(outcome.updated, HashSet::from([2, 4]));
        assert_eq!(
            history.latest(2, 1).unwrap().replacement_text(),
            Some(StandardNotices.duplicate_file_read_notice().as_str())
        );
        assert!(history.latest(6, 1).is_none());
        assert_eq!(history.get(2).unwrap().edit_type, EditType::ReadFileTool);
    }

    #[test]
    fn test_mention_rewrites_compose_within_one_pass() {
        let body = "<file_content path=\"a.txt\">alpha</file_content>\
                    <file_content path=\"b.txt\">beta</file_content>";
        let messages = vec![
            Message::user("task"),
            Message::assistant("ok"),
            mention_msg(body),
            Message::assistant("ok"),
            read_result("a.txt", "newer a"),
            Message::assistant("ok"),
            read_result("b.txt", "newer b"),
        ];
        let mut history = ContextHistory::new();
        run_pass(&mut history, &messages, 100);

        // Both envelopes rewritten in a single coalesced update.
        let update = history.latest(2, 1).unwrap();
        let text = update.replacement_text().unwrap();
        assert!(!text.contains("alpha"));
        assert!(!text.contains("beta"));
        assert_eq!(update.metadata[0].len(), 2);
        assert_eq!(update.metadata[1], vec!["a.txt", "b.txt"]);
        // The newest reads stay intact.
        assert!(history.latest(4, 1).is_none());
        assert!(history.latest(6, 1).is_none());
    }

    #[test]
    fn test_mention_partial_then_full_across_passes() {
        let body = "<file_content path=\"a.txt\">alpha</file_content>\
                    <file_content path=\"b.txt\">beta</file_content>";
        let mut messages = vec![
            Message::user("task"),
            Message::assistant("ok"),
            mention_msg(body),
            Message::assistant("ok"),
            read_result("a.txt", "newer a"),
        ];
        let mut history = ContextHistory::new();
        run_pass(&mut history, &messages, 100);

        let update = history.latest(2, 1).unwrap();
        assert_eq!(update.metadata[0], vec!["a.txt"]);
        assert_eq!(update.metadata[1], vec!["a.txt", "b.txt"]);
        let text = update.replacement_text().unwrap().to_string();
        assert!(!text.contains("alpha"));
        assert!(text.contains("beta"));

        // A later read of b.txt makes the remaining envelope a duplicate.
        messages.push(Message::assistant("ok"));
        messages.push(read_result("b.txt", "newer b"));
        run_pass(&mut history, &messages, 200);

        let update = history.latest(2, 1).unwrap();
        assert_eq!(update.timestamp, 200);
        assert_eq!(update.metadata[0].len(), 2);
        assert_eq!(update.metadata[1], vec!["a.txt", "b.txt"]);
        let text = update.replacement_text().unwrap();
        assert!(!text.contains("alpha"));
        assert!(!text.contains("beta"));

        // A third pass finds nothing left to do.
        let outcome = run_pass(&mut history, &messages, 300);
        assert!(!outcome.changed);
        assert_eq!(history.get(2).unwrap().blocks[&1].len(), 2);
    }

    #[test]
    fn test_repeat_pass_adds_no_updates() {
        let messages = vec![
            Message::user("task"),
            Message::assistant("ok"),
            read_result("a.txt", "v1"),
            Message::assistant("ok"),
            read_result("a.txt", "v2"),
        ];
        let mut history = ContextHistory::new();
        run_pass(&mut history, &messages, 100);
        let snapshot = history.clone();

        let outcome = run_pass(&mut history, &messages, 200);
        assert!(!outcome.changed);
        assert_eq!(history, snapshot);
    }
}

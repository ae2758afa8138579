//! The context manager orchestrator
//!
//! Runs once before every model call. When the previous request approached
//! the model's window, duplicated file reads are replaced with notices; if
//! that recovers too little, the next truncation range is planned. All edits
//! land in the persistent history (the caller's conversation is never
//! modified), and the outbound view is assembled last.

use std::path::Path;

use tern_ai::{Content, Message, Usage};

use crate::dedup::scan_file_reads;
use crate::history::{ContextHistory, ContextUpdate, EditType};
use crate::notice::NoticeProvider;
use crate::optimize::apply_duplicate_updates;
use crate::oracle::WindowOracle;
use crate::savings::character_savings_ratio;
use crate::truncation::{KeepRatio, next_truncation_range};

/// Minimum fraction of characters deduplication must recover to skip truncation
const SAVINGS_THRESHOLD: f64 = 0.3;

/// An entry in the task's request timeline, as recorded by the agent loop
#[derive(Debug, Clone)]
pub struct RequestRecord {
    /// JSON accounting payload of the request
    pub text: String,
}

impl RequestRecord {
    /// Create a record from its accounting payload
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Outcome of preparing the conversation for one model call
#[derive(Debug, Clone)]
pub struct PreparedContext {
    /// Inclusive range of message indices elided from the view
    pub deleted_range: Option<(usize, usize)>,
    /// Whether the range changed during this preparation
    pub range_updated: bool,
    /// The messages to send
    pub messages: Vec<Message>,
}

/// Per-task conversation context manager.
///
/// One instance per task; only this type mutates the edit history, and
/// callers must not overlap calls for the same task.
#[derive(Debug, Default)]
pub struct ContextManager {
    history: ContextHistory,
}

impl ContextManager {
    /// Create a manager with an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the history persisted in `task_dir`
    pub async fn load(task_dir: &Path) -> Self {
        Self {
            history: ContextHistory::load(task_dir).await,
        }
    }

    /// The recorded edit history
    pub fn history(&self) -> &ContextHistory {
        &self.history
    }

    /// Prepare the conversation for the next model call.
    ///
    /// `previous_request_index` points into `request_log` at the accounting
    /// entry of the prior request; unparseable accounting skips the window
    /// check entirely. The history is persisted only when this call changed
    /// it.
    #[allow(clippy::too_many_arguments)]
    pub async fn prepare_context(
        &mut self,
        conversation: &[Message],
        request_log: &[RequestRecord],
        previous_request_index: Option<usize>,
        deleted_range: Option<(usize, usize)>,
        oracle: &dyn WindowOracle,
        notices: &dyn NoticeProvider,
        timestamp: i64,
        task_dir: &Path,
    ) -> PreparedContext {
        let mut range = deleted_range;
        let mut range_updated = false;
        let mut history_changed = false;

        if let Some(total_tokens) = previous_request_tokens(request_log, previous_request_index) {
            let max_allowed = oracle.max_allowed_size().await;
            if total_tokens >= max_allowed {
                tracing::warn!(
                    "previous request used {total_tokens} of {max_allowed} allowed tokens, \
                     optimizing context"
                );
                let keep = if total_tokens / 2 > max_allowed {
                    KeepRatio::Quarter
                } else {
                    KeepRatio::Half
                };
                let start_of_rest = range.map_or(2, |(_, end)| end + 1);

                let scan = scan_file_reads(conversation, &self.history, start_of_rest, notices);
                let outcome =
                    apply_duplicate_updates(&mut self.history, scan, conversation, timestamp);
                history_changed |= outcome.changed;

                let ratio =
                    character_savings_ratio(conversation, range, &self.history, &outcome.updated);
                if ratio < SAVINGS_THRESHOLD {
                    let (start, end) = next_truncation_range(conversation, range, keep);
                    // A backwards range means there is nothing left to drop;
                    // in that case the notice must not be recorded either.
                    if end >= start_of_rest && end < conversation.len() {
                        history_changed |= self.insert_truncation_notice(notices, timestamp);
                        range = Some((start, end));
                        range_updated = true;
                    }
                }
            }
        }

        if history_changed {
            if let Err(err) = self.history.save(task_dir).await {
                tracing::warn!("failed to persist context history: {err}");
            }
        }

        PreparedContext {
            deleted_range: range,
            range_updated,
            messages: self.build_view(conversation, range),
        }
    }

    /// Roll the history back to `timestamp` and persist the result.
    ///
    /// Called when the agent rewinds to an earlier checkpoint.
    pub async fn rewind_to(&mut self, timestamp: i64, task_dir: &Path) {
        self.history.truncate_at(timestamp);
        if let Err(err) = self.history.save(task_dir).await {
            tracing::warn!("failed to persist context history: {err}");
        }
    }

    /// Record the history-removed notice on the first assistant message,
    /// once per task.
    fn insert_truncation_notice(&mut self, notices: &dyn NoticeProvider, timestamp: i64) -> bool {
        if self.history.contains(1) {
            return false;
        }
        self.history.push_update(
            1,
            EditType::Undefined,
            0,
            ContextUpdate::text(timestamp, notices.context_truncation_notice()),
        );
        true
    }

    /// Assemble the outbound message list: the first pair plus everything
    /// after the deleted range, with the latest recorded replacement applied
    /// per block to cloned messages.
    fn build_view(
        &self,
        conversation: &[Message],
        range: Option<(usize, usize)>,
    ) -> Vec<Message> {
        let start_of_rest = range.map_or(2, |(_, end)| end + 1);

        let head = 0..conversation.len().min(2);
        let rest = start_of_rest.min(conversation.len())..conversation.len();
        head.chain(rest)
            .map(|index| self.patched_message(index, &conversation[index]))
            .collect()
    }

    fn patched_message(&self, index: usize, message: &Message) -> Message {
        let Some(edits) = self.history.get(index) else {
            return message.clone();
        };
        let mut message = message.clone();
        let content = message.content_mut();
        for (block_index, updates) in &edits.blocks {
            let Some(text) = updates.last().and_then(ContextUpdate::replacement_text) else {
                continue;
            };
            if let Some(Content::Text { text: block_text }) = content.get_mut(*block_index) {
                *block_text = text.to_string();
            }
        }
        message
    }
}

fn previous_request_tokens(
    request_log: &[RequestRecord],
    previous_request_index: Option<usize>,
) -> Option<u64> {
    let record = request_log.get(previous_request_index?)?;
    let usage: Usage = serde_json::from_str(&record.text).ok()?;
    Some(usage.total())
}

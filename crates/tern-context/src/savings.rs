//! Character accounting for the optimization pass
//!
//! Measures how much of the in-range conversation the duplicate rewrites
//! recovered, as a fraction of characters. The orchestrator uses the ratio
//! to decide whether a hard truncation is still required.

use std::collections::HashSet;

use tern_ai::{Content, Message};

use crate::history::{ContextHistory, ContextUpdate};

/// Fraction of characters saved over the retained regions: the first
/// user/assistant pair plus everything after the deleted range.
///
/// Blocks updated in the current pass count their pre-rewrite length toward
/// the total and the shrinkage toward the savings; blocks rewritten in
/// earlier passes count only their current (already shrunk) length.
pub(crate) fn character_savings_ratio(
    messages: &[Message],
    deleted_range: Option<(usize, usize)>,
    history: &ContextHistory,
    updated: &HashSet<usize>,
) -> f64 {
    let start_of_rest = deleted_range.map_or(2, |(_, end)| end + 1);

    let mut total: u64 = 0;
    let mut saved: u64 = 0;

    let head = 0..messages.len().min(2);
    let rest = start_of_rest.min(messages.len())..messages.len();
    for index in head.chain(rest) {
        count_message(
            index,
            &messages[index],
            history,
            updated,
            &mut total,
            &mut saved,
        );
    }

    if total == 0 {
        0.0
    } else {
        saved as f64 / total as f64
    }
}

fn count_message(
    index: usize,
    message: &Message,
    history: &ContextHistory,
    updated: &HashSet<usize>,
    total: &mut u64,
    saved: &mut u64,
) {
    for (block_index, block) in message.content().iter().enumerate() {
        match block {
            Content::Image { data, .. } => *total += data.len() as u64,
            Content::Text { text } => {
                let updates = history
                    .get(index)
                    .and_then(|edits| edits.blocks.get(&block_index))
                    .filter(|updates| !updates.is_empty());
                let Some(updates) = updates else {
                    *total += text.len() as u64;
                    continue;
                };

                let latest_len = update_text_len(updates.last());
                if updated.contains(&index) {
                    let original_len = if updates.len() >= 2 {
                        update_text_len(updates.get(updates.len() - 2))
                    } else {
                        text.len() as u64
                    };
                    *total += original_len;
                    *saved += original_len.saturating_sub(latest_len);
                } else {
                    *total += latest_len;
                }
            }
        }
    }
}

fn update_text_len(update: Option<&ContextUpdate>) -> u64 {
    update
        .and_then(|u| u.content.first())
        .map_or(0, |text| text.len() as u64)
}

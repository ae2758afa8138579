//! Truncation range planning
//!
//! When optimization alone cannot bring a conversation back under the
//! window, a prefix of the older history is dropped. The first
//! user/assistant pair is always retained, and the range ends on a user
//! message so the first message after the gap is an assistant message.

use tern_ai::Message;

/// First message index eligible for deletion; indices 0 and 1 are kept
const FIRST_REMOVABLE: usize = 2;

/// How much of the remaining conversation to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeepRatio {
    Half,
    Quarter,
}

/// Compute the next inclusive deletion range.
///
/// The range always starts at index 2 and extends any existing range; the
/// removal count is even by construction, then shrunk by one if needed so
/// the last removed message is a user message.
pub(crate) fn next_truncation_range(
    messages: &[Message],
    current: Option<(usize, usize)>,
    keep: KeepRatio,
) -> (usize, usize) {
    let start_of_rest = current.map_or(FIRST_REMOVABLE, |(_, end)| end + 1);
    let remaining = messages.len().saturating_sub(start_of_rest);

    let to_remove = match keep {
        KeepRatio::Half => remaining / 4 * 2,
        KeepRatio::Quarter => remaining * 3 / 8 * 2,
    };

    let mut end = (start_of_rest + to_remove).saturating_sub(1);
    if let Some(message) = messages.get(end) {
        if !message.is_user() {
            end = end.saturating_sub(1);
        }
    }

    (FIRST_REMOVABLE, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Strictly alternating conversation: even indices user, odd assistant
    fn alternating(len: usize) -> Vec<Message> {
        (0..len)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("user {i}"))
                } else {
                    Message::assistant(format!("assistant {i}"))
                }
            })
            .collect()
    }

    #[test]
    fn test_half_removes_half_of_the_rest() {
        // 100 in-range messages: 2 * floor(100 / 4) = 50 removed
        let messages = alternating(102);
        let (start, end) = next_truncation_range(&messages, None, KeepRatio::Half);
        assert_eq!(start, 2);
        // 2 + 50 - 1 = 51 is an assistant message, so the end backs up to 50
        assert_eq!(end, 50);
        assert!(messages[end].is_user());
        assert!(messages[end + 1].is_assistant());
    }

    #[test]
    fn test_quarter_removes_three_quarters_of_the_rest() {
        // 100 in-range messages: 2 * floor(100 * 3 / 8) = 74 removed
        let messages = alternating(102);
        let (start, end) = next_truncation_range(&messages, None, KeepRatio::Quarter);
        assert_eq!(start, 2);
        // 2 + 74 - 1 = 75 is an assistant message, so the end backs up to 74
        assert_eq!(end, 74);
        assert!(messages[end + 1].is_assistant());
    }

    #[test]
    fn test_range_extends_existing_range() {
        let messages = alternating(102);
        let (start, end) = next_truncation_range(&messages, Some((2, 50)), KeepRatio::Half);
        assert_eq!(start, 2);
        // start of rest = 51, remaining = 51, to_remove = 2 * 12 = 24,
        // end = 51 + 24 - 1 = 74, already a user message
        assert_eq!(end, 74);
        assert!(end > 50);
        assert!(messages[end].is_user());
        assert!(messages[end + 1].is_assistant());
    }

    #[test]
    fn test_tiny_remainder_yields_empty_range() {
        // 3 in-range messages: half => to_remove = 0, end = 1 < start
        let messages = alternating(5);
        let (start, end) = next_truncation_range(&messages, None, KeepRatio::Half);
        assert_eq!(start, 2);
        assert!(end < start);
    }

    #[test]
    fn test_message_after_range_is_assistant() {
        for len in [6, 10, 20, 21, 40, 101] {
            let messages = alternating(len);
            for keep in [KeepRatio::Half, KeepRatio::Quarter] {
                let (start, end) = next_truncation_range(&messages, None, keep);
                if end >= start {
                    assert!(
                        messages[end + 1].is_assistant(),
                        "len {len}, keep {keep:?}: message after {end} must be assistant"
                    );
                }
            }
        }
    }
}

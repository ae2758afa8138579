//! Replacement notice strings
//!
//! The texts substituted into the outbound conversation come from the
//! embedding application; the manager treats them as opaque.

/// Provides the notice strings substituted into the outbound conversation
pub trait NoticeProvider: Send + Sync {
    /// Replaces the body of a duplicated file read
    fn duplicate_file_read_notice(&self) -> String;

    /// Inserted into the first assistant message when older history is removed
    fn context_truncation_notice(&self) -> String;
}

/// Built-in notice wording
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardNotices;

impl NoticeProvider for StandardNotices {
    fn duplicate_file_read_notice(&self) -> String {
        "[[NOTE] This file read has been removed to save space in the context window. \
         Refer to the latest file read for the most up to date version of this file.]"
            .to_string()
    }

    fn context_truncation_notice(&self) -> String {
        "[NOTE] Some previous conversation history with the user has been removed to \
         maintain optimal context window length. The initial user task and the most \
         recent exchanges have been retained for continuity while older exchanges \
         have been removed. Please keep this in mind as you continue assisting the user."
            .to_string()
    }
}

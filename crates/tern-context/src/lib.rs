//! tern-context: conversation context management
//!
//! This crate keeps the outbound conversation of an LLM coding agent inside
//! the model's context window. Duplicated file reads are replaced with short
//! notices and, when that alone does not recover enough room, a prefix of the
//! older history is dropped. Every edit is recorded in a persistent,
//! rewindable history; the stored conversation itself is never modified.

pub mod error;
pub mod history;
pub mod manager;
pub mod notice;
pub mod oracle;

mod dedup;
mod optimize;
mod parse;
mod savings;
mod truncation;

pub use error::{Error, Result};
pub use history::{CONTEXT_HISTORY_FILE, ContextHistory, ContextUpdate, EditType, MessageEdits};
pub use manager::{ContextManager, PreparedContext, RequestRecord};
pub use notice::{NoticeProvider, StandardNotices};
pub use oracle::{ModelWindowOracle, WindowOracle};

//! tern-ai: conversation and model types
//!
//! This crate provides the message model shared across the workspace: content
//! blocks, user/assistant messages, per-request token accounting, and model
//! context-window descriptors.

pub mod types;
pub mod window;

pub use types::*;
pub use window::{ContextWindowInfo, context_window_info};

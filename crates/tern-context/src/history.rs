//! Persistent, timestamped edit history for conversation messages
//!
//! Every optimization applied to the outbound conversation is recorded here
//! as a non-destructive update keyed by message index and block index. The
//! stored conversation is never touched; the history is applied on top of it
//! when the outbound view is built. The history persists per task and can be
//! rolled back to any point in time when the agent rewinds to a checkpoint.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name of the persisted edit history inside a task directory
pub const CONTEXT_HISTORY_FILE: &str = "context_history.json";

/// How the edits recorded for a message were produced.
///
/// Values are pinned for serialization compatibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditType {
    #[default]
    Undefined = 0,
    NoFileRead = 1,
    ReadFileTool = 2,
    AlterFileTool = 3,
    FileMention = 4,
}

impl EditType {
    fn as_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Undefined),
            1 => Ok(Self::NoFileRead),
            2 => Ok(Self::ReadFileTool),
            3 => Ok(Self::AlterFileTool),
            4 => Ok(Self::FileMention),
            other => Err(Error::MalformedHistory(format!(
                "unknown edit type {other}"
            ))),
        }
    }
}

/// A single non-destructive edit to one content block
#[derive(Debug, Clone, PartialEq)]
pub struct ContextUpdate {
    /// Timestamp of the request that produced this update
    pub timestamp: i64,
    /// Update kind; only "text" is currently produced, other kinds round-trip
    pub kind: String,
    /// Replacement payload; index 0 is the full replacement text
    pub content: Vec<String>,
    /// For mention blocks: index 0 lists the paths already replaced in this
    /// text, index 1 lists every mention path present in the block
    pub metadata: Vec<Vec<String>>,
}

impl ContextUpdate {
    /// Create a plain text replacement update
    pub fn text(timestamp: i64, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind: "text".to_string(),
            content: vec![text.into()],
            metadata: vec![],
        }
    }

    /// The replacement text, if this is a text update
    pub fn replacement_text(&self) -> Option<&str> {
        if self.kind != "text" {
            return None;
        }
        self.content.first().map(String::as_str)
    }
}

/// All recorded edits for one message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageEdits {
    /// How these edits were produced
    pub edit_type: EditType,
    /// Updates per block index; each list is in non-decreasing timestamp order
    pub blocks: BTreeMap<usize, Vec<ContextUpdate>>,
}

/// Edit history for a whole conversation, keyed by message index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextHistory {
    messages: BTreeMap<usize, MessageEdits>,
}

impl ContextHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any edits are recorded
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether edits are recorded for a message
    pub fn contains(&self, message_index: usize) -> bool {
        self.messages.contains_key(&message_index)
    }

    /// The edits recorded for a message, if any
    pub fn get(&self, message_index: usize) -> Option<&MessageEdits> {
        self.messages.get(&message_index)
    }

    /// Get or create the edits for a message.
    ///
    /// The edit type is assigned only when the entry is first created.
    pub fn edits_mut(&mut self, message_index: usize, edit_type: EditType) -> &mut MessageEdits {
        self.messages
            .entry(message_index)
            .or_insert_with(|| MessageEdits {
                edit_type,
                ..Default::default()
            })
    }

    /// Append an update to a block of a message
    pub fn push_update(
        &mut self,
        message_index: usize,
        edit_type: EditType,
        block_index: usize,
        update: ContextUpdate,
    ) {
        self.edits_mut(message_index, edit_type)
            .blocks
            .entry(block_index)
            .or_default()
            .push(update);
    }

    /// The most recent update recorded for a block, if any
    pub fn latest(&self, message_index: usize, block_index: usize) -> Option<&ContextUpdate> {
        self.get(message_index)?.blocks.get(&block_index)?.last()
    }

    /// Drop every update newer than `timestamp`.
    ///
    /// Blocks and messages left without updates are removed entirely. Used
    /// when the agent rewinds to an earlier checkpoint.
    pub fn truncate_at(&mut self, timestamp: i64) {
        for edits in self.messages.values_mut() {
            for updates in edits.blocks.values_mut() {
                // Lists are in timestamp order, so walk from the right to
                // find the largest prefix that survives.
                let keep = updates
                    .iter()
                    .rposition(|u| u.timestamp <= timestamp)
                    .map_or(0, |i| i + 1);
                updates.truncate(keep);
            }
            edits.blocks.retain(|_, updates| !updates.is_empty());
        }
        self.messages.retain(|_, edits| !edits.blocks.is_empty());
    }
}

// --- Persistence ---

// On disk the history is a nested-array structure:
// [[messageIndex, [editType, [[blockIndex, [[ts, kind, [content...], [[meta...]...]]...]]...]]]...]
// Tuple structs serialize to exactly that shape.

#[derive(Serialize, Deserialize)]
struct WireUpdate(i64, String, Vec<String>, Vec<Vec<String>>);

#[derive(Serialize, Deserialize)]
struct WireMessage(usize, (u8, Vec<(usize, Vec<WireUpdate>)>));

impl ContextHistory {
    /// Load the persisted history for a task.
    ///
    /// A missing file yields an empty history; an unreadable or malformed
    /// file is reported and treated the same way.
    pub async fn load(task_dir: &Path) -> Self {
        match Self::try_load(task_dir).await {
            Ok(history) => history,
            Err(err) => {
                tracing::warn!("failed to load context history: {err}");
                Self::default()
            }
        }
    }

    async fn try_load(task_dir: &Path) -> Result<Self> {
        let path = task_dir.join(CONTEXT_HISTORY_FILE);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        let wire: Vec<WireMessage> = serde_json::from_slice(&raw)?;
        Self::from_wire(wire)
    }

    /// Persist the history as JSON, atomically (write to a temp file in the
    /// same directory, then rename over the target).
    pub async fn save(&self, task_dir: &Path) -> Result<()> {
        let path = task_dir.join(CONTEXT_HISTORY_FILE);
        let tmp = temp_path(&path);
        let raw = serde_json::to_vec(&self.to_wire())?;
        tokio::fs::write(&tmp, &raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn to_wire(&self) -> Vec<WireMessage> {
        self.messages
            .iter()
            .map(|(message_index, edits)| {
                let blocks = edits
                    .blocks
                    .iter()
                    .map(|(block_index, updates)| {
                        let updates = updates
                            .iter()
                            .map(|u| {
                                WireUpdate(
                                    u.timestamp,
                                    u.kind.clone(),
                                    u.content.clone(),
                                    u.metadata.clone(),
                                )
                            })
                            .collect();
                        (*block_index, updates)
                    })
                    .collect();
                WireMessage(*message_index, (edits.edit_type.as_u8(), blocks))
            })
            .collect()
    }

    fn from_wire(wire: Vec<WireMessage>) -> Result<Self> {
        let mut messages = BTreeMap::new();
        for WireMessage(message_index, (edit_type, blocks)) in wire {
            let mut edits = MessageEdits {
                edit_type: EditType::from_u8(edit_type)?,
                ..Default::default()
            };
            for (block_index, updates) in blocks {
                let updates = updates
                    .into_iter()
                    .map(|WireUpdate(timestamp, kind, content, metadata)| ContextUpdate {
                        timestamp,
                        kind,
                        content,
                        metadata,
                    })
                    .collect();
                edits.blocks.insert(block_index, updates);
            }
            messages.insert(message_index, edits);
        }
        Ok(Self { messages })
    }
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

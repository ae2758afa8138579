//! Core types for LLM conversations

use serde::{Deserialize, Serialize};

/// Token accounting reported for a single model request.
///
/// Field names follow the wire format the agent loop records in its request
/// log, so an accounting payload deserializes directly into this type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, rename = "tokensIn")]
    pub tokens_in: u64,
    #[serde(default, rename = "tokensOut")]
    pub tokens_out: u64,
    #[serde(default, rename = "cacheWrites")]
    pub cache_writes: u64,
    #[serde(default, rename = "cacheReads")]
    pub cache_reads: u64,
}

impl Usage {
    /// Total tokens attributed to the request
    pub fn total(&self) -> u64 {
        self.tokens_in + self.tokens_out + self.cache_writes + self.cache_reads
    }
}

/// Content types in messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Text content
    Text { text: String },
    /// Image content (base64 encoded)
    Image { data: String, mime_type: String },
}

impl Content {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create image content from base64 data
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Get text if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// Message roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// User message; tool results and mention expansions arrive as text
    /// blocks inside this variant
    User {
        content: Vec<Content>,
        #[serde(default)]
        timestamp: i64,
    },
    /// Assistant response
    Assistant {
        content: Vec<Content>,
        #[serde(flatten)]
        metadata: AssistantMetadata,
    },
}

/// Metadata for assistant messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMetadata {
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub timestamp: i64,
}

impl Message {
    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: vec![Content::text(text)],
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a user message with multiple content blocks
    pub fn user_with_content(content: Vec<Content>) -> Self {
        Self::User {
            content,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: vec![Content::text(text)],
            metadata: AssistantMetadata {
                timestamp: chrono::Utc::now().timestamp_millis(),
                ..Default::default()
            },
        }
    }

    /// Get the role as a string
    pub fn role(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
        }
    }

    /// Whether this is a user message
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    /// Whether this is an assistant message
    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }

    /// Get the content blocks
    pub fn content(&self) -> &[Content] {
        match self {
            Self::User { content, .. } => content,
            Self::Assistant { content, .. } => content,
        }
    }

    /// Get mutable access to the content blocks
    pub fn content_mut(&mut self) -> &mut Vec<Content> {
        match self {
            Self::User { content, .. } => content,
            Self::Assistant { content, .. } => content,
        }
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.content()
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Model definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier (e.g., "claude-sonnet-4-5")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Context window size in tokens
    pub context_window: u32,
    /// Maximum output tokens
    pub max_tokens: u32,
}

impl Model {
    /// Create a new model definition
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        context_window: u32,
        max_tokens: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            context_window,
            max_tokens,
        }
    }
}

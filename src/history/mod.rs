//! Conversation history collaborator
//!
//! The REST API that persists conversations is consumed, not implemented here.
//! The session only needs to list, fetch and delete them when switching
//! between the live view and a past conversation.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ConversationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One persisted message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub stt_latency_ms: Option<u64>,
    pub llm_latency_ms: Option<u64>,
    pub tts_latency_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// A conversation with its messages, immutable once loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// List entry (no messages)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationPage {
    pub data: Vec<ConversationSummary>,
    pub meta: PageMeta,
}

/// Conversation REST API as seen by the session
#[async_trait::async_trait]
pub trait ConversationSource: Send + Sync {
    /// Paginated list, newest first
    async fn list(&self, limit: u64, offset: u64) -> Result<ConversationPage>;

    /// One conversation with its messages
    async fn fetch(&self, id: ConversationId) -> Result<Conversation>;

    /// Delete a conversation and all its messages
    async fn delete(&self, id: ConversationId) -> Result<()>;
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Message;

// -- Unread index --

/// List-view projection of an unread message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// -- Threads --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadNode {
    pub message: Message,
    pub replies: Vec<ThreadNode>,
}

impl ThreadNode {
    /// Number of messages in this subtree, including this node.
    pub fn message_count(&self) -> usize {
        1 + self.replies.iter().map(ThreadNode::message_count).sum::<usize>()
    }
}

/// A root message with its nested replies in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub root: Message,
    pub replies: Vec<ThreadNode>,
    /// Set when the depth guard cut off part of the tree or a cycle was skipped.
    pub truncated: bool,
}

impl Thread {
    /// Number of replies at any depth, excluding the root.
    pub fn reply_count(&self) -> usize {
        self.replies.iter().map(ThreadNode::message_count).sum()
    }
}

// -- Listing --

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 200;

/// Optional constraints for listing a participant's messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageFilter {
    pub sender: Option<Uuid>,
    /// Inclusive lower bound on `created_at`.
    pub sent_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub sent_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl MessageFilter {
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }
}

// -- Account deletion --

/// Row counts removed while purging an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub messages: usize,
    pub notifications: usize,
    pub history: usize,
}

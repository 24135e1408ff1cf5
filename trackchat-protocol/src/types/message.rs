use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==================== Role ====================

/// Sender role, used to pick a display color
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Ordinary member
    #[default]
    Regular,
    /// Site staff (moderators, admins, owners)
    Staff,
    /// Bot or system announcement
    System,
}

// ==================== Message Identity ====================

/// Identity used for duplicate suppression
///
/// A source-provided id always wins; the synthetic key is only a fallback
/// for entries the page renders without one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Token taken from the page
    Source(String),
    /// Hash of sender, body and rounded timestamp
    Synthetic(u64),
}

impl MessageId {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(id) => write!(f, "{}", id),
            Self::Synthetic(hash) => write!(f, "syn-{:016x}", hash),
        }
    }
}

// ==================== Candidate ====================

/// A message extracted from a fragment, before sequencing
#[derive(Debug, Clone, PartialEq)]
pub struct MessageCandidate {
    /// Source id, if the page exposed one
    pub id: Option<String>,
    pub sender: String,
    pub role: Role,
    /// Plain text body
    pub body: String,
    /// Time reported by the page, or the capture instant when absent
    pub timestamp: DateTime<Utc>,
}

// ==================== Chat Message ====================

/// A sequenced chat message
///
/// Created once by the sequencer and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    id: MessageId,
    sender: String,
    role: Role,
    body: String,
    timestamp: DateTime<Utc>,
    sequence: u64,
}

impl ChatMessage {
    pub fn new(
        id: MessageId,
        sender: String,
        role: Role,
        body: String,
        timestamp: DateTime<Utc>,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            sender,
            role,
            body,
            timestamp,
            sequence,
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Display position, strictly increasing from 1
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

//! Deduplication and sequencing
//!
//! Remembers recently admitted message ids so a message re-reported by the
//! page (re-render, reconnect replay) is suppressed, and stamps admitted
//! messages with a strictly increasing sequence number.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use trackchat_protocol::{ChatMessage, MessageCandidate, MessageId};

use crate::config::PipelineConfig;

/// Bounds on the remembered id set
#[derive(Debug, Clone)]
pub struct DedupSettings {
    pub max_ids: usize,
    pub retention: Duration,
    pub granularity_secs: u64,
}

impl DedupSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_ids: config.dedup_max_ids,
            retention: config.dedup_retention(),
            granularity_secs: config.timestamp_granularity_secs,
        }
    }
}

/// Identity for a candidate without a source id
///
/// Two reports of the same message hash equal as long as the page renders
/// the same sender, body and timestamp (to the given granularity).
pub fn synthetic_id(
    sender: &str,
    body: &str,
    timestamp: DateTime<Utc>,
    granularity_secs: u64,
) -> MessageId {
    let granularity = granularity_secs.max(1) as i64;
    let bucket = timestamp.timestamp().div_euclid(granularity);

    let mut hasher = DefaultHasher::new();
    sender.hash(&mut hasher);
    body.hash(&mut hasher);
    bucket.hash(&mut hasher);
    MessageId::Synthetic(hasher.finish())
}

/// Admits each distinct message once and assigns sequence numbers
#[derive(Debug)]
pub struct Deduplicator {
    settings: DedupSettings,
    seen: HashSet<MessageId>,
    order: VecDeque<(MessageId, Instant)>,
    next_sequence: u64,
    last_timestamp: Option<DateTime<Utc>>,
    suppressed: u64,
}

impl Deduplicator {
    pub fn new(settings: DedupSettings) -> Self {
        Self {
            settings,
            seen: HashSet::new(),
            order: VecDeque::new(),
            next_sequence: 1,
            last_timestamp: None,
            suppressed: 0,
        }
    }

    /// Identity used for duplicate detection
    pub fn identity(&self, candidate: &MessageCandidate) -> MessageId {
        match &candidate.id {
            Some(id) => MessageId::Source(id.clone()),
            None => synthetic_id(
                &candidate.sender,
                &candidate.body,
                candidate.timestamp,
                self.settings.granularity_secs,
            ),
        }
    }

    /// Admit a candidate, or return `None` if it was already seen
    pub fn admit(&mut self, candidate: MessageCandidate) -> Option<ChatMessage> {
        self.admit_at(candidate, Instant::now())
    }

    fn admit_at(&mut self, candidate: MessageCandidate, now: Instant) -> Option<ChatMessage> {
        self.expire(now);

        let id = self.identity(&candidate);
        if self.seen.contains(&id) {
            self.suppressed += 1;
            tracing::trace!(id = %id, "Suppressed duplicate message");
            return None;
        }

        self.seen.insert(id.clone());
        self.order.push_back((id.clone(), now));
        while self.order.len() > self.settings.max_ids {
            if let Some((old, _)) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }

        // Display order never runs backwards in time
        let timestamp = match self.last_timestamp {
            Some(last) if candidate.timestamp < last => last,
            _ => candidate.timestamp,
        };
        self.last_timestamp = Some(timestamp);

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        Some(ChatMessage::new(
            id,
            candidate.sender,
            candidate.role,
            candidate.body,
            timestamp,
            sequence,
        ))
    }

    fn expire(&mut self, now: Instant) {
        while let Some((_, admitted)) = self.order.front() {
            if now.duration_since(*admitted) < self.settings.retention {
                break;
            }
            if let Some((old, _)) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
    }

    /// Number of remembered ids
    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Sequence number of the last admitted message, 0 if none
    pub fn last_sequence(&self) -> u64 {
        self.next_sequence - 1
    }

    /// Duplicates suppressed so far
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

//! Capture pipeline
//!
//! Extract, deduplicate and sequence, then hand off to the display.
//! Owned by the session supervisor so the seen-set survives reconnects.

use trackchat_protocol::{FeedItem, RawBatch, SystemNotice};

use super::channel::{ChannelClosed, FeedProducer, PushOutcome};
use super::dedup::Deduplicator;
use super::extractor::MessageExtractor;

/// Per-batch counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub admitted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub evicted: usize,
}

pub struct CapturePipeline {
    extractor: MessageExtractor,
    dedup: Deduplicator,
    producer: FeedProducer,
}

impl CapturePipeline {
    pub fn new(extractor: MessageExtractor, dedup: Deduplicator, producer: FeedProducer) -> Self {
        Self {
            extractor,
            dedup,
            producer,
        }
    }

    /// Process one change notification
    pub async fn ingest(&mut self, batch: RawBatch) -> Result<IngestReport, ChannelClosed> {
        if batch.is_empty() {
            return Ok(IngestReport::default());
        }

        let extraction = self.extractor.extract(&batch);
        let mut report = IngestReport {
            rejected: extraction.rejected.len(),
            ..Default::default()
        };

        for candidate in extraction.candidates {
            let Some(message) = self.dedup.admit(candidate) else {
                report.duplicates += 1;
                continue;
            };
            match self.producer.push(FeedItem::Chat(message)).await? {
                PushOutcome::Delivered => {}
                PushOutcome::Evicted { episode_started } => {
                    if episode_started {
                        tracing::warn!("Display is not keeping up, dropping oldest messages");
                    }
                    report.evicted += 1;
                }
            }
            report.admitted += 1;
        }

        tracing::debug!(
            fragments = batch.len(),
            admitted = report.admitted,
            duplicates = report.duplicates,
            rejected = report.rejected,
            evicted = report.evicted,
            seen = self.dedup.seen_len(),
            last_sequence = self.dedup.last_sequence(),
            suppressed_total = self.dedup.suppressed(),
            "Ingested batch"
        );
        Ok(report)
    }

    /// Queue a system notice in line with chat messages
    pub async fn notify(&self, notice: SystemNotice) -> Result<(), ChannelClosed> {
        tracing::info!(kind = ?notice.kind, "{}", notice.text);
        self.producer.push(FeedItem::Notice(notice)).await.map(|_| ())
    }

    /// Close the hand-off channel; nothing more will be captured
    pub fn close(&self) {
        self.producer.close();
    }

    #[cfg(test)]
    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }
}

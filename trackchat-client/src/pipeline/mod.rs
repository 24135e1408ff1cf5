//! Capture pipeline: extraction, deduplication and the display hand-off

mod capture;
mod channel;
mod dedup;
mod extractor;

pub use capture::CapturePipeline;
pub use channel::{message_channel, FeedConsumer};
pub use dedup::{DedupSettings, Deduplicator};
pub use extractor::MessageExtractor;

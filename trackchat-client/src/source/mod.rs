//! Event sources
//!
//! An event source owns the authenticated chat session. It pushes newly
//! appended chat fragments through a channel, transmits outgoing messages,
//! and reports whether the session is still usable.

mod loopback;
mod observer;
mod tracker;
mod webdriver;

pub use loopback::LoopbackSource;
pub use tracker::TrackerSource;

use async_trait::async_trait;
use tokio::sync::mpsc;

use trackchat_protocol::RawBatch;
use trackchat_utils::Result;

/// Notification stream for one established session, in arrival order
///
/// The stream ends when the session is lost.
pub type ContentStream = mpsc::Receiver<RawBatch>;

/// Health of the underlying session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceHealth {
    Alive,
    Lost(String),
}

/// Capability consumed by the capture pipeline and the dispatcher
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Establish a fresh session, replacing any previous one
    async fn open(&self) -> Result<ContentStream>;

    /// Transmit one message into the chat
    async fn send(&self, text: &str) -> Result<()>;

    /// Check the current session. Must never report `Alive` for a dead session.
    async fn health(&self) -> SourceHealth;

    /// Release the session (close the browser)
    async fn shutdown(&self) {}

    /// Short human-readable name for the status bar
    fn describe(&self) -> String;
}

//! Outbound message dispatch
//!
//! Validation and the session-state gate run synchronously on the render
//! loop; only transmission is asynchronous. Failed transmissions are
//! reported, never retried.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use trackchat_protocol::SessionState;

use crate::session::SessionStateReader;
use crate::source::EventSource;

/// Why a message was not sent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("message is empty")]
    Empty,

    #[error("message is {length} characters long (limit {max})")]
    TooLong { length: usize, max: usize },

    #[error("not connected ({})", .0.as_str())]
    Unavailable(SessionState),

    #[error("{0}")]
    Transport(String),
}

/// Confirmation that the tracker accepted a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub length: usize,
    pub sent_at: DateTime<Utc>,
}

/// A message that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    text: String,
}

impl OutboundMessage {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    source: Arc<dyn EventSource>,
    state: SessionStateReader,
    max_length: usize,
}

impl Dispatcher {
    pub fn new(source: Arc<dyn EventSource>, state: SessionStateReader, max_length: usize) -> Self {
        Self {
            source,
            state,
            max_length,
        }
    }

    /// Validate a draft and check that the session can take it
    pub fn prepare(&self, draft: &str) -> Result<OutboundMessage, SendError> {
        let text = draft.trim();
        if text.is_empty() {
            return Err(SendError::Empty);
        }

        let length = text.chars().count();
        if length > self.max_length {
            return Err(SendError::TooLong {
                length,
                max: self.max_length,
            });
        }

        let state = self.state.get();
        if !state.accepts_sends() {
            return Err(SendError::Unavailable(state));
        }

        Ok(OutboundMessage {
            text: text.to_string(),
        })
    }

    /// Transmit a prepared message, exactly once
    pub async fn transmit(&self, message: OutboundMessage) -> Result<Ack, SendError> {
        // The session may have dropped since the message was prepared
        let state = self.state.get();
        if !state.accepts_sends() {
            return Err(SendError::Unavailable(state));
        }

        match self.source.send(message.as_str()).await {
            Ok(()) => {
                tracing::info!(length = message.len(), "Sent message");
                tracing::debug!(text = %message.as_str(), "Sent message text");
                Ok(Ack {
                    length: message.len(),
                    sent_at: Utc::now(),
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send message");
                Err(SendError::Transport(e.to_string()))
            }
        }
    }

    /// Validate and transmit
    #[cfg(test)]
    pub async fn send(&self, draft: &str) -> Result<Ack, SendError> {
        let message = self.prepare(draft)?;
        self.transmit(message).await
    }
}

//! Bounded hand-off between the capture task and the render loop
//!
//! Single producer, single consumer. When the queue is full the producer
//! waits up to the configured time for the consumer; after that it evicts
//! the oldest chat message instead of blocking capture. Evictions are
//! counted and surfaced as one [`SystemNotice`] per overflow episode, ahead
//! of the remaining items on the next drain.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use trackchat_protocol::{FeedItem, SystemNotice};

/// The consumer side has gone or the channel was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("message channel is closed")]
pub struct ChannelClosed;

/// What happened to a pushed item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// Queued after evicting the oldest message
    Evicted { episode_started: bool },
}

#[derive(Debug)]
struct ChannelState {
    queue: VecDeque<FeedItem>,
    /// Evictions in the current overflow episode
    dropped: u64,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<ChannelState>,
    capacity: usize,
    wait: Duration,
    readable: Notify,
    writable: Notify,
}

/// Create a channel holding at most `capacity` items
pub fn message_channel(capacity: usize, wait: Duration) -> (FeedProducer, FeedConsumer) {
    let shared = Arc::new(Shared {
        state: Mutex::new(ChannelState {
            queue: VecDeque::with_capacity(capacity.min(4096)),
            dropped: 0,
            closed: false,
        }),
        capacity: capacity.max(1),
        wait,
        readable: Notify::new(),
        writable: Notify::new(),
    });

    (
        FeedProducer {
            shared: shared.clone(),
        },
        FeedConsumer { shared },
    )
}

/// Capture side of the channel
#[derive(Debug)]
pub struct FeedProducer {
    shared: Arc<Shared>,
}

impl FeedProducer {
    /// Queue an item, waiting briefly for space and evicting when none frees up
    pub async fn push(&self, item: FeedItem) -> Result<PushOutcome, ChannelClosed> {
        let deadline = tokio::time::Instant::now() + self.shared.wait;

        loop {
            {
                let mut state = self.shared.state.lock();
                if state.closed {
                    return Err(ChannelClosed);
                }

                if state.queue.len() < self.shared.capacity {
                    state.queue.push_back(item);
                    drop(state);
                    self.shared.readable.notify_one();
                    return Ok(PushOutcome::Delivered);
                }

                // Already overflowing: the consumer is behind, don't stall again
                if state.dropped > 0 || tokio::time::Instant::now() >= deadline {
                    let episode_started = evict_oldest(&mut state);
                    state.queue.push_back(item);
                    let dropped = state.dropped;
                    drop(state);

                    if episode_started {
                        tracing::warn!("Display is behind, evicting oldest messages");
                    } else {
                        tracing::trace!(dropped, "Evicted message");
                    }
                    self.shared.readable.notify_one();
                    return Ok(PushOutcome::Evicted { episode_started });
                }
            }

            // A timeout falls through to the eviction branch above
            let _ = tokio::time::timeout_at(deadline, self.shared.writable.notified()).await;
        }
    }

    /// Close the channel; queued items remain drainable
    pub fn close(&self) {
        self.shared.state.lock().closed = true;
        self.shared.readable.notify_one();
        self.shared.writable.notify_one();
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

impl Drop for FeedProducer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Evict the oldest chat message (or oldest item if there are only notices)
fn evict_oldest(state: &mut ChannelState) -> bool {
    let position = state
        .queue
        .iter()
        .position(|item| matches!(item, FeedItem::Chat(_)))
        .unwrap_or(0);
    state.queue.remove(position);

    let episode_started = state.dropped == 0;
    state.dropped += 1;
    episode_started
}

/// Display side of the channel
#[derive(Debug)]
pub struct FeedConsumer {
    shared: Arc<Shared>,
}

impl FeedConsumer {
    /// Take everything queued, in order
    ///
    /// If messages were evicted since the last drain, a single notice with
    /// the eviction count comes first and the overflow episode ends.
    pub fn drain(&self) -> Vec<FeedItem> {
        let mut state = self.shared.state.lock();
        let mut items = Vec::with_capacity(state.queue.len() + 1);

        if state.dropped > 0 {
            items.push(FeedItem::Notice(SystemNotice::dropped(state.dropped)));
            state.dropped = 0;
        }
        items.extend(state.queue.drain(..));
        drop(state);

        self.shared.writable.notify_one();
        items
    }

    /// Wait until there is something to drain
    pub async fn ready(&self) {
        loop {
            {
                let state = self.shared.state.lock();
                if !state.queue.is_empty() || state.dropped > 0 {
                    return;
                }
            }
            self.shared.readable.notified().await;
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

impl Drop for FeedConsumer {
    fn drop(&mut self) {
        self.shared.state.lock().closed = true;
        self.shared.writable.notify_one();
    }
}

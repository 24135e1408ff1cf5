//! In-process source without a browser
//!
//! Sent messages are echoed back into the stream as if the chat had
//! rendered them. Used by `--loopback` for offline UI work and by tests,
//! which can inject fragments and simulate failures.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use trackchat_protocol::{RawBatch, RawFragment};
use trackchat_utils::{Result, TrackchatError};

use super::{ContentStream, EventSource, SourceHealth};

const STREAM_BUFFER: usize = 64;

pub struct LoopbackSource {
    username: String,
    tx: Mutex<Option<mpsc::Sender<RawBatch>>>,
    healthy: AtomicBool,
    failing_sends: AtomicBool,
    rejecting_logins: AtomicBool,
    pending_open_failures: AtomicU32,
    opens: AtomicU32,
    next_id: AtomicU64,
    sent: Mutex<Vec<String>>,
}

impl LoopbackSource {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            tx: Mutex::new(None),
            healthy: AtomicBool::new(true),
            failing_sends: AtomicBool::new(false),
            rejecting_logins: AtomicBool::new(false),
            pending_open_failures: AtomicU32::new(0),
            opens: AtomicU32::new(0),
            next_id: AtomicU64::new(1),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Push a batch of fragments into the current stream
    ///
    /// Returns false when no stream is open or it is full.
    pub fn inject(&self, fragments: Vec<String>) -> bool {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.try_send(RawBatch::new(fragments)).is_ok(),
            None => false,
        }
    }

    /// End the current stream, as a lost page would
    pub fn disconnect(&self) {
        self.tx.lock().take();
    }

    fn echo_fragment(&self, text: &str) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        RawFragment {
            id: Some(format!("loop-{}", id)),
            sender: Some(self.username.clone()),
            role: None,
            time: Some(Utc::now().to_rfc3339()),
            html: Some(escape_html(text)),
        }
        .to_json()
    }
}

// Failure injection for supervisor, dispatcher and app tests
#[cfg(test)]
impl LoopbackSource {
    /// Make health checks report the session as alive or lost
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Make the next `count` calls to `open` fail
    pub fn fail_next_opens(&self, count: u32) {
        self.pending_open_failures.store(count, Ordering::SeqCst);
    }

    /// Make every `open` fail as a login the tracker refuses
    pub fn set_login_rejected(&self, rejected: bool) {
        self.rejecting_logins.store(rejected, Ordering::SeqCst);
    }

    /// Make every send fail with a transport error
    pub fn set_send_failure(&self, failing: bool) {
        self.failing_sends.store(failing, Ordering::SeqCst);
    }

    /// Number of `open` calls so far, successful or not
    pub fn open_count(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Messages accepted by `send`
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
impl EventSource for LoopbackSource {
    async fn open(&self) -> Result<ContentStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        if self.rejecting_logins.load(Ordering::SeqCst) {
            return Err(TrackchatError::login("loopback credentials rejected"));
        }

        let failures = self.pending_open_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.pending_open_failures.store(failures - 1, Ordering::SeqCst);
            return Err(TrackchatError::session_lost("loopback open refused"));
        }

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        *self.tx.lock() = Some(tx);
        self.healthy.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn send(&self, text: &str) -> Result<()> {
        if self.failing_sends.load(Ordering::SeqCst) {
            return Err(TrackchatError::webdriver("loopback transport failure"));
        }

        self.sent.lock().push(text.to_string());
        let fragment = self.echo_fragment(text);
        if !self.inject(vec![fragment]) {
            tracing::debug!("Loopback echo not delivered, no open stream");
        }
        Ok(())
    }

    async fn health(&self) -> SourceHealth {
        if !self.healthy.load(Ordering::SeqCst) {
            return SourceHealth::Lost("loopback marked unhealthy".into());
        }
        match self.tx.lock().as_ref() {
            Some(tx) if !tx.is_closed() => SourceHealth::Alive,
            _ => SourceHealth::Lost("loopback stream closed".into()),
        }
    }

    async fn shutdown(&self) {
        self.disconnect();
    }

    fn describe(&self) -> String {
        "loopback".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_echoes_into_stream() {
        let source = LoopbackSource::new("alice");
        let mut stream = source.open().await.unwrap();

        source.send("hello <world>").await.unwrap();
        let batch = stream.recv().await.unwrap();
        let fragment = RawFragment::parse(&batch.fragments[0]).unwrap();
        assert_eq!(fragment.sender.as_deref(), Some("alice"));
        assert_eq!(fragment.html.as_deref(), Some("hello &lt;world&gt;"));
        assert_eq!(source.sent(), vec!["hello <world>".to_string()]);
    }

    #[tokio::test]
    async fn test_echo_ids_are_unique() {
        let source = LoopbackSource::new("alice");
        let mut stream = source.open().await.unwrap();
        source.send("a").await.unwrap();
        source.send("a").await.unwrap();

        let first = RawFragment::parse(&stream.recv().await.unwrap().fragments[0]).unwrap();
        let second = RawFragment::parse(&stream.recv().await.unwrap().fragments[0]).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_open_failures_injected() {
        let source = LoopbackSource::new("alice");
        source.fail_next_opens(2);
        assert!(source.open().await.is_err());
        assert!(source.open().await.is_err());
        assert!(source.open().await.is_ok());
        assert_eq!(source.open_count(), 3);
    }

    #[tokio::test]
    async fn test_health_follows_flag_and_stream() {
        let source = LoopbackSource::new("alice");
        assert_ne!(source.health().await, SourceHealth::Alive);

        let _stream = source.open().await.unwrap();
        assert_eq!(source.health().await, SourceHealth::Alive);

        source.set_healthy(false);
        assert_ne!(source.health().await, SourceHealth::Alive);

        // reopening restores health
        let _stream = source.open().await.unwrap();
        assert_eq!(source.health().await, SourceHealth::Alive);
    }

    #[tokio::test]
    async fn test_disconnect_ends_stream() {
        let source = LoopbackSource::new("alice");
        let mut stream = source.open().await.unwrap();
        source.disconnect();
        assert!(stream.recv().await.is_none());
        assert!(!source.inject(vec!["{}".into()]));
    }

    #[tokio::test]
    async fn test_send_failure() {
        let source = LoopbackSource::new("alice");
        source.set_send_failure(true);
        assert!(source.send("x").await.is_err());
        assert!(source.sent().is_empty());
    }
}

//! Render loop
//!
//! Each cycle drains the message channel, applies queued input and send
//! outcomes, then redraws if anything changed. Between cycles it sleeps
//! until input arrives, the channel becomes readable, or the poll interval
//! passes.

use std::time::Duration;

use ratatui::backend::Backend;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use trackchat_protocol::{FeedItem, SessionState, SystemNotice};
use trackchat_utils::Result;

use super::event::{AppEvent, EventHandler};
use super::input::{InputAction, InputLine};
use super::render::{self, ChatView};
use super::scroll::ScrollBuffer;
use super::terminal::Terminal;
use super::theme::Palette;
use crate::config::UiConfig;
use crate::dispatcher::{Ack, Dispatcher, SendError};
use crate::pipeline::FeedConsumer;
use crate::session::SessionStateReader;
use crate::supervisor::FatalSessionLoss;

/// How long shutdown waits for the capture task
const CAPTURE_STOP_TIMEOUT: Duration = Duration::from_secs(5);

type CaptureHandle = JoinHandle<std::result::Result<(), FatalSessionLoss>>;

enum Wake {
    Feed,
    Event(AppEvent),
    Outcome(std::result::Result<Ack, SendError>),
    Tick,
}

pub struct App {
    consumer: FeedConsumer,
    session: SessionStateReader,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
    capture: Option<CaptureHandle>,
    events: EventHandler,
    outcomes_tx: mpsc::UnboundedSender<std::result::Result<Ack, SendError>>,
    outcomes_rx: mpsc::UnboundedReceiver<std::result::Result<Ack, SendError>>,
    buffer: ScrollBuffer,
    input: InputLine,
    palette: Palette,
    source_name: String,
    poll_interval: Duration,
    last_state: SessionState,
    chat_height: u16,
    dirty: bool,
    should_quit: bool,
}

impl App {
    pub fn new(
        consumer: FeedConsumer,
        session: SessionStateReader,
        dispatcher: Dispatcher,
        shutdown: CancellationToken,
        capture: CaptureHandle,
        source_name: String,
        ui: &UiConfig,
    ) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let last_state = session.get();

        Self {
            consumer,
            session,
            dispatcher,
            shutdown,
            capture: Some(capture),
            events: EventHandler::new(),
            outcomes_tx,
            outcomes_rx,
            buffer: ScrollBuffer::new(ui.scrollback_lines),
            input: InputLine::new(),
            palette: Palette::default(),
            source_name,
            poll_interval: ui.poll_interval(),
            last_state,
            chat_height: 1,
            dirty: true,
            should_quit: false,
        }
    }

    /// Run until the user quits, then stop capture
    pub async fn run(mut self) -> Result<()> {
        let mut terminal = Terminal::new()?;
        self.events.start_input_polling();
        info!("Render loop started");

        while !self.should_quit {
            self.cycle(terminal.terminal_mut());
            if self.should_quit {
                break;
            }
            self.wait().await;
        }

        self.finish().await;
        self.draw(terminal.terminal_mut());
        info!("Render loop stopped");
        Ok(())
    }

    /// One render cycle
    pub fn cycle<B: Backend>(&mut self, terminal: &mut ratatui::Terminal<B>) {
        self.drain_feed();

        while let Some(event) = self.events.try_next() {
            self.handle_event(event);
        }
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            self.handle_outcome(outcome);
        }

        let state = self.session.get();
        if state != self.last_state {
            self.last_state = state;
            self.dirty = true;
        }

        if self.dirty {
            self.draw(terminal);
        }
    }

    async fn wait(&mut self) {
        let wake = tokio::select! {
            _ = self.consumer.ready() => Wake::Feed,
            Some(event) = self.events.next() => Wake::Event(event),
            Some(outcome) = self.outcomes_rx.recv() => Wake::Outcome(outcome),
            _ = tokio::time::sleep(self.poll_interval) => Wake::Tick,
        };

        match wake {
            Wake::Event(event) => self.handle_event(event),
            Wake::Outcome(outcome) => self.handle_outcome(outcome),
            Wake::Feed | Wake::Tick => {}
        }
    }

    fn draw<B: Backend>(&mut self, terminal: &mut ratatui::Terminal<B>) {
        let view = ChatView {
            buffer: &self.buffer,
            input: &self.input,
            source: &self.source_name,
            state: self.last_state,
            palette: &self.palette,
        };

        let mut chat_height = self.chat_height;
        match terminal.draw(|frame| chat_height = render::draw(frame, &view)) {
            Ok(_) => {
                self.chat_height = chat_height.max(1);
                self.dirty = false;
            }
            // Stays dirty; the next cycle tries again
            Err(e) => warn!("Failed to draw frame: {}", e),
        }
    }

    fn drain_feed(&mut self) {
        let items = self.consumer.drain();
        if items.is_empty() {
            return;
        }
        for item in &items {
            self.buffer.push_item(item);
        }
        self.dirty = true;
    }

    fn push_notice(&mut self, notice: SystemNotice) {
        self.buffer.push_item(&FeedItem::Notice(notice));
        self.dirty = true;
    }

    fn handle_event(&mut self, event: AppEvent) {
        let action = match event {
            AppEvent::Key(key) => self.input.handle_key(key),
            AppEvent::Mouse(mouse) => self.input.handle_mouse(mouse),
            AppEvent::Paste(text) => self.input.handle_paste(&text),
            AppEvent::Resize { cols, rows } => {
                debug!(cols, rows, "Terminal resized");
                self.dirty = true;
                InputAction::None
            }
        };
        self.apply(action);
    }

    fn apply(&mut self, action: InputAction) {
        let page = self.chat_height.saturating_sub(1).max(1) as usize;

        match action {
            InputAction::None => return,
            InputAction::Edited | InputAction::Cancelled => {}
            InputAction::Submit(text) => self.submit(text),
            InputAction::ScrollUp(n) => self.buffer.scroll_up(n),
            InputAction::ScrollDown(n) => self.buffer.scroll_down(n),
            InputAction::PageUp => self.buffer.scroll_up(page),
            InputAction::PageDown => self.buffer.scroll_down(page),
            InputAction::JumpToLatest => self.buffer.jump_to_latest(),
            InputAction::Quit => {
                info!("Quit requested");
                self.should_quit = true;
            }
        }
        self.dirty = true;
    }

    fn submit(&mut self, text: String) {
        let message = match self.dispatcher.prepare(&text) {
            Ok(message) => message,
            Err(SendError::Empty) => return,
            Err(e) => {
                // nothing left this machine, let the operator edit and retry
                self.input.restore(text);
                self.push_notice(SystemNotice::send_failed(format!("Message not sent: {}", e)));
                return;
            }
        };

        self.buffer.jump_to_latest();
        let dispatcher = self.dispatcher.clone();
        let outcomes = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let result = dispatcher.transmit(message).await;
            let _ = outcomes.send(result);
        });
    }

    fn handle_outcome(&mut self, outcome: std::result::Result<Ack, SendError>) {
        match outcome {
            Ok(ack) => debug!(length = ack.length, sent_at = %ack.sent_at, "Message acknowledged"),
            Err(e) => {
                self.push_notice(SystemNotice::send_failed(format!("Message not sent: {}", e)))
            }
        }
    }

    /// Stop capture and take in whatever it queued on the way out
    async fn finish(&mut self) {
        self.shutdown.cancel();

        if let Some(handle) = self.capture.take() {
            match tokio::time::timeout(CAPTURE_STOP_TIMEOUT, handle).await {
                Ok(Ok(Ok(()))) => debug!("Capture task stopped"),
                Ok(Ok(Err(loss))) => info!("Capture had ended: {}", loss),
                Ok(Err(e)) => warn!("Capture task failed: {}", e),
                Err(_) => warn!("Capture task did not stop in time"),
            }
        }

        self.drain_feed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;

    use crate::pipeline::{
        message_channel, CapturePipeline, DedupSettings, Deduplicator, MessageExtractor,
    };
    use crate::session::session_state;
    use crate::source::LoopbackSource;
    use crate::supervisor::{SessionSupervisor, SupervisorSettings};
    use crate::config::SessionConfig;

    struct Harness {
        app: App,
        source: Arc<LoopbackSource>,
        terminal: ratatui::Terminal<TestBackend>,
    }

    fn start(max_length: usize) -> Harness {
        let source = Arc::new(LoopbackSource::new("alice"));
        let (writer, reader) = session_state();
        let (producer, consumer) = message_channel(64, Duration::from_millis(50));
        let pipeline = CapturePipeline::new(
            MessageExtractor::new(&[]),
            Deduplicator::new(DedupSettings {
                max_ids: 100,
                retention: Duration::from_secs(60),
                granularity_secs: 1,
            }),
            producer,
        );
        let shutdown = CancellationToken::new();
        let capture = SessionSupervisor::new(
            source.clone(),
            pipeline,
            writer,
            SupervisorSettings::from_config(&SessionConfig::default()),
            shutdown.clone(),
        )
        .spawn();
        let dispatcher = Dispatcher::new(source.clone(), reader.clone(), max_length);

        let app = App::new(
            consumer,
            reader,
            dispatcher,
            shutdown,
            capture,
            "loopback".into(),
            &UiConfig::default(),
        );
        Harness {
            app,
            source,
            terminal: ratatui::Terminal::new(TestBackend::new(60, 12)).unwrap(),
        }
    }

    impl Harness {
        async fn settle(&mut self) {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(10)).await;
                self.app.cycle(&mut self.terminal);
            }
        }

        fn type_line(&mut self, text: &str) {
            let sender = self.app.events.sender();
            for c in text.chars() {
                sender
                    .send(AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)))
                    .unwrap();
            }
            sender
                .send(AppEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)))
                .unwrap();
        }

        fn lines(&self) -> Vec<String> {
            self.app.buffer.lines().map(|l| l.plain_text()).collect()
        }
    }

    #[tokio::test]
    async fn test_connect_notice_and_live_status() {
        let mut h = start(500);
        h.settle().await;

        assert_eq!(h.app.last_state, SessionState::Live);
        assert!(h.lines()[0].ends_with("* Connected to loopback"));
        assert!(!h.app.dirty);
    }

    #[tokio::test]
    async fn test_submitted_message_is_sent_and_echoed() {
        let mut h = start(500);
        h.settle().await;

        h.type_line("hello chat");
        h.settle().await;

        assert_eq!(h.source.sent(), vec!["hello chat".to_string()]);
        assert!(h.lines().iter().any(|l| l.ends_with("( alice ) : hello chat")));
        assert_eq!(h.app.input.text(), "");
    }

    #[tokio::test]
    async fn test_rejected_message_shows_notice() {
        let mut h = start(5);
        h.settle().await;

        h.type_line("far too long");
        h.settle().await;

        assert!(h.source.sent().is_empty());
        let last = h.lines().pop().unwrap();
        assert!(last.contains("* Message not sent: message is 12 characters long (limit 5)"));
        assert_eq!(h.app.input.text(), "far too long");
        assert_eq!(h.app.input.cursor(), 12);
    }

    #[tokio::test]
    async fn test_transport_failure_clears_draft() {
        let mut h = start(500);
        h.settle().await;
        h.source.set_send_failure(true);

        h.type_line("gone");
        h.settle().await;

        assert_eq!(h.app.input.text(), "");
    }

    #[tokio::test]
    async fn test_whitespace_only_is_ignored() {
        let mut h = start(500);
        h.settle().await;
        let before = h.lines().len();

        h.type_line("   ");
        h.settle().await;

        assert!(h.source.sent().is_empty());
        assert_eq!(h.lines().len(), before);
    }

    #[tokio::test]
    async fn test_transport_failure_reported() {
        let mut h = start(500);
        h.settle().await;
        h.source.set_send_failure(true);

        h.type_line("hi");
        h.settle().await;

        let last = h.lines().pop().unwrap();
        assert!(last.contains("* Message not sent:"));
        assert!(last.ends_with("loopback transport failure"));
        assert!(h.source.sent().is_empty());
    }

    #[tokio::test]
    async fn test_quit_key() {
        let mut h = start(500);
        h.app.handle_event(AppEvent::Key(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
        )));
        assert!(h.app.should_quit);
    }

    #[tokio::test]
    async fn test_finish_stops_capture_and_drains() {
        let mut h = start(500);
        h.settle().await;

        h.source.inject(vec![
            r#"{"id":"9","sender":"bob","html":"last words"}"#.to_string(),
        ]);
        // wait for capture to queue it without running a render cycle
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        h.app.finish().await;

        assert!(h.app.capture.is_none());
        assert!(h.lines().iter().any(|l| l.ends_with("( bob ) : last words")));
    }

    #[tokio::test]
    async fn test_page_scroll_uses_chat_height() {
        let mut h = start(500);
        h.settle().await;
        for i in 0..30 {
            h.source.inject(vec![format!(
                r#"{{"id":"{}","sender":"bob","html":"m{}"}}"#,
                i, i
            )]);
        }
        h.settle().await;
        assert_eq!(h.app.chat_height, 6);

        // 30 messages fit the 64-slot channel whole
        assert_eq!(h.app.buffer.message_count(), 30);
        let bodies: Vec<String> = h
            .lines()
            .iter()
            .filter_map(|l| l.split("( bob ) : ").nth(1).map(String::from))
            .collect();
        let expected: Vec<String> = (0..30).map(|i| format!("m{}", i)).collect();
        assert_eq!(bodies, expected);
        assert!(!h.lines().iter().any(|l| l.contains("dropped")));

        h.app.apply(InputAction::PageUp);
        assert_eq!(h.app.buffer.offset(), 5);
        h.app.apply(InputAction::JumpToLatest);
        assert!(h.app.buffer.is_following());
    }
}

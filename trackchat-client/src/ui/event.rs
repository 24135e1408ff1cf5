//! Terminal input events
//!
//! Crossterm is polled on a dedicated thread; events arrive on the render
//! loop through an unbounded channel.

use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, MouseEvent};
use tokio::sync::mpsc;

/// How long the input thread blocks in a single poll
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Events from the terminal
#[derive(Debug, Clone)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Paste(String),
    Resize { cols: u16, rows: u16 },
}

pub struct EventHandler {
    tx: mpsc::UnboundedSender<AppEvent>,
    rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Sender for injecting events (used by tests)
    #[cfg(test)]
    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    /// Start reading terminal events on a background thread
    ///
    /// The thread exits once the handler is dropped.
    pub fn start_input_polling(&self) {
        let tx = self.tx.clone();

        std::thread::spawn(move || loop {
            if tx.is_closed() {
                break;
            }
            if !event::poll(INPUT_POLL_INTERVAL).unwrap_or(false) {
                continue;
            }

            let event = match event::read() {
                Ok(CrosstermEvent::Key(key)) => AppEvent::Key(key),
                Ok(CrosstermEvent::Mouse(mouse)) => AppEvent::Mouse(mouse),
                Ok(CrosstermEvent::Paste(text)) => AppEvent::Paste(text),
                Ok(CrosstermEvent::Resize(cols, rows)) => AppEvent::Resize { cols, rows },
                Ok(CrosstermEvent::FocusGained) | Ok(CrosstermEvent::FocusLost) => continue,
                Err(e) => {
                    tracing::error!("Error reading terminal event: {}", e);
                    break;
                }
            };
            if tx.send(event).is_err() {
                break;
            }
        });
    }

    /// Receive next event
    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }

    /// Try to receive without blocking
    pub fn try_next(&mut self) -> Option<AppEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};

    #[tokio::test]
    async fn test_event_send_receive() {
        let mut handler = EventHandler::new();
        let sender = handler.sender();

        sender
            .send(AppEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)))
            .unwrap();
        sender.send(AppEvent::Resize { cols: 80, rows: 24 }).unwrap();

        assert!(matches!(handler.try_next(), Some(AppEvent::Key(_))));
        assert!(matches!(
            handler.next().await,
            Some(AppEvent::Resize { cols: 80, rows: 24 })
        ));
        assert!(handler.try_next().is_none());
    }
}

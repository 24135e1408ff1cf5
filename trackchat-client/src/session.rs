//! Process-wide session state
//!
//! A single atomic cell. The supervisor holds the only [`SessionStateWriter`];
//! the render loop and dispatcher hold [`SessionStateReader`] clones.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use trackchat_protocol::SessionState;

/// Create the session cell, starting in `Connecting`
pub fn session_state() -> (SessionStateWriter, SessionStateReader) {
    let cell = Arc::new(AtomicU8::new(SessionState::Connecting.as_u8()));
    (
        SessionStateWriter { cell: cell.clone() },
        SessionStateReader { cell },
    )
}

/// Sole writer of the session state. Deliberately not `Clone`.
#[derive(Debug)]
pub struct SessionStateWriter {
    cell: Arc<AtomicU8>,
}

impl SessionStateWriter {
    /// Store a new state, returning the previous one
    pub fn set(&self, state: SessionState) -> SessionState {
        let previous = SessionState::from_u8(self.cell.swap(state.as_u8(), Ordering::AcqRel));
        if previous != state {
            tracing::info!(from = ?previous, to = ?state, "session state changed");
        }
        previous
    }
}

/// Read-only view of the session state
#[derive(Debug, Clone)]
pub struct SessionStateReader {
    cell: Arc<AtomicU8>,
}

impl SessionStateReader {
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.cell.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_connecting() {
        let (_writer, reader) = session_state();
        assert_eq!(reader.get(), SessionState::Connecting);
    }

    #[test]
    fn test_reader_sees_writes() {
        let (writer, reader) = session_state();
        let other = reader.clone();

        let previous = writer.set(SessionState::Live);
        assert_eq!(previous, SessionState::Connecting);
        assert_eq!(reader.get(), SessionState::Live);
        assert_eq!(other.get(), SessionState::Live);
    }

    #[test]
    fn test_reader_across_threads() {
        let (writer, reader) = session_state();
        let handle = std::thread::spawn(move || {
            writer.set(SessionState::Degraded);
            writer.set(SessionState::Terminated);
        });
        handle.join().unwrap();
        assert_eq!(reader.get(), SessionState::Terminated);
    }
}

//! Input line and key bindings
//!
//! The draft exists only while composing: `Idle → Composing → Idle`, left
//! either by submitting (Enter) or cancelling (Esc).

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind};

/// Entries scrolled per Ctrl+Up/Down or wheel notch
const LINE_SCROLL: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Idle,
    Composing,
}

/// Result of handling an input event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    None,
    /// The draft changed
    Edited,
    Submit(String),
    Cancelled,
    ScrollUp(usize),
    ScrollDown(usize),
    PageUp,
    PageDown,
    JumpToLatest,
    Quit,
}

/// Text being composed, with a cursor counted in characters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundDraft {
    text: String,
    cursor: usize,
}

impl OutboundDraft {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.text.insert(at, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        for c in s.chars() {
            self.insert(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.text.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor >= self.char_len() {
            return;
        }
        let at = self.byte_index(self.cursor);
        self.text.remove(at);
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_len());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.char_len();
    }
}

#[derive(Debug, Default)]
pub struct InputLine {
    draft: Option<OutboundDraft>,
}

impl InputLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InputMode {
        if self.draft.is_some() {
            InputMode::Composing
        } else {
            InputMode::Idle
        }
    }

    pub fn text(&self) -> &str {
        self.draft.as_ref().map(|d| d.as_str()).unwrap_or("")
    }

    pub fn cursor(&self) -> usize {
        self.draft.as_ref().map(|d| d.cursor()).unwrap_or(0)
    }

    /// Put a submitted draft back, cursor at the end
    pub fn restore(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let cursor = text.chars().count();
        self.draft = Some(OutboundDraft { text, cursor });
    }

    fn draft_mut(&mut self) -> &mut OutboundDraft {
        self.draft.get_or_insert_with(OutboundDraft::default)
    }

    /// Apply a key press
    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        if key.kind != KeyEventKind::Press {
            return InputAction::None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') if ctrl => InputAction::Quit,
            KeyCode::Char('l') if ctrl => InputAction::JumpToLatest,
            KeyCode::Up if ctrl => InputAction::ScrollUp(LINE_SCROLL),
            KeyCode::Down if ctrl => InputAction::ScrollDown(LINE_SCROLL),
            KeyCode::PageUp => InputAction::PageUp,
            KeyCode::PageDown => InputAction::PageDown,

            KeyCode::Enter => match self.draft.take() {
                Some(draft) => InputAction::Submit(draft.text),
                None => InputAction::None,
            },
            KeyCode::Esc => match self.draft.take() {
                Some(_) => InputAction::Cancelled,
                None => InputAction::None,
            },

            KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                self.draft_mut().insert(c);
                InputAction::Edited
            }

            KeyCode::End if self.draft.is_none() => InputAction::JumpToLatest,
            _ => self.edit(key.code),
        }
    }

    fn edit(&mut self, code: KeyCode) -> InputAction {
        let Some(draft) = self.draft.as_mut() else {
            return InputAction::None;
        };

        match code {
            KeyCode::Backspace => draft.backspace(),
            KeyCode::Delete => draft.delete(),
            KeyCode::Left => draft.left(),
            KeyCode::Right => draft.right(),
            KeyCode::Home => draft.home(),
            KeyCode::End => draft.end(),
            _ => return InputAction::None,
        }

        // Erasing everything abandons the draft
        if draft.is_empty() {
            self.draft = None;
        }
        InputAction::Edited
    }

    /// Bracketed paste; newlines become spaces
    pub fn handle_paste(&mut self, text: &str) -> InputAction {
        let cleaned: String = text
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        if cleaned.is_empty() {
            return InputAction::None;
        }
        self.draft_mut().insert_str(&cleaned);
        InputAction::Edited
    }

    /// Mouse wheel scrolls the chat
    pub fn handle_mouse(&self, mouse: MouseEvent) -> InputAction {
        match mouse.kind {
            MouseEventKind::ScrollUp => InputAction::ScrollUp(LINE_SCROLL),
            MouseEventKind::ScrollDown => InputAction::ScrollDown(LINE_SCROLL),
            _ => InputAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(input: &mut InputLine, text: &str) {
        for c in text.chars() {
            input.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_typing_enters_composing() {
        let mut input = InputLine::new();
        assert_eq!(input.mode(), InputMode::Idle);

        assert_eq!(input.handle_key(key(KeyCode::Char('h'))), InputAction::Edited);
        assert_eq!(input.mode(), InputMode::Composing);
        assert_eq!(input.text(), "h");
    }

    #[test]
    fn test_enter_submits_and_returns_to_idle() {
        let mut input = InputLine::new();
        type_text(&mut input, "hello");
        assert_eq!(
            input.handle_key(key(KeyCode::Enter)),
            InputAction::Submit("hello".into())
        );
        assert_eq!(input.mode(), InputMode::Idle);
        assert_eq!(input.text(), "");

        // nothing to submit while idle
        assert_eq!(input.handle_key(key(KeyCode::Enter)), InputAction::None);
    }

    #[test]
    fn test_escape_cancels() {
        let mut input = InputLine::new();
        type_text(&mut input, "oops");
        assert_eq!(input.handle_key(key(KeyCode::Esc)), InputAction::Cancelled);
        assert_eq!(input.mode(), InputMode::Idle);
        assert_eq!(input.handle_key(key(KeyCode::Esc)), InputAction::None);
    }

    #[test]
    fn test_cursor_editing() {
        let mut input = InputLine::new();
        type_text(&mut input, "helo");
        input.handle_key(key(KeyCode::Left));
        input.handle_key(key(KeyCode::Char('l')));
        assert_eq!(input.text(), "hello");

        input.handle_key(key(KeyCode::Home));
        input.handle_key(key(KeyCode::Delete));
        assert_eq!(input.text(), "ello");
        assert_eq!(input.cursor(), 0);

        input.handle_key(key(KeyCode::End));
        input.handle_key(key(KeyCode::Backspace));
        assert_eq!(input.text(), "ell");
    }

    #[test]
    fn test_multibyte_editing() {
        let mut input = InputLine::new();
        type_text(&mut input, "héé");
        input.handle_key(key(KeyCode::Left));
        input.handle_key(key(KeyCode::Backspace));
        assert_eq!(input.text(), "hé");
        assert_eq!(input.cursor(), 1);
    }

    #[test]
    fn test_erasing_everything_abandons_draft() {
        let mut input = InputLine::new();
        type_text(&mut input, "a");
        input.handle_key(key(KeyCode::Backspace));
        assert_eq!(input.mode(), InputMode::Idle);
    }

    #[test]
    fn test_control_keys() {
        let mut input = InputLine::new();
        assert_eq!(input.handle_key(ctrl('c')), InputAction::Quit);
        assert_eq!(input.handle_key(ctrl('q')), InputAction::Quit);
        assert_eq!(input.handle_key(ctrl('l')), InputAction::JumpToLatest);
        assert_eq!(
            input.handle_key(KeyEvent::new(KeyCode::Up, KeyModifiers::CONTROL)),
            InputAction::ScrollUp(1)
        );
        assert_eq!(input.handle_key(key(KeyCode::PageUp)), InputAction::PageUp);
        // control chords never reach the draft
        assert_eq!(input.mode(), InputMode::Idle);
    }

    #[test]
    fn test_end_jumps_to_latest_only_when_idle() {
        let mut input = InputLine::new();
        assert_eq!(input.handle_key(key(KeyCode::End)), InputAction::JumpToLatest);

        type_text(&mut input, "ab");
        input.handle_key(key(KeyCode::Home));
        assert_eq!(input.handle_key(key(KeyCode::End)), InputAction::Edited);
        assert_eq!(input.cursor(), 2);
    }

    #[test]
    fn test_key_release_ignored() {
        let mut input = InputLine::new();
        let mut release = key(KeyCode::Char('x'));
        release.kind = KeyEventKind::Release;
        assert_eq!(input.handle_key(release), InputAction::None);
        assert_eq!(input.mode(), InputMode::Idle);
    }

    #[test]
    fn test_paste_flattens_newlines() {
        let mut input = InputLine::new();
        assert_eq!(input.handle_paste("one\ntwo"), InputAction::Edited);
        assert_eq!(input.text(), "one two");
        assert_eq!(input.handle_paste(""), InputAction::None);
    }

    #[test]
    fn test_restore_returns_to_composing() {
        let mut input = InputLine::new();
        input.handle_paste("héllo");
        let InputAction::Submit(text) = input.handle_key(key(KeyCode::Enter)) else {
            panic!("expected submit");
        };
        assert_eq!(input.mode(), InputMode::Idle);

        input.restore(text);
        assert_eq!(input.mode(), InputMode::Composing);
        assert_eq!(input.text(), "héllo");
        assert_eq!(input.cursor(), 5);

        input.handle_key(key(KeyCode::Char('!')));
        assert_eq!(input.text(), "héllo!");
    }

    #[test]
    fn test_restore_empty_stays_idle() {
        let mut input = InputLine::new();
        input.restore(String::new());
        assert_eq!(input.mode(), InputMode::Idle);
    }
}

//! Frame layout and drawing
//!
//! ```text
//! ┌ status bar ──────────────────────┐
//! │ chat (scroll buffer)             │
//! │                                  │
//! ├ input ───────────────────────────┤
//! └──────────────────────────────────┘
//! ```

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthChar;

use trackchat_protocol::SessionState;

use super::input::{InputLine, InputMode};
use super::scroll::ScrollBuffer;
use super::status::StatusBar;
use super::theme::{Palette, PaletteSlot};

pub const INPUT_TITLE: &str = " Type your message (Enter to send) ";
const IDLE_HINT: &str = "PgUp/PgDn to scroll, Ctrl+C to quit";

/// Everything one frame shows
pub struct ChatView<'a> {
    pub buffer: &'a ScrollBuffer,
    pub input: &'a InputLine,
    pub source: &'a str,
    pub state: SessionState,
    pub palette: &'a Palette,
}

/// Split the screen into status, chat and input areas
pub fn layout(area: Rect) -> (Rect, Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);
    (chunks[0], chunks[1], chunks[2])
}

/// Draw a frame; returns the number of chat rows visible
pub fn draw(frame: &mut Frame, view: &ChatView<'_>) -> u16 {
    let (status_area, chat_area, input_area) = layout(frame.area());

    let mut status =
        StatusBar::new(view.source, view.state).messages(view.buffer.message_count());
    if !view.buffer.is_following() {
        status = status.scrolled(view.buffer.unseen());
    }
    frame.render_widget(status, status_area);

    let chat_height = draw_chat(frame, chat_area, view);
    draw_input(frame, input_area, view);
    chat_height
}

fn draw_chat(frame: &mut Frame, area: Rect, view: &ChatView<'_>) -> u16 {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(view.palette.style(PaletteSlot::Border));
    let inner = block.inner(area);

    let lines: Vec<Line> = view
        .buffer
        .visible_rows(inner.width as usize, inner.height as usize)
        .into_iter()
        .map(|row| {
            Line::from(
                row.into_iter()
                    .map(|segment| Span::styled(segment.text, view.palette.style(segment.slot)))
                    .collect::<Vec<_>>(),
            )
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
    inner.height
}

fn draw_input(frame: &mut Frame, area: Rect, view: &ChatView<'_>) {
    let title = if view.state.accepts_sends() {
        Span::styled(INPUT_TITLE, view.palette.style(PaletteSlot::Title))
    } else {
        Span::styled(
            format!("{}- {} ", INPUT_TITLE, view.state.as_str()),
            view.palette.style(PaletteSlot::Hint),
        )
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(view.palette.style(PaletteSlot::Border))
        .title(title);
    let inner = block.inner(area);

    let (visible, cursor_x) =
        input_window(view.input.text(), view.input.cursor(), inner.width as usize);
    let content = match view.input.mode() {
        InputMode::Idle => Line::from(Span::styled(IDLE_HINT, view.palette.style(PaletteSlot::Hint))),
        InputMode::Composing => Line::from(visible),
    };

    frame.render_widget(Paragraph::new(content).block(block), area);

    if inner.width > 0 && inner.height > 0 {
        let x = inner.x + cursor_x as u16;
        frame.set_cursor_position((x, inner.y));
    }
}

/// Slice of the draft that fits `width` columns with the cursor in view
///
/// Scrolls horizontally so the cell after the text before `cursor` stays
/// visible. Returns the visible text and the cursor column within it.
fn input_window(text: &str, cursor: usize, width: usize) -> (String, usize) {
    let width = width.max(1);
    let chars: Vec<char> = text.chars().collect();
    let cursor = cursor.min(chars.len());
    let cells = |ch: &char| ch.width().unwrap_or(0);

    let mut skip = 0;
    let mut before: usize = chars[..cursor].iter().map(cells).sum();
    while skip < cursor && before + 1 > width {
        before -= cells(&chars[skip]);
        skip += 1;
    }

    let mut used = 0;
    let visible = chars[skip..]
        .iter()
        .take_while(|ch| {
            used += cells(*ch);
            used <= width
        })
        .collect();
    (visible, before)
}

//! Status bar widget
//!
//! Shows the tracker, the message count, the scroll position and the
//! session state.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use trackchat_protocol::SessionState;

/// Style for each session state
pub fn state_style(state: SessionState) -> Style {
    match state {
        SessionState::Connecting => Style::default().fg(Color::Yellow),
        SessionState::Live => Style::default().fg(Color::Green),
        SessionState::Degraded => Style::default().fg(Color::Yellow),
        SessionState::Terminated => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}

pub struct StatusBar<'a> {
    source: &'a str,
    state: SessionState,
    messages: Option<usize>,
    unseen: Option<usize>,
}

impl<'a> StatusBar<'a> {
    pub fn new(source: &'a str, state: SessionState) -> Self {
        Self {
            source,
            state,
            messages: None,
            unseen: None,
        }
    }

    pub fn messages(mut self, count: usize) -> Self {
        self.messages = Some(count);
        self
    }

    /// Mark the view as scrolled back with `unseen` newer entries
    pub fn scrolled(mut self, unseen: usize) -> Self {
        self.unseen = Some(unseen);
        self
    }

    fn left(&self) -> Line<'a> {
        Line::from(vec![
            Span::styled(" trackchat ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("| "),
            Span::raw(self.source),
        ])
    }

    fn right(&self) -> Line<'static> {
        let mut spans = Vec::new();
        if let Some(count) = self.messages {
            spans.push(Span::raw(format!("{} msgs | ", count)));
        }
        match self.unseen {
            Some(0) => spans.push(Span::styled(
                "scrolled back | ",
                Style::default().fg(Color::Cyan),
            )),
            Some(n) => spans.push(Span::styled(
                format!("{} new below | ", n),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            None => {}
        }
        spans.push(Span::styled(self.state.as_str(), state_style(self.state)));
        spans.push(Span::raw(" "));
        Line::from(spans)
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        let base = Style::default().bg(Color::Black).fg(Color::White);
        buf.set_style(area, base);

        let left = self.left();
        let right = self.right();
        let right_width = right.width() as u16;

        buf.set_line(area.x, area.y, &left, area.width);
        if right_width <= area.width {
            buf.set_line(area.x + area.width - right_width, area.y, &right, right_width);
        }
    }
}

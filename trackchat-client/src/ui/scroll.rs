//! Scrollback buffer
//!
//! Formatted entries, oldest first, capped at the configured number of
//! lines. The scroll offset counts entries hidden below the viewport, so
//! zero means the view follows new messages.

use std::collections::VecDeque;

use chrono::{DateTime, Local, Utc};
use unicode_width::UnicodeWidthChar;

use trackchat_protocol::{ChatMessage, FeedItem, SystemNotice};

use super::theme::PaletteSlot;

/// A run of text in a single style
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub slot: PaletteSlot,
}

impl Segment {
    fn new(text: impl Into<String>, slot: PaletteSlot) -> Self {
        Self {
            text: text.into(),
            slot,
        }
    }
}

fn clock(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// One formatted entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferLine {
    segments: Vec<Segment>,
}

impl BufferLine {
    /// `[ HH:MM:SS ] ( sender ) : body`
    pub fn from_message(message: &ChatMessage) -> Self {
        Self {
            segments: vec![
                Segment::new("[ ", PaletteSlot::Punctuation),
                Segment::new(clock(message.timestamp()), PaletteSlot::Timestamp),
                Segment::new(" ] ( ", PaletteSlot::Punctuation),
                Segment::new(message.sender(), PaletteSlot::for_role(message.role())),
                Segment::new(" ) : ", PaletteSlot::Punctuation),
                Segment::new(message.body(), PaletteSlot::Body),
            ],
        }
    }

    /// `[ HH:MM:SS ] * text`
    pub fn from_notice(notice: &SystemNotice) -> Self {
        Self {
            segments: vec![
                Segment::new("[ ", PaletteSlot::Punctuation),
                Segment::new(clock(notice.at), PaletteSlot::Timestamp),
                Segment::new(" ] ", PaletteSlot::Punctuation),
                Segment::new(format!("* {}", notice.text), PaletteSlot::for_notice(&notice.kind)),
            ],
        }
    }

    pub fn from_item(item: &FeedItem) -> Self {
        match item {
            FeedItem::Chat(message) => Self::from_message(message),
            FeedItem::Notice(notice) => Self::from_notice(notice),
        }
    }

    #[cfg(test)]
    pub fn plain_text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    /// Split into rows at most `width` terminal columns wide; embedded newlines break rows
    ///
    /// A double-width glyph that would straddle the edge moves to the next row.
    pub fn wrap(&self, width: usize) -> Vec<Vec<Segment>> {
        let width = width.max(1);
        let mut rows: Vec<Vec<Segment>> = vec![Vec::new()];
        let mut column = 0;

        for segment in &self.segments {
            let mut current = String::new();
            for ch in segment.text.chars() {
                if ch == '\n' {
                    flush(&mut rows, &mut current, segment.slot);
                    rows.push(Vec::new());
                    column = 0;
                    continue;
                }
                let cells = ch.width().unwrap_or(0);
                if column > 0 && column + cells > width {
                    flush(&mut rows, &mut current, segment.slot);
                    rows.push(Vec::new());
                    column = 0;
                }
                current.push(ch);
                column += cells;
            }
            flush(&mut rows, &mut current, segment.slot);
        }

        rows
    }
}

fn flush(rows: &mut [Vec<Segment>], current: &mut String, slot: PaletteSlot) {
    if current.is_empty() {
        return;
    }
    if let Some(row) = rows.last_mut() {
        row.push(Segment::new(std::mem::take(current), slot));
    }
}

#[derive(Debug)]
pub struct ScrollBuffer {
    lines: VecDeque<BufferLine>,
    capacity: usize,
    offset: usize,
    unseen: usize,
    /// Chat messages received, including any trimmed from the front
    messages: usize,
}

impl ScrollBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity: capacity.max(1),
            offset: 0,
            unseen: 0,
            messages: 0,
        }
    }

    pub fn push_item(&mut self, item: &FeedItem) {
        if item.as_chat().is_some() {
            self.messages += 1;
        }
        self.push(BufferLine::from_item(item));
    }

    pub fn message_count(&self) -> usize {
        self.messages
    }

    pub fn push(&mut self, line: BufferLine) {
        self.lines.push_back(line);
        if self.offset > 0 {
            // keep the viewport on the same entries
            self.offset += 1;
            self.unseen += 1;
        }

        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
        self.clamp_offset();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[cfg(test)]
    pub fn lines(&self) -> impl Iterator<Item = &BufferLine> {
        self.lines.iter()
    }

    #[cfg(test)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Entries that arrived while scrolled back
    pub fn unseen(&self) -> usize {
        self.unseen
    }

    pub fn is_following(&self) -> bool {
        self.offset == 0
    }

    pub fn scroll_up(&mut self, entries: usize) {
        self.offset = self.offset.saturating_add(entries);
        self.clamp_offset();
    }

    pub fn scroll_down(&mut self, entries: usize) {
        self.offset = self.offset.saturating_sub(entries);
        if self.offset == 0 {
            self.unseen = 0;
        }
    }

    pub fn jump_to_latest(&mut self) {
        self.offset = 0;
        self.unseen = 0;
    }

    fn clamp_offset(&mut self) {
        let max = self.lines.len().saturating_sub(1);
        if self.offset > max {
            self.offset = max;
        }
        self.unseen = self.unseen.min(self.offset);
    }

    /// Rows for a viewport, bottom-aligned on the last visible entry
    pub fn visible_rows(&self, width: usize, height: usize) -> Vec<Vec<Segment>> {
        if height == 0 {
            return Vec::new();
        }

        let end = self.lines.len().saturating_sub(self.offset);
        let mut rows = Vec::with_capacity(height);
        'outer: for line in self.lines.range(..end).rev() {
            for row in line.wrap(width).into_iter().rev() {
                rows.push(row);
                if rows.len() == height {
                    break 'outer;
                }
            }
        }

        rows.reverse();
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackchat_protocol::{MessageId, NoticeKind, Role};

    fn message(seq: u64, body: &str) -> ChatMessage {
        ChatMessage::new(
            MessageId::Source(seq.to_string()),
            "alice".into(),
            Role::Staff,
            body.into(),
            Utc::now(),
            seq,
        )
    }

    fn row_text(row: &[Segment]) -> String {
        row.iter().map(|s| s.text.as_str()).collect()
    }

    fn filled(count: u64) -> ScrollBuffer {
        let mut buffer = ScrollBuffer::new(100);
        for seq in 1..=count {
            buffer.push_item(&FeedItem::Chat(message(seq, &format!("m{}", seq))));
        }
        buffer
    }

    #[test]
    fn test_message_format() {
        let line = BufferLine::from_message(&message(1, "hello"));
        let text = line.plain_text();
        assert!(text.starts_with("[ "));
        assert!(text.ends_with(" ] ( alice ) : hello"));
        assert_eq!(line.segments[3].slot, PaletteSlot::Staff);
    }

    #[test]
    fn test_notice_format() {
        let notice = SystemNotice::new(NoticeKind::SendFailed, "not sent");
        let line = BufferLine::from_notice(&notice);
        assert!(line.plain_text().ends_with(" ] * not sent"));
        assert_eq!(line.segments.last().unwrap().slot, PaletteSlot::Warning);
    }

    #[test]
    fn test_wrap_splits_at_width() {
        let line = BufferLine {
            segments: vec![
                Segment::new("abc", PaletteSlot::Punctuation),
                Segment::new("defgh", PaletteSlot::Body),
            ],
        };
        let rows = line.wrap(4);
        let texts: Vec<_> = rows.iter().map(|r| row_text(r)).collect();
        assert_eq!(texts, vec!["abcd", "efgh"]);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[0][1].slot, PaletteSlot::Body);
    }

    #[test]
    fn test_wrap_counts_wide_glyphs_as_two_columns() {
        let line = BufferLine {
            segments: vec![Segment::new("漢漢漢", PaletteSlot::Body)],
        };
        let texts: Vec<_> = line.wrap(5).iter().map(|r| row_text(r)).collect();
        assert_eq!(texts, vec!["漢漢", "漢"]);

        let line = BufferLine {
            segments: vec![Segment::new("ab漢c", PaletteSlot::Body)],
        };
        let texts: Vec<_> = line.wrap(3).iter().map(|r| row_text(r)).collect();
        assert_eq!(texts, vec!["ab", "漢c"]);
    }

    #[test]
    fn test_wrap_honors_newlines() {
        let line = BufferLine {
            segments: vec![Segment::new("one\ntwo", PaletteSlot::Body)],
        };
        let texts: Vec<_> = line.wrap(80).iter().map(|r| row_text(r)).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut buffer = ScrollBuffer::new(3);
        for seq in 1..=5 {
            buffer.push_item(&FeedItem::Chat(message(seq, &format!("m{}", seq))));
        }
        assert_eq!(buffer.len(), 3);
        assert!(buffer.lines().next().unwrap().plain_text().ends_with("m3"));
    }

    #[test]
    fn test_visible_rows_follow_latest() {
        let buffer = filled(10);
        let rows = buffer.visible_rows(200, 3);
        assert_eq!(rows.len(), 3);
        assert!(row_text(&rows[2]).ends_with("m10"));
        assert!(row_text(&rows[0]).ends_with("m8"));
    }

    #[test]
    fn test_scrolled_view_stays_put_as_messages_arrive() {
        let mut buffer = filled(10);
        buffer.scroll_up(2);
        let before = buffer.visible_rows(200, 3);

        buffer.push_item(&FeedItem::Chat(message(11, "m11")));
        buffer.push_item(&FeedItem::Chat(message(12, "m12")));

        assert_eq!(buffer.visible_rows(200, 3), before);
        assert_eq!(buffer.unseen(), 2);
        assert!(!buffer.is_following());

        buffer.jump_to_latest();
        assert!(buffer.is_following());
        assert_eq!(buffer.unseen(), 0);
        assert!(row_text(&buffer.visible_rows(200, 1)[0]).ends_with("m12"));
    }

    #[test]
    fn test_scroll_bounds() {
        let mut buffer = filled(5);
        buffer.scroll_up(100);
        assert_eq!(buffer.offset(), 4);
        assert!(row_text(&buffer.visible_rows(200, 5)[0]).ends_with("m1"));

        buffer.scroll_down(100);
        assert_eq!(buffer.offset(), 0);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = ScrollBuffer::new(10);
        assert!(buffer.is_empty());
        assert!(buffer.visible_rows(80, 10).is_empty());
        assert!(filled(1).visible_rows(80, 0).is_empty());
    }

    #[test]
    fn test_message_count_ignores_notices_and_trimming() {
        let mut buffer = ScrollBuffer::new(2);
        for seq in 1..=4 {
            buffer.push_item(&FeedItem::Chat(message(seq, "m")));
        }
        buffer.push_item(&FeedItem::Notice(SystemNotice::info("hello")));
        assert_eq!(buffer.message_count(), 4);
        assert_eq!(buffer.len(), 2);
    }
}

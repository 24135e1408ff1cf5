use chrono::{DateTime, Utc};

use super::message::ChatMessage;

/// Category of a system notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    /// First successful login
    Connected,
    /// Capture lost, reconnection starting
    Disconnected,
    /// Capture re-established after a fault
    Reconnected { attempt: u32 },
    /// Messages evicted from a full channel during one overflow episode
    Dropped { count: u64 },
    /// An outgoing message was rejected or failed to transmit
    SendFailed,
    /// Reconnection attempts exhausted
    Terminated,
}

impl NoticeKind {
    /// Whether this notice reports a problem
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::Dropped { .. } | Self::SendFailed | Self::Terminated
        )
    }
}

/// A synthetic, non-chat line shown in the scroll buffer
#[derive(Debug, Clone, PartialEq)]
pub struct SystemNotice {
    pub kind: NoticeKind,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl SystemNotice {
    pub fn new(kind: NoticeKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, text)
    }

    pub fn dropped(count: u64) -> Self {
        let noun = if count == 1 { "message" } else { "messages" };
        Self::new(
            NoticeKind::Dropped { count },
            format!("{} {} dropped: display fell behind", count, noun),
        )
    }

    pub fn send_failed(text: impl Into<String>) -> Self {
        Self::new(NoticeKind::SendFailed, text)
    }
}

/// An entry travelling from the capture side to the display
#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Chat(ChatMessage),
    Notice(SystemNotice),
}

impl FeedItem {
    pub fn as_chat(&self) -> Option<&ChatMessage> {
        match self {
            Self::Chat(msg) => Some(msg),
            Self::Notice(_) => None,
        }
    }

    pub fn as_notice(&self) -> Option<&SystemNotice> {
        match self {
            Self::Notice(notice) => Some(notice),
            Self::Chat(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_notice_text() {
        let one = SystemNotice::dropped(1);
        assert_eq!(one.kind, NoticeKind::Dropped { count: 1 });
        assert!(one.text.starts_with("1 message dropped"));

        let many = SystemNotice::dropped(12);
        assert!(many.text.starts_with("12 messages dropped"));
    }

    #[test]
    fn test_error_kinds() {
        assert!(NoticeKind::Dropped { count: 3 }.is_error());
        assert!(NoticeKind::Terminated.is_error());
        assert!(!NoticeKind::Reconnected { attempt: 1 }.is_error());
        assert!(!NoticeKind::Info.is_error());
    }

    #[test]
    fn test_feed_item_accessors() {
        let item = FeedItem::Notice(SystemNotice::info("hello"));
        assert!(item.as_chat().is_none());
        assert_eq!(item.as_notice().map(|n| n.text.as_str()), Some("hello"));
    }
}

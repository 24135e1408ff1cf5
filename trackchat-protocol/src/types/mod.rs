//! Core types for trackchat

mod message;
mod notice;
mod session;

pub use message::{ChatMessage, MessageCandidate, MessageId, Role};
pub use notice::{FeedItem, NoticeKind, SystemNotice};
pub use session::SessionState;

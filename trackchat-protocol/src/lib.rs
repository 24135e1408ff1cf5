//! trackchat-protocol: Shared chat definitions
//!
//! This crate defines the structured chat data model and the JSON fragment
//! format produced by the observer script injected into the tracker page.

pub mod fragment;
pub mod types;

// Re-export main types at crate root
pub use fragment::{FragmentError, RawBatch, RawFragment};
pub use types::{
    ChatMessage, FeedItem, MessageCandidate, MessageId, NoticeKind, Role, SessionState,
    SystemNotice,
};

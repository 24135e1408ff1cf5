//! Fragment extraction
//!
//! Turns observer fragments into [`MessageCandidate`]s. Pure: no I/O, no
//! shared state. A fragment that cannot be read is reported and skipped;
//! it never stops the rest of the batch.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

use trackchat_protocol::{FragmentError, MessageCandidate, RawBatch, RawFragment, Role};

/// Sender shown when the entry has no username
pub const UNKNOWN_SENDER: &str = "unknown";

lazy_static! {
    static ref BREAK_TAG: Regex = Regex::new(r"(?i)<br\s*/?>").unwrap();
    static ref BLOCK_END_TAG: Regex = Regex::new(r"(?i)</(p|div|li|blockquote)>").unwrap();
    static ref IMG_ALT: Regex = Regex::new(r#"(?i)<img[^>]*\balt="([^"]*)"[^>]*>"#).unwrap();
    static ref ANY_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref NUMERIC_ENTITY: Regex = Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap();
    static ref BB_BOLD: Regex = Regex::new(r"(?is)\[b\](.*?)\[/b\]").unwrap();
    static ref BB_ITALIC: Regex = Regex::new(r"(?is)\[i\](.*?)\[/i\]").unwrap();
    static ref BB_COLOR: Regex = Regex::new(r"(?is)\[color=[^\]]*\](.*?)\[/color\]").unwrap();
    static ref SPACES: Regex = Regex::new(r"[ \t\u{a0}]+").unwrap();
}

/// Why a fragment produced no candidate
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("malformed fragment: {0}")]
    Malformed(#[from] FragmentError),

    #[error("fragment has no message body")]
    EmptyBody,
}

/// Result of extracting one batch
#[derive(Debug, Default)]
pub struct Extraction {
    /// Candidates in page order
    pub candidates: Vec<MessageCandidate>,
    /// Fragment index and reason for every skipped fragment
    pub rejected: Vec<(usize, ExtractionError)>,
}

/// Converts fragments into message candidates
#[derive(Debug, Clone)]
pub struct MessageExtractor {
    staff_groups: Vec<String>,
}

impl MessageExtractor {
    pub fn new(staff_groups: &[String]) -> Self {
        Self {
            staff_groups: staff_groups
                .iter()
                .map(|g| g.trim().to_lowercase())
                .filter(|g| !g.is_empty())
                .collect(),
        }
    }

    /// Extract every fragment of a batch, preserving order
    pub fn extract(&self, batch: &RawBatch) -> Extraction {
        let mut extraction = Extraction::default();

        for (index, raw) in batch.fragments.iter().enumerate() {
            match self.extract_fragment(raw, batch.received_at) {
                Ok(candidate) => extraction.candidates.push(candidate),
                Err(e) => {
                    match &e {
                        ExtractionError::Malformed(_) => {
                            tracing::warn!(index, error = %e, "Skipping unreadable fragment")
                        }
                        ExtractionError::EmptyBody => {
                            tracing::debug!(index, "Skipping fragment without body")
                        }
                    }
                    extraction.rejected.push((index, e));
                }
            }
        }

        extraction
    }

    /// Extract a single fragment
    ///
    /// `received_at` stands in for the timestamp when the page gave none.
    pub fn extract_fragment(
        &self,
        raw: &str,
        received_at: DateTime<Utc>,
    ) -> Result<MessageCandidate, ExtractionError> {
        let fragment = RawFragment::parse(raw)?;

        let body = fragment
            .html
            .as_deref()
            .map(normalize_body)
            .unwrap_or_default();
        if body.is_empty() {
            return Err(ExtractionError::EmptyBody);
        }

        let sender = fragment
            .sender
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SENDER)
            .to_string();

        let reported = fragment.time.as_deref().and_then(parse_timestamp);

        Ok(MessageCandidate {
            id: fragment.id,
            sender,
            role: self.classify_role(fragment.role.as_deref()),
            body,
            timestamp: reported.unwrap_or(received_at),
        })
    }

    /// Map the page's group hint onto a role
    pub fn classify_role(&self, hint: Option<&str>) -> Role {
        let Some(hint) = hint else {
            return Role::Regular;
        };
        let hint = hint.to_lowercase();

        if hint.contains("system") || hint.contains("bot") {
            Role::System
        } else if self.staff_groups.iter().any(|g| hint.contains(g.as_str())) {
            Role::Staff
        } else {
            Role::Regular
        }
    }
}

/// Convert message HTML into display text
pub fn normalize_body(html: &str) -> String {
    let text = BREAK_TAG.replace_all(html, "\n");
    let text = BLOCK_END_TAG.replace_all(&text, "\n");
    let text = IMG_ALT.replace_all(&text, "$1");
    let text = ANY_TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = render_bbcode(&text);

    text.lines()
        .map(|line| SPACES.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the BBCode subset the chatbox passes through as plain text
pub fn render_bbcode(text: &str) -> String {
    let text = BB_BOLD.replace_all(text, |caps: &Captures| caps[1].to_uppercase());
    let text = BB_ITALIC.replace_all(&text, "_${1}_");
    BB_COLOR.replace_all(&text, "$1").into_owned()
}

fn decode_entities(text: &str) -> String {
    let text = NUMERIC_ENTITY.replace_all(text, |caps: &Captures| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    // &amp; last so "&amp;lt;" stays literal
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Parse the page's timestamp formats; naive times are local
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    None
}

//! Observer fragment format
//!
//! The observer script injected into the tracker page serializes every
//! appended chat entry as one JSON object. All fields are optional: the
//! page markup varies between tracker versions and entries are sometimes
//! rendered half-way when the observer fires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Errors decoding a single fragment
#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    #[error("fragment is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One chat entry as reported by the observer script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFragment {
    /// Message id from the entry's data attributes
    #[serde(deserialize_with = "string_or_number")]
    pub id: Option<String>,
    /// Username text
    pub sender: Option<String>,
    /// Group / rank hint (icon title or class names)
    pub role: Option<String>,
    /// `title` attribute of the entry's `<time>` element
    pub time: Option<String>,
    /// Inner HTML of the message content section
    pub html: Option<String>,
}

impl RawFragment {
    /// Decode one fragment as emitted by the observer
    pub fn parse(raw: &str) -> Result<Self, FragmentError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Encode in the observer's wire form
    pub fn to_json(&self) -> String {
        // Serializing a struct of strings cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// One change notification: fragments in page order plus the capture instant
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch {
    pub fragments: Vec<String>,
    pub received_at: DateTime<Utc>,
}

impl RawBatch {
    pub fn new(fragments: Vec<String>) -> Self {
        Self {
            fragments,
            received_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_fragment() {
        let raw = r#"{"id":"981","sender":"alice","role":"Moderator","time":"2024-05-01T12:30:05+00:00","html":"hi <b>there</b>"}"#;
        let frag = RawFragment::parse(raw).unwrap();
        assert_eq!(frag.id.as_deref(), Some("981"));
        assert_eq!(frag.sender.as_deref(), Some("alice"));
        assert_eq!(frag.role.as_deref(), Some("Moderator"));
        assert_eq!(frag.html.as_deref(), Some("hi <b>there</b>"));
    }

    #[test]
    fn test_numeric_id_accepted() {
        let frag = RawFragment::parse(r#"{"id":42,"html":"x"}"#).unwrap();
        assert_eq!(frag.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_blank_and_null_ids_are_absent() {
        assert_eq!(RawFragment::parse(r#"{"id":"  "}"#).unwrap().id, None);
        assert_eq!(RawFragment::parse(r#"{"id":null}"#).unwrap().id, None);
        assert_eq!(RawFragment::parse(r#"{}"#).unwrap().id, None);
    }

    #[test]
    fn test_missing_fields_default_to_none() {
        let frag = RawFragment::parse(r#"{"html":"only body"}"#).unwrap();
        assert!(frag.sender.is_none());
        assert!(frag.time.is_none());
        assert!(frag.role.is_none());
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(RawFragment::parse("<li>not json</li>").is_err());
    }

    #[test]
    fn test_to_json_is_parseable() {
        let frag = RawFragment {
            id: Some("7".into()),
            sender: Some("bob".into()),
            html: Some("yo".into()),
            ..Default::default()
        };
        assert_eq!(RawFragment::parse(&frag.to_json()).unwrap(), frag);
    }

    #[test]
    fn test_batch_len() {
        let batch = RawBatch::new(vec!["{}".into(), "{}".into()]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
    }
}

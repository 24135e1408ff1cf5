//! Page-side scripts
//!
//! The observer is a MutationObserver on the chat container. Each appended
//! `<li>` entry is serialized into a JSON fragment and queued on
//! `window.__trackchat`; the poll task drains that queue.

use serde_json::{json, Value};

use crate::config::SelectorConfig;

/// Installs the observer. Returns `true` when installed (or already present),
/// `false` when the chat container is missing.
pub const INSTALL_SCRIPT: &str = r#"
return (function (sel) {
  if (window.__trackchat) { return true; }
  var container = document.querySelector(sel.container);
  if (!container) { return false; }
  var queue = [];
  function text(node, selector) {
    var el = node.querySelector(selector);
    return el ? el.textContent.trim() : null;
  }
  function capture(node) {
    if (node.nodeType !== 1 || node.tagName !== 'LI') { return; }
    var role = node.querySelector(sel.role);
    var time = node.querySelector(sel.time);
    var content = node.querySelector(sel.content);
    queue.push(JSON.stringify({
      id: node.getAttribute('data-id') || node.getAttribute('id'),
      sender: text(node, sel.sender),
      role: role ? (role.getAttribute('title') || role.className || null) : null,
      time: time ? (time.getAttribute('datetime') || time.getAttribute('title')) : null,
      html: content ? content.innerHTML : null
    }));
  }
  var observer = new MutationObserver(function (mutations) {
    mutations.forEach(function (m) { m.addedNodes.forEach(capture); });
  });
  observer.observe(container, { childList: true });
  window.__trackchat = {
    observer: observer,
    container: container,
    drain: function () { var out = queue; queue = []; return out; }
  };
  return true;
})(arguments[0]);
"#;

/// Returns queued fragments, or `null` when the observer is gone
/// (the page navigated or reloaded).
pub const DRAIN_SCRIPT: &str = r#"
if (!window.__trackchat) { return null; }
return window.__trackchat.drain();
"#;

/// `true` while the observer is installed and its container is still attached
pub const PROBE_SCRIPT: &str = r#"
var t = window.__trackchat;
return !!(t && t.container && t.container.isConnected);
"#;

/// Selector argument passed to [`INSTALL_SCRIPT`]
pub fn install_args(selectors: &SelectorConfig) -> Vec<Value> {
    vec![json!({
        "container": selectors.messages_container,
        "sender": selectors.message_sender,
        "role": selectors.message_role,
        "time": selectors.message_time,
        "content": selectors.message_content,
    })]
}

/// Decode a drain result into fragment strings
///
/// `None` means the observer is no longer installed.
pub fn drained_fragments(value: Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_args_carry_selectors() {
        let selectors = SelectorConfig::default();
        let args = install_args(&selectors);
        assert_eq!(args.len(), 1);
        assert_eq!(args[0]["container"], "ul.chatroom__messages");
        assert_eq!(args[0]["content"], "section.chatbox-message__content");
    }

    #[test]
    fn test_drained_strings() {
        let value = json!(["{\"id\":1}", "{\"id\":2}"]);
        assert_eq!(
            drained_fragments(value).unwrap(),
            vec!["{\"id\":1}".to_string(), "{\"id\":2}".to_string()]
        );
    }

    #[test]
    fn test_drained_objects_are_reserialized() {
        let value = json!([{ "id": 3 }]);
        let fragments = drained_fragments(value).unwrap();
        assert_eq!(fragments, vec!["{\"id\":3}".to_string()]);
    }

    #[test]
    fn test_null_drain_means_observer_missing() {
        assert!(drained_fragments(Value::Null).is_none());
    }

    #[test]
    fn test_scripts_return_values() {
        assert!(INSTALL_SCRIPT.contains("return (function"));
        assert!(DRAIN_SCRIPT.contains("return null"));
        assert!(PROBE_SCRIPT.trim_start().starts_with("var t"));
    }
}

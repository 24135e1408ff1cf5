//! Default configuration values
//!
//! Printed by `trackchat --print-default-config` as a starting point.

/// Default configuration as TOML
pub const DEFAULT_CONFIG_TOML: &str = r##"
# trackchat configuration

[tracker]
# url = "https://tracker.example"
# username = "alice"
# Set TRACKER_PASSWORD in the environment or a .env file instead of here.

[webdriver]
endpoint = "http://localhost:9515"
browser = "MicrosoftEdge"
headless = true
request_timeout_secs = 30
login_timeout_secs = 20
chat_load_timeout_secs = 60
poll_interval_ms = 50

[selectors]
username_input = "#username"
password_input = "#password"
login_button_xpath = '//button[contains(text(), "Login")]'
messages_container = "ul.chatroom__messages"
message_sender = "header address a span"
message_role = "header address i"
message_time = "header time"
message_content = "section.chatbox-message__content"
chat_input = "textarea#chatbox__messages-create"
staff_groups = ["owner", "admin", "moderator", "staff", "editor", "internal"]

[pipeline]
channel_capacity = 1024
backpressure_wait_ms = 250
dedup_max_ids = 10000
dedup_retention_secs = 3600
timestamp_granularity_secs = 1

[session]
health_interval_ms = 5000
health_timeout_ms = 3000
failure_threshold = 3
backoff_initial_ms = 1000
backoff_multiplier = 2
backoff_max_ms = 30000
max_reconnect_attempts = 3

[ui]
poll_interval_ms = 50
scrollback_lines = 5000
max_message_length = 500
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ConfigLoader};
    use std::path::Path;

    #[test]
    fn test_default_toml_matches_built_in_defaults() {
        let parsed = ConfigLoader::parse(DEFAULT_CONFIG_TOML, Path::new("defaults.toml")).unwrap();
        let built_in = AppConfig::default();

        assert_eq!(parsed.webdriver.endpoint, built_in.webdriver.endpoint);
        assert_eq!(parsed.selectors.login_button_xpath, built_in.selectors.login_button_xpath);
        assert_eq!(parsed.selectors.staff_groups, built_in.selectors.staff_groups);
        assert_eq!(parsed.pipeline.channel_capacity, built_in.pipeline.channel_capacity);
        assert_eq!(parsed.session.backoff_max_ms, built_in.session.backoff_max_ms);
        assert_eq!(parsed.ui.max_message_length, built_in.ui.max_message_length);
        assert!(parsed.tracker.url.is_none());
    }

    #[test]
    fn test_default_toml_validates() {
        let parsed = ConfigLoader::parse(DEFAULT_CONFIG_TOML, Path::new("defaults.toml")).unwrap();
        assert!(ConfigLoader::validate(&parsed).is_ok());
    }
}

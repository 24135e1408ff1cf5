//! Configuration schema structs

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub webdriver: WebDriverConfig,
    pub selectors: SelectorConfig,
    pub pipeline: PipelineConfig,
    pub session: SessionConfig,
    pub ui: UiConfig,
}

/// Tracker site and credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Base URL, e.g. "https://tracker.example"
    pub url: Option<String>,
    pub username: Option<String>,
    /// Prefer TRACKER_PASSWORD in the environment over storing this here
    pub password: Option<String>,
}

/// WebDriver endpoint and browser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// Driver endpoint (msedgedriver and chromedriver listen on 9515)
    pub endpoint: String,
    /// Capability browserName: "MicrosoftEdge", "chrome" or "firefox"
    pub browser: String,
    pub headless: bool,
    /// Timeout for a single WebDriver HTTP request
    pub request_timeout_secs: u64,
    /// Wait for login form fields and the post-login redirect
    pub login_timeout_secs: u64,
    /// Wait for the chat container after login
    pub chat_load_timeout_secs: u64,
    /// How often the page-side message queue is drained
    pub poll_interval_ms: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9515".into(),
            browser: "MicrosoftEdge".into(),
            headless: true,
            request_timeout_secs: 30,
            login_timeout_secs: 20,
            chat_load_timeout_secs: 60,
            poll_interval_ms: 50,
        }
    }
}

impl WebDriverConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// CSS selectors for the tracker's login form and chatbox markup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub username_input: String,
    pub password_input: String,
    /// XPath, since the login button is only identifiable by its label
    pub login_button_xpath: String,
    pub messages_container: String,
    pub message_sender: String,
    pub message_role: String,
    pub message_time: String,
    pub message_content: String,
    pub chat_input: String,
    /// Role hints that mark a sender as staff (case-insensitive substrings)
    pub staff_groups: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            username_input: "#username".into(),
            password_input: "#password".into(),
            login_button_xpath: r#"//button[contains(text(), "Login")]"#.into(),
            messages_container: "ul.chatroom__messages".into(),
            message_sender: "header address a span".into(),
            message_role: "header address i".into(),
            message_time: "header time".into(),
            message_content: "section.chatbox-message__content".into(),
            chat_input: "textarea#chatbox__messages-create".into(),
            staff_groups: ["owner", "admin", "moderator", "staff", "editor", "internal"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Capture pipeline sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Items the hand-off channel holds before the capture side waits
    pub channel_capacity: usize,
    /// How long the capture side waits on a full channel before evicting
    pub backpressure_wait_ms: u64,
    /// Maximum number of remembered message ids
    pub dedup_max_ids: usize,
    /// Maximum age of a remembered message id
    pub dedup_retention_secs: u64,
    /// Resolution of the page's timestamps, used for synthetic ids
    pub timestamp_granularity_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            backpressure_wait_ms: 250,
            dedup_max_ids: 10_000,
            dedup_retention_secs: 3600,
            timestamp_granularity_secs: 1,
        }
    }
}

impl PipelineConfig {
    pub fn backpressure_wait(&self) -> Duration {
        Duration::from_millis(self.backpressure_wait_ms)
    }

    pub fn dedup_retention(&self) -> Duration {
        Duration::from_secs(self.dedup_retention_secs)
    }
}

/// Health checking and reconnection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub health_interval_ms: u64,
    /// A health check that takes longer than this counts as failed
    pub health_timeout_ms: u64,
    /// Consecutive failed checks before the session is considered lost
    pub failure_threshold: u32,
    pub backoff_initial_ms: u64,
    pub backoff_multiplier: u32,
    pub backoff_max_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            health_interval_ms: 5000,
            health_timeout_ms: 3000,
            failure_threshold: 3,
            backoff_initial_ms: 1000,
            backoff_multiplier: 2,
            backoff_max_ms: 30_000,
            max_reconnect_attempts: 3,
        }
    }
}

/// Terminal presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Upper bound on how long a render cycle waits for input or messages
    pub poll_interval_ms: u64,
    /// Lines kept in the scroll buffer
    pub scrollback_lines: usize,
    /// Longest message the dispatcher accepts, in characters
    pub max_message_length: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            scrollback_lines: 5000,
            max_message_length: 500,
        }
    }
}

impl UiConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

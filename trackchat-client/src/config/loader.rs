//! Configuration loader

use std::path::Path;

use trackchat_utils::{config_file, Result, TrackchatError};
use url::Url;

use super::AppConfig;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<AppConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            Ok(AppConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| TrackchatError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<AppConfig> {
        toml::from_str(content).map_err(|e| TrackchatError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate pipeline, session and UI settings
    pub fn validate(config: &AppConfig) -> Result<()> {
        if config.pipeline.channel_capacity == 0 {
            return Err(TrackchatError::config("channel_capacity must be at least 1"));
        }

        if config.pipeline.dedup_max_ids == 0 {
            return Err(TrackchatError::config("dedup_max_ids must be at least 1"));
        }

        if config.pipeline.timestamp_granularity_secs == 0 {
            return Err(TrackchatError::config(
                "timestamp_granularity_secs must be at least 1",
            ));
        }

        let session = &config.session;
        if session.failure_threshold == 0 {
            return Err(TrackchatError::config("failure_threshold must be at least 1"));
        }
        if session.max_reconnect_attempts == 0 || session.max_reconnect_attempts > 20 {
            return Err(TrackchatError::config(
                "max_reconnect_attempts must be between 1 and 20",
            ));
        }
        if session.backoff_multiplier == 0 {
            return Err(TrackchatError::config("backoff_multiplier must be at least 1"));
        }
        if session.backoff_initial_ms > session.backoff_max_ms {
            return Err(TrackchatError::config(
                "backoff_initial_ms must not exceed backoff_max_ms",
            ));
        }

        if config.ui.poll_interval_ms < 8 {
            return Err(TrackchatError::config(
                "ui.poll_interval_ms must be at least 8 (120fps max)",
            ));
        }
        if config.ui.max_message_length == 0 {
            return Err(TrackchatError::config("max_message_length must be at least 1"));
        }
        if config.ui.scrollback_lines == 0 {
            return Err(TrackchatError::config("scrollback_lines must be at least 1"));
        }

        Ok(())
    }

    /// Validate the settings needed to log in through a browser
    pub fn validate_tracker(config: &AppConfig) -> Result<Url> {
        let raw = config
            .tracker
            .url
            .as_deref()
            .ok_or(TrackchatError::MissingSetting("tracker.url (TRACKER_URL)"))?;
        let url = Url::parse(raw)
            .map_err(|e| TrackchatError::config(format!("Invalid tracker URL '{}': {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TrackchatError::config(format!(
                "Tracker URL must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if config.tracker.username.as_deref().map_or(true, str::is_empty) {
            return Err(TrackchatError::MissingSetting(
                "tracker.username (TRACKER_USERNAME)",
            ));
        }
        if config.tracker.password.as_deref().map_or(true, str::is_empty) {
            return Err(TrackchatError::MissingSetting(
                "tracker.password (TRACKER_PASSWORD)",
            ));
        }

        Url::parse(&config.webdriver.endpoint).map_err(|e| {
            TrackchatError::config(format!(
                "Invalid WebDriver endpoint '{}': {}",
                config.webdriver.endpoint, e
            ))
        })?;

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tracker_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.tracker.url = Some("https://tracker.example".into());
        config.tracker.username = Some("alice".into());
        config.tracker.password = Some("hunter2".into());
        config
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(
            &path,
            r#"
            [pipeline]
            channel_capacity = 64

            [session]
            max_reconnect_attempts = 5
            "#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.pipeline.channel_capacity, 64);
        assert_eq!(config.session.max_reconnect_attempts, 5);
        // Untouched sections keep defaults
        assert_eq!(config.ui.max_message_length, 500);
    }

    #[test]
    fn test_load_missing_path_is_file_read_error() {
        let dir = tempdir().unwrap();
        let result = ConfigLoader::load_from_path(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(TrackchatError::FileRead { .. })));
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = ConfigLoader::parse("invalid { toml", Path::new("test.toml"));
        assert!(matches!(result, Err(TrackchatError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_defaults_validate() {
        assert!(ConfigLoader::validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut config = AppConfig::default();
        config.pipeline.channel_capacity = 0;
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_backoff_bounds() {
        let mut config = AppConfig::default();
        config.session.backoff_initial_ms = 60_000;
        config.session.backoff_max_ms = 1_000;
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_unbounded_retries_rejected() {
        let mut config = AppConfig::default();
        config.session.max_reconnect_attempts = 0;
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_tracker_ok() {
        let url = ConfigLoader::validate_tracker(&tracker_config()).unwrap();
        assert_eq!(url.host_str(), Some("tracker.example"));
    }

    #[test]
    fn test_validate_tracker_missing_url() {
        let mut config = tracker_config();
        config.tracker.url = None;
        assert!(matches!(
            ConfigLoader::validate_tracker(&config),
            Err(TrackchatError::MissingSetting(_))
        ));
    }

    #[test]
    fn test_validate_tracker_rejects_non_http() {
        let mut config = tracker_config();
        config.tracker.url = Some("ftp://tracker.example".into());
        assert!(ConfigLoader::validate_tracker(&config).is_err());
    }

    #[test]
    fn test_validate_tracker_empty_password() {
        let mut config = tracker_config();
        config.tracker.password = Some(String::new());
        assert!(matches!(
            ConfigLoader::validate_tracker(&config),
            Err(TrackchatError::MissingSetting(_))
        ));
    }
}

//! Command-line argument parsing
//!
//! Credentials can come from flags, the environment or a `.env` file;
//! anything given here overrides `config.toml`.

use clap::Parser;
use std::path::PathBuf;

use crate::config::AppConfig;

/// trackchat - live tracker chatbox in the terminal
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (defaults to the XDG config directory)
    #[arg(long, short = 'c', env = "TRACKCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tracker base URL, e.g. https://tracker.example
    #[arg(long, env = "TRACKER_URL")]
    pub url: Option<String>,

    /// Tracker username
    #[arg(long, short = 'u', env = "TRACKER_USERNAME")]
    pub username: Option<String>,

    /// Tracker password
    #[arg(long, env = "TRACKER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// WebDriver endpoint
    #[arg(long, env = "WEBDRIVER_URL")]
    pub webdriver: Option<String>,

    /// Browser name passed to WebDriver (MicrosoftEdge, chrome, firefox)
    #[arg(long)]
    pub browser: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long, default_value_t = false)]
    pub headed: bool,

    /// Verbose logging to the log file
    #[arg(long, short = 'd', default_value_t = false)]
    pub debug: bool,

    /// Use the offline echo source instead of a browser
    #[arg(long, default_value_t = false)]
    pub loopback: bool,

    /// Print the default configuration and exit
    #[arg(long, default_value_t = false)]
    pub print_default_config: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Overlay command-line values onto the loaded configuration
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(url) = &self.url {
            config.tracker.url = Some(url.clone());
        }
        if let Some(username) = &self.username {
            config.tracker.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.tracker.password = Some(password.clone());
        }
        if let Some(endpoint) = &self.webdriver {
            config.webdriver.endpoint = endpoint.clone();
        }
        if let Some(browser) = &self.browser {
            config.webdriver.browser = browser.clone();
        }
        if self.headed {
            config.webdriver.headless = false;
        }
    }
}

// Keeps the password out of debug logs
impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("config", &self.config)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("webdriver", &self.webdriver)
            .field("browser", &self.browser)
            .field("headed", &self.headed)
            .field("debug", &self.debug)
            .field("loopback", &self.loopback)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_defaults() {
        let args = Args::parse_from(["trackchat"]);
        assert!(!args.debug);
        assert!(!args.loopback);
        assert!(!args.headed);
        assert!(!args.print_default_config);
        assert!(args.browser.is_none());
    }

    #[test]
    fn test_credentials_from_flags() {
        let args = Args::parse_from([
            "trackchat",
            "--url",
            "https://tracker.example",
            "-u",
            "alice",
            "--password",
            "hunter2",
        ]);
        let mut config = AppConfig::default();
        args.apply_to(&mut config);

        assert_eq!(config.tracker.url.as_deref(), Some("https://tracker.example"));
        assert_eq!(config.tracker.username.as_deref(), Some("alice"));
        assert_eq!(config.tracker.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "trackchat",
            "--webdriver",
            "http://127.0.0.1:4444",
            "--browser",
            "firefox",
            "--headed",
        ]);
        let mut config = AppConfig::default();
        config.tracker.username = Some("from-file".into());
        args.apply_to(&mut config);

        assert_eq!(config.webdriver.endpoint, "http://127.0.0.1:4444");
        assert_eq!(config.webdriver.browser, "firefox");
        assert!(!config.webdriver.headless);
        // untouched when no flag is given
        assert_eq!(config.tracker.username.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_config_path() {
        let args = Args::parse_from(["trackchat", "-c", "/tmp/trackchat.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/trackchat.toml")));
    }

    #[test]
    fn test_debug_output_redacts_password() {
        let args = Args::parse_from(["trackchat", "--password", "hunter2"]);
        let rendered = format!("{:?}", args);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_mode_flags() {
        let args = Args::parse_from(["trackchat", "--loopback", "-d"]);
        assert!(args.loopback);
        assert!(args.debug);
    }
}

//! Tracker chatbox source
//!
//! Drives a browser through WebDriver: logs in, waits for the chatbox,
//! installs the observer and drains it on a fixed interval.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use url::Url;

use trackchat_protocol::RawBatch;
use trackchat_utils::{Result, TrackchatError};

use super::observer::{drained_fragments, install_args, DRAIN_SCRIPT, INSTALL_SCRIPT, PROBE_SCRIPT};
use super::webdriver::{capabilities, BrowserSession, Locator, WebDriverClient, ENTER_KEY};
use super::{ContentStream, EventSource, SourceHealth};
use crate::config::{AppConfig, SelectorConfig};

/// Batches buffered between the poll task and the capture pipeline
const STREAM_BUFFER: usize = 256;

/// Everything needed to log in and watch the chat
#[derive(Debug, Clone)]
struct TrackerSettings {
    base_url: Url,
    username: String,
    password: String,
    browser: String,
    headless: bool,
    login_timeout: Duration,
    chat_timeout: Duration,
    poll_interval: Duration,
    selectors: SelectorConfig,
}

struct ActiveSession {
    browser: BrowserSession,
    poller: JoinHandle<()>,
}

/// Event source backed by a logged-in browser session
pub struct TrackerSource {
    driver: WebDriverClient,
    settings: TrackerSettings,
    session: Mutex<Option<ActiveSession>>,
    /// Browser created by an `open` that has not finished setting it up.
    /// Outlives that call if its future is dropped, so the browser still gets closed.
    pending: parking_lot::Mutex<Option<BrowserSession>>,
}

impl TrackerSource {
    pub fn new(base_url: Url, config: &AppConfig) -> Result<Self> {
        let username = config
            .tracker
            .username
            .clone()
            .ok_or(TrackchatError::MissingSetting("tracker.username"))?;
        let password = config
            .tracker
            .password
            .clone()
            .ok_or(TrackchatError::MissingSetting("tracker.password"))?;
        let driver = WebDriverClient::new(
            &config.webdriver.endpoint,
            Duration::from_secs(config.webdriver.request_timeout_secs),
        )?;

        Ok(Self {
            driver,
            settings: TrackerSettings {
                base_url,
                username,
                password,
                browser: config.webdriver.browser.clone(),
                headless: config.webdriver.headless,
                login_timeout: Duration::from_secs(config.webdriver.login_timeout_secs),
                chat_timeout: Duration::from_secs(config.webdriver.chat_load_timeout_secs),
                poll_interval: config.webdriver.poll_interval(),
                selectors: config.selectors.clone(),
            },
            session: Mutex::new(None),
            pending: parking_lot::Mutex::new(None),
        })
    }

    fn login_url(&self) -> String {
        format!("{}/login", self.settings.base_url.as_str().trim_end_matches('/'))
    }

    async fn current_browser(&self) -> Option<BrowserSession> {
        self.session.lock().await.as_ref().map(|s| s.browser.clone())
    }

    async fn login(&self, browser: &BrowserSession) -> Result<()> {
        let s = &self.settings;
        let login_url = self.login_url();
        tracing::info!(url = %login_url, user = %s.username, "Logging in");

        browser.navigate(&login_url).await?;
        let username = browser
            .wait_for(&Locator::Css(s.selectors.username_input.clone()), s.login_timeout)
            .await?;
        let password = browser
            .wait_for(&Locator::Css(s.selectors.password_input.clone()), s.login_timeout)
            .await?;
        browser.send_keys(&username, &s.username).await?;
        browser.send_keys(&password, &s.password).await?;

        let button = browser
            .find(&Locator::XPath(s.selectors.login_button_xpath.clone()))
            .await?;
        browser.click(&button).await?;

        browser
            .wait_for_url_change(&login_url, s.login_timeout)
            .await
            .map_err(|e| TrackchatError::login(format!("still on the login page: {}", e)))?;

        browser
            .wait_for(&Locator::Css(s.selectors.messages_container.clone()), s.chat_timeout)
            .await
            // slow page, not a refused login
            .map_err(|e| TrackchatError::session_lost(format!("chatbox did not load: {}", e)))?;

        tracing::info!("Logged in, chatbox loaded");
        Ok(())
    }

    async fn install_observer(&self, browser: &BrowserSession) -> Result<()> {
        let installed = browser
            .execute(INSTALL_SCRIPT, install_args(&self.settings.selectors))
            .await?;
        if installed.as_bool() != Some(true) {
            return Err(TrackchatError::session_lost(
                "chat container vanished before the observer was installed",
            ));
        }
        Ok(())
    }

    async fn establish(&self) -> Result<(BrowserSession, ContentStream, JoinHandle<()>)> {
        let browser = self
            .driver
            .new_session(capabilities(&self.settings.browser, self.settings.headless))
            .await?;
        *self.pending.lock() = Some(browser.clone());

        let setup = async {
            self.login(&browser).await?;
            self.install_observer(&browser).await
        };
        let outcome = setup.await;
        self.pending.lock().take();
        if let Err(e) = outcome {
            if let Err(close_err) = browser.delete().await {
                tracing::debug!(error = %close_err, "Failed to close browser after setup error");
            }
            return Err(e);
        }

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let poller = tokio::spawn(poll_observer(
            browser.clone(),
            tx,
            self.settings.poll_interval,
        ));
        Ok((browser, rx, poller))
    }

    /// Close a browser left behind by an abandoned `open`
    async fn discard_pending(&self) {
        let abandoned = self.pending.lock().take();
        if let Some(browser) = abandoned {
            tracing::info!(session_id = %browser.id(), "Closing browser from an interrupted connect");
            if let Err(e) = browser.delete().await {
                tracing::debug!(error = %e, "Failed to close interrupted browser session");
            }
        }
    }

    async fn teardown(active: ActiveSession) {
        active.poller.abort();
        if let Err(e) = active.browser.delete().await {
            tracing::debug!(error = %e, "Failed to close previous browser session");
        }
    }
}

/// Drain the page-side queue until the observer disappears or the
/// receiving side goes away. Ending drops the sender, which ends the stream.
async fn poll_observer(
    browser: BrowserSession,
    tx: mpsc::Sender<RawBatch>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            break;
        }

        let value = match browser.execute(DRAIN_SCRIPT, Vec::new()).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Observer drain failed");
                break;
            }
        };

        let Some(fragments) = drained_fragments(value) else {
            tracing::warn!("Observer no longer installed in the page");
            break;
        };
        if fragments.is_empty() {
            continue;
        }

        tracing::trace!(count = fragments.len(), "Drained fragments");
        if tx.send(RawBatch::new(fragments)).await.is_err() {
            break;
        }
    }

    tracing::debug!(session_id = %browser.id(), "Observer poll task ended");
}

#[async_trait]
impl EventSource for TrackerSource {
    async fn open(&self) -> Result<ContentStream> {
        let mut guard = self.session.lock().await;
        self.discard_pending().await;
        if let Some(previous) = guard.take() {
            Self::teardown(previous).await;
        }

        let (browser, stream, poller) = self.establish().await?;
        *guard = Some(ActiveSession { browser, poller });
        Ok(stream)
    }

    async fn send(&self, text: &str) -> Result<()> {
        let browser = self.current_browser().await.ok_or(TrackchatError::NoSession)?;
        let input = browser
            .find(&Locator::Css(self.settings.selectors.chat_input.clone()))
            .await?;
        browser.clear(&input).await?;

        let mut keys = String::with_capacity(text.len() + 1);
        keys.push_str(text);
        keys.push(ENTER_KEY);
        browser.send_keys(&input, &keys).await
    }

    async fn health(&self) -> SourceHealth {
        let Some(browser) = self.current_browser().await else {
            return SourceHealth::Lost("no browser session".into());
        };

        match browser.execute(PROBE_SCRIPT, Vec::new()).await {
            Ok(value) if value.as_bool() == Some(true) => SourceHealth::Alive,
            Ok(_) => SourceHealth::Lost("chat observer is no longer attached".into()),
            Err(e) => SourceHealth::Lost(e.to_string()),
        }
    }

    async fn shutdown(&self) {
        self.discard_pending().await;
        let active = self.session.lock().await.take();
        if let Some(active) = active {
            Self::teardown(active).await;
        }
    }

    fn describe(&self) -> String {
        self.settings
            .base_url
            .host_str()
            .unwrap_or("tracker")
            .to_string()
    }
}

//! Minimal W3C WebDriver client
//!
//! Speaks the WebDriver HTTP protocol to a locally running driver
//! (msedgedriver, chromedriver, geckodriver). Only the commands the tracker
//! source needs are implemented.

use std::time::Duration;

use reqwest::Method;
use serde_json::{json, Value};
use url::Url;

use trackchat_utils::{Result, TrackchatError};

/// JSON key identifying a web element reference
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Interval between lookups while waiting for an element
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// WebDriver key code for Enter
pub const ENTER_KEY: char = '\u{E007}';

/// Element lookup strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    fn to_json(&self) -> Value {
        match self {
            Self::Css(selector) => json!({ "using": "css selector", "value": selector }),
            Self::XPath(path) => json!({ "using": "xpath", "value": path }),
        }
    }

    fn describe(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }
}

/// Reference to an element in the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(String);

/// Build new-session capabilities for the configured browser
pub fn capabilities(browser: &str, headless: bool) -> Value {
    let mut args = vec!["--disable-gpu", "--window-size=1920,1080"];
    if headless {
        args.insert(0, "--headless");
    }

    let options_key = match browser.to_ascii_lowercase().as_str() {
        "firefox" => "moz:firefoxOptions",
        "chrome" | "chromium" => "goog:chromeOptions",
        _ => "ms:edgeOptions",
    };

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": browser,
                options_key: { "args": args }
            }
        }
    })
}

/// Connection to a WebDriver endpoint
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: reqwest::Client,
    base: Url,
}

impl WebDriverClient {
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self> {
        // Url::join replaces the last segment unless the base ends in '/'
        let normalized = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{}/", endpoint)
        };
        let base = Url::parse(&normalized).map_err(|e| {
            TrackchatError::config(format!("Invalid WebDriver endpoint '{}': {}", endpoint, e))
        })?;
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TrackchatError::webdriver(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, base })
    }

    /// Start a browser session
    pub async fn new_session(&self, capabilities: Value) -> Result<BrowserSession> {
        let value = self
            .command(Method::POST, "session", Some(capabilities), "new session")
            .await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| TrackchatError::webdriver("New session response has no sessionId"))?
            .to_string();

        tracing::info!(session_id = %id, "WebDriver session created");
        Ok(BrowserSession {
            client: self.clone(),
            id,
        })
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        name: &str,
    ) -> Result<Value> {
        let url = self
            .base
            .join(path)
            .map_err(|e| TrackchatError::internal(format!("Bad WebDriver path {}: {}", path, e)))?;

        let mut request = self.http.request(method.clone(), url);
        if method == Method::POST {
            request = request.json(&body.unwrap_or_else(|| json!({})));
        }

        let response = request
            .send()
            .await
            .map_err(|e| TrackchatError::webdriver(format!("{}: {}", name, e)))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| TrackchatError::webdriver(format!("{}: invalid response: {}", name, e)))?;

        let value = payload.get("value").cloned().unwrap_or(Value::Null);
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(TrackchatError::WebDriverCommand {
                command: name.to_string(),
                error: error.to_string(),
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        if !status.is_success() {
            return Err(TrackchatError::webdriver(format!(
                "{}: HTTP {}",
                name, status
            )));
        }

        Ok(value)
    }
}

/// Check whether an error means the element is simply not on the page
pub fn is_no_such_element(err: &TrackchatError) -> bool {
    matches!(err, TrackchatError::WebDriverCommand { error, .. } if error == "no such element")
}

fn element_from_value(value: &Value) -> Result<ElementRef> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementRef(id.to_string()))
        .ok_or_else(|| TrackchatError::webdriver("Element response has no element reference"))
}

/// An open browser session
#[derive(Debug, Clone)]
pub struct BrowserSession {
    client: WebDriverClient,
    id: String,
}

impl BrowserSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn path(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("session/{}", self.id)
        } else {
            format!("session/{}/{}", self.id, suffix)
        }
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.client
            .command(Method::POST, &self.path("url"), Some(json!({ "url": url })), "navigate")
            .await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        let value = self
            .client
            .command(Method::GET, &self.path("url"), None, "get current url")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn find(&self, locator: &Locator) -> Result<ElementRef> {
        let value = self
            .client
            .command(
                Method::POST,
                &self.path("element"),
                Some(locator.to_json()),
                "find element",
            )
            .await?;
        element_from_value(&value)
    }

    /// Poll for an element until it appears or the timeout passes
    pub async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<ElementRef> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.find(locator).await {
                Ok(element) => return Ok(element),
                Err(e) if is_no_such_element(&e) => {}
                Err(e) => return Err(e),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(TrackchatError::WaitTimeout {
                    what: locator.describe().to_string(),
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Poll until the current URL differs from `url`
    pub async fn wait_for_url_change(&self, url: &str, timeout: Duration) -> Result<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let current = self.current_url().await?;
            if current != url {
                return Ok(current);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(TrackchatError::WaitTimeout {
                    what: format!("navigation away from {}", url),
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    pub async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.client
            .command(
                Method::POST,
                &self.path(&format!("element/{}/value", element.0)),
                Some(json!({ "text": text })),
                "send keys",
            )
            .await?;
        Ok(())
    }

    pub async fn clear(&self, element: &ElementRef) -> Result<()> {
        self.client
            .command(
                Method::POST,
                &self.path(&format!("element/{}/clear", element.0)),
                None,
                "clear element",
            )
            .await?;
        Ok(())
    }

    pub async fn click(&self, element: &ElementRef) -> Result<()> {
        self.client
            .command(
                Method::POST,
                &self.path(&format!("element/{}/click", element.0)),
                None,
                "click element",
            )
            .await?;
        Ok(())
    }

    /// Run a synchronous script in the page and return its result
    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.client
            .command(
                Method::POST,
                &self.path("execute/sync"),
                Some(json!({ "script": script, "args": args })),
                "execute script",
            )
            .await
    }

    /// End the session and close the browser
    pub async fn delete(&self) -> Result<()> {
        self.client
            .command(Method::DELETE, &self.path(""), None, "delete session")
            .await?;
        tracing::info!(session_id = %self.id, "WebDriver session closed");
        Ok(())
    }
}

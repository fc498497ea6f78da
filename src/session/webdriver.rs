//! [`Session`] over the W3C WebDriver protocol.
//!
//! Talks JSON to a running driver (geckodriver, chromedriver or a Selenium
//! server). The browser is configured to save downloads into the run's
//! download staging area without prompting, which is how the portal's
//! "Download Page" action lands on disk.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use super::{Element, Selector, Session, SessionError, Strategy};

/// Key under which WebDriver serializes element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4ad7c34ad7f5";

/// MIME types the browser saves without asking.
const SAVE_WITHOUT_PROMPT: &str = "text/html,application/xhtml+xml,application/pdf,\
    application/zip,application/octet-stream,application/msword,\
    application/vnd.openxmlformats-officedocument.wordprocessingml.document,\
    application/vnd.ms-excel,application/vnd.openxmlformats-officedocument.spreadsheetml.sheet,\
    application/vnd.ms-powerpoint,\
    application/vnd.openxmlformats-officedocument.presentationml.presentation,\
    text/plain,text/csv,image/png,image/jpeg,image/gif";

/// Default driver endpoint (geckodriver/chromedriver/Selenium standalone).
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// Browser to launch through the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Browser {
    #[default]
    Firefox,
    Chrome,
}

impl FromStr for Browser {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "firefox" => Ok(Self::Firefox),
            "chrome" => Ok(Self::Chrome),
            other => Err(format!(
                "unsupported browser `{other}`; use chrome or firefox"
            )),
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Firefox => "firefox",
            Self::Chrome => "chrome",
        })
    }
}

/// How to start a WebDriver session.
#[derive(Debug, Clone)]
pub struct WebDriverOptions {
    /// Base URL of the driver.
    pub endpoint: String,
    pub browser: Browser,
    /// Run without a visible window.
    pub headless: bool,
    /// Directory the browser saves downloads into.
    pub download_dir: PathBuf,
    /// How long element lookups wait for late elements.
    pub implicit_wait: Duration,
}

impl WebDriverOptions {
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: DEFAULT_WEBDRIVER_URL.to_string(),
            browser: Browser::default(),
            headless: true,
            download_dir: download_dir.into(),
            implicit_wait: Duration::from_secs(10),
        }
    }

    fn capabilities(&self) -> Value {
        let download_dir = self.download_dir.display().to_string();
        match self.browser {
            Browser::Firefox => {
                let args: Vec<&str> = if self.headless { vec!["-headless"] } else { vec![] };
                json!({
                    "browserName": "firefox",
                    "moz:firefoxOptions": {
                        "args": args,
                        "prefs": {
                            "browser.cache.disk.enable": false,
                            "browser.cache.memory.enable": false,
                            "browser.cache.offline.enable": false,
                            "network.http.use-cache": false,
                            "browser.download.folderList": 2,
                            "browser.download.manager.showWhenStarting": false,
                            "browser.download.dir": download_dir,
                            "browser.helperApps.neverAsk.saveToDisk": SAVE_WITHOUT_PROMPT,
                            "pdfjs.disabled": true,
                        }
                    }
                })
            }
            Browser::Chrome => {
                let args: Vec<&str> = if self.headless { vec!["--headless=new"] } else { vec![] };
                json!({
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": args,
                        "prefs": {
                            "download.default_directory": download_dir,
                            "download.prompt_for_download": false,
                            "profile.password_manager_enabled": true,
                        }
                    }
                })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// A live WebDriver session.
#[derive(Debug)]
pub struct WebDriverSession {
    http: Client,
    session_url: String,
    closed: bool,
}

impl WebDriverSession {
    /// Starts a browser through the driver at `options.endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transport`] when the driver is unreachable and
    /// [`SessionError::Protocol`] when it refuses the capabilities.
    #[instrument(skip(options), fields(endpoint = %options.endpoint, browser = %options.browser, headless = options.headless))]
    pub async fn start(options: &WebDriverOptions) -> Result<Self, SessionError> {
        let http = Client::new();
        let endpoint = options.endpoint.trim_end_matches('/').to_string();
        let new_session = format!("{endpoint}/session");
        let body = json!({ "capabilities": { "alwaysMatch": options.capabilities() } });

        let response = http
            .post(&new_session)
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionError::transport(&new_session, e))?;
        let value = decode(response, &new_session).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| SessionError::protocol("session not created", "missing sessionId"))?
            .to_string();
        debug!(%session_id, "webdriver session created");

        let session = Self {
            http,
            session_url: format!("{new_session}/{session_id}"),
            closed: false,
        };
        let implicit_ms = u64::try_from(options.implicit_wait.as_millis()).unwrap_or(u64::MAX);
        session
            .post("timeouts", json!({ "implicit": implicit_ms }))
            .await?;
        Ok(session)
    }

    async fn post(&self, command: &str, body: Value) -> Result<Value, SessionError> {
        self.ensure_open()?;
        let url = format!("{}/{command}", self.session_url);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionError::transport(&url, e))?;
        decode(response, &url).await
    }

    async fn get(&self, command: &str) -> Result<Value, SessionError> {
        self.ensure_open()?;
        let url = format!("{}/{command}", self.session_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SessionError::transport(&url, e))?;
        decode(response, &url).await
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn find_command(scope: Option<&Element>, plural: bool) -> String {
        let noun = if plural { "elements" } else { "element" };
        match scope {
            Some(element) => format!("element/{}/{noun}", element.handle()),
            None => noun.to_string(),
        }
    }
}

#[async_trait]
impl Session for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        debug!(%url, "navigating");
        self.post("url", json!({ "url": url })).await.map(drop)
    }

    async fn title(&mut self) -> Result<String, SessionError> {
        let value = self.get("title").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn find_element(
        &mut self,
        scope: Option<&Element>,
        selector: &Selector,
    ) -> Result<Element, SessionError> {
        let command = Self::find_command(scope, false);
        let value = self
            .post(&command, locator(selector))
            .await
            .map_err(|e| not_found_as(e, selector))?;
        element_from(&value).ok_or_else(|| SessionError::element_not_found(selector))
    }

    async fn find_elements(
        &mut self,
        scope: Option<&Element>,
        selector: &Selector,
    ) -> Result<Vec<Element>, SessionError> {
        let command = Self::find_command(scope, true);
        let value = match self.post(&command, locator(selector)).await {
            Ok(value) => value,
            Err(SessionError::Protocol { code, .. }) if code == "no such element" => {
                return Ok(Vec::new());
            }
            Err(other) => return Err(other),
        };
        Ok(value
            .as_array()
            .map(|items| items.iter().filter_map(element_from).collect())
            .unwrap_or_default())
    }

    async fn attribute(
        &mut self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        // Properties first: they carry resolved hrefs and live counts.
        let property = self
            .get(&format!("element/{}/property/{name}", element.handle()))
            .await?;
        if let Some(value) = scalar_to_string(&property) {
            return Ok(Some(value));
        }
        let attribute = self
            .get(&format!("element/{}/attribute/{name}", element.handle()))
            .await?;
        Ok(scalar_to_string(&attribute))
    }

    async fn native_click(&mut self, element: &Element) -> Result<(), SessionError> {
        match self
            .post(&format!("element/{}/click", element.handle()), json!({}))
            .await
        {
            Ok(_) => Ok(()),
            Err(SessionError::Protocol { code, .. })
                if code == "element not interactable" || code == "element click intercepted" =>
            {
                Err(SessionError::not_interactable(element))
            }
            Err(other) => Err(other),
        }
    }

    async fn force_click(&mut self, element: &Element) -> Result<(), SessionError> {
        self.post(
            "execute/sync",
            json!({
                "script": "arguments[0].click();",
                "args": [{ ELEMENT_KEY: element.handle() }],
            }),
        )
        .await
        .map(drop)
    }

    async fn clear(&mut self, element: &Element) -> Result<(), SessionError> {
        self.post(&format!("element/{}/clear", element.handle()), json!({}))
            .await
            .map(drop)
    }

    async fn send_keys(&mut self, element: &Element, text: &str) -> Result<(), SessionError> {
        self.post(
            &format!("element/{}/value", element.handle()),
            json!({ "text": text }),
        )
        .await
        .map(drop)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        let response = self
            .http
            .delete(&self.session_url)
            .send()
            .await
            .map_err(|e| SessionError::transport(&self.session_url, e));
        self.closed = true;
        match response {
            Ok(response) => decode(response, &self.session_url).await.map(drop),
            Err(error) => {
                warn!(error = %error, "failed to end webdriver session");
                Err(error)
            }
        }
    }
}

async fn decode(response: reqwest::Response, url: &str) -> Result<Value, SessionError> {
    let body: WireResponse = response
        .json()
        .await
        .map_err(|e| SessionError::transport(url, e))?;
    if let Ok(error) = serde_json::from_value::<WireError>(body.value.clone()) {
        return Err(SessionError::protocol(error.error, error.message));
    }
    Ok(body.value)
}

fn locator(selector: &Selector) -> Value {
    let (using, value) = match selector.strategy {
        Strategy::Id => ("css selector", format!(r#"[id="{}"]"#, selector.value)),
        Strategy::Name => ("css selector", format!(r#"[name="{}"]"#, selector.value)),
        Strategy::XPath => ("xpath", selector.value.clone()),
    };
    json!({ "using": using, "value": value })
}

fn element_from(value: &Value) -> Option<Element> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(Element::new)
}

fn not_found_as(error: SessionError, selector: &Selector) -> SessionError {
    match error {
        SessionError::Protocol { ref code, .. } if code == "no such element" => {
            SessionError::element_not_found(selector)
        }
        other => other,
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

//! Interactive browser session abstraction.
//!
//! The discoverer and the materializer never talk to a browser directly:
//! they drive a [`Session`], which exposes the handful of primitives the
//! portal walk needs (navigation, element lookup, attribute reads, clicks).
//! [`WebDriverSession`] implements it over the W3C WebDriver protocol;
//! tests drive a scripted in-memory implementation instead.
//!
//! A session is a single exclusively-owned resource. Every operation takes
//! `&mut self`, so the walk threads one `&mut dyn Session` through its
//! traversal and spawned download tasks can never capture it.

mod auth;
mod error;
mod layout;
mod webdriver;

pub use auth::{Credentials, authenticate};
pub use error::SessionError;
pub use layout::PortalLayout;
pub use webdriver::{Browser, DEFAULT_WEBDRIVER_URL, WebDriverOptions, WebDriverSession};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Default interval between readiness polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Element lookup strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Match on the `id` attribute.
    Id,
    /// Match on the `name` attribute.
    Name,
    /// XPath expression, relative to the scope when one is given.
    XPath,
}

/// A locator for one or more elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    pub strategy: Strategy,
    pub value: String,
}

impl Selector {
    #[must_use]
    pub fn id(value: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::Id,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn name(value: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::Name,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn xpath(value: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::XPath,
            value: value.into(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match self.strategy {
            Strategy::Id => "id",
            Strategy::Name => "name",
            Strategy::XPath => "xpath",
        };
        write!(f, "{strategy}={}", self.value)
    }
}

/// Opaque handle to an element of the current page.
///
/// Handles go stale when the session navigates away.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element(String);

impl Element {
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    #[must_use]
    pub fn handle(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Primitives of an interactive, stateful UI session.
#[async_trait]
pub trait Session: Send {
    /// Loads `url` in the current window.
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Returns the title of the current page.
    async fn title(&mut self) -> Result<String, SessionError>;

    /// Finds the first element matching `selector`, searching the whole page
    /// or below `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ElementNotFound`] when nothing matches.
    async fn find_element(
        &mut self,
        scope: Option<&Element>,
        selector: &Selector,
    ) -> Result<Element, SessionError>;

    /// Finds every element matching `selector`; empty when nothing matches.
    async fn find_elements(
        &mut self,
        scope: Option<&Element>,
        selector: &Selector,
    ) -> Result<Vec<Element>, SessionError>;

    /// Reads an attribute or DOM property of `element`.
    async fn attribute(
        &mut self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    /// Performs a native user click.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotInteractable`] when the element cannot be
    /// clicked directly (hidden, covered, zero-sized).
    async fn native_click(&mut self, element: &Element) -> Result<(), SessionError>;

    /// Activates `element` through script, bypassing interactability checks.
    async fn force_click(&mut self, element: &Element) -> Result<(), SessionError>;

    /// Clears a form field.
    async fn clear(&mut self, element: &Element) -> Result<(), SessionError>;

    /// Types `text` into a form field.
    async fn send_keys(&mut self, element: &Element, text: &str) -> Result<(), SessionError>;

    /// Ends the session and releases the browser.
    async fn close(&mut self) -> Result<(), SessionError>;

    /// Interval between readiness polls.
    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Clicks `element`, falling back to a forced activation when the
    /// element is not directly interactable.
    async fn click(&mut self, element: &Element) -> Result<(), SessionError> {
        match self.native_click(element).await {
            Err(SessionError::NotInteractable { .. }) => {
                debug!(element = %element, "element not interactable, forcing click");
                self.force_click(element).await
            }
            other => other,
        }
    }

    /// Polls the page title until `ready` accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Timeout`] when `timeout` elapses first.
    async fn wait_for_title(
        &mut self,
        ready: &(dyn for<'t> Fn(&'t str) -> bool + Send + Sync),
        timeout: Duration,
        waiting_for: &str,
    ) -> Result<String, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            let title = self.title().await?;
            if ready(&title) {
                trace!(%title, waiting_for, "page ready");
                return Ok(title);
            }
            if Instant::now() >= deadline {
                return Err(SessionError::timeout(waiting_for, timeout));
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }
}

/// Returns the value of `childElementCount` as a number, zero when absent.
pub async fn child_element_count(
    session: &mut dyn Session,
    element: &Element,
) -> Result<usize, SessionError> {
    let raw = session.attribute(element, "childElementCount").await?;
    Ok(raw
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0))
}

/// Reads an attribute the walk cannot do without.
pub async fn required_attribute(
    session: &mut dyn Session,
    element: &Element,
    name: &str,
) -> Result<String, SessionError> {
    session
        .attribute(element, name)
        .await?
        .filter(|value| !value.is_empty())
        .ok_or_else(|| SessionError::missing_attribute(element, name))
}

/// Turns "element not found" into `None`, passing other errors through.
pub fn optional<T>(result: Result<T, SessionError>) -> Result<Option<T>, SessionError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.is_element_not_found() => Ok(None),
        Err(error) => Err(error),
    }
}

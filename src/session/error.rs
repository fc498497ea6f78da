//! Error types for session operations.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a [`Session`](super::Session).
#[derive(Debug, Error)]
pub enum SessionError {
    /// A readiness wait elapsed. Fatal to a mirroring run.
    #[error("timed out after {timeout:?} waiting for {waiting_for}")]
    Timeout {
        /// What the wait was for (e.g. "community page").
        waiting_for: String,
        /// Configured timeout.
        timeout: Duration,
    },

    /// No element matched a selector.
    #[error("element not found: {selector}")]
    ElementNotFound {
        /// The selector that matched nothing.
        selector: String,
    },

    /// The element exists but cannot receive a native click.
    #[error("element {element} is not interactable")]
    NotInteractable {
        /// Handle of the element.
        element: String,
    },

    /// An element lacks an attribute the walk depends on.
    #[error("element {element} has no `{attribute}` attribute")]
    MissingAttribute {
        /// Handle of the element.
        element: String,
        /// Attribute that was expected.
        attribute: String,
    },

    /// The browser reported an error other than the ones above.
    #[error("webdriver error `{code}`: {message}")]
    Protocol {
        /// W3C error code, e.g. `stale element reference`.
        code: String,
        /// Message reported by the driver.
        message: String,
    },

    /// The driver endpoint could not be reached or answered garbage.
    #[error("webdriver transport error calling {endpoint}: {source}")]
    Transport {
        /// Command path that failed.
        endpoint: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The session was used after [`close`](super::Session::close).
    #[error("session already closed")]
    Closed,
}

impl SessionError {
    pub fn timeout(waiting_for: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            waiting_for: waiting_for.into(),
            timeout,
        }
    }

    pub fn element_not_found(selector: impl ToString) -> Self {
        Self::ElementNotFound {
            selector: selector.to_string(),
        }
    }

    pub fn not_interactable(element: impl ToString) -> Self {
        Self::NotInteractable {
            element: element.to_string(),
        }
    }

    pub fn missing_attribute(element: impl ToString, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            element: element.to_string(),
            attribute: attribute.into(),
        }
    }

    pub fn protocol(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transport(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// True for lookups that matched nothing.
    #[must_use]
    pub fn is_element_not_found(&self) -> bool {
        matches!(self, Self::ElementNotFound { .. })
    }
}

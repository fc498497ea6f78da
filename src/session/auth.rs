//! Sign-in at the portal's login boundary.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, instrument};

use super::{PortalLayout, Session, SessionError};

/// How long each round of the interactive sign-in wait lasts.
const INTERACTIVE_WAIT_ROUND: Duration = Duration::from_secs(60);

/// Login and password for automatic sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

// Never print the password, even at trace level.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl FromStr for Credentials {
    type Err = String;

    /// Parses `login:password`, splitting at the first colon.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (login, password) = value
            .split_once(':')
            .ok_or_else(|| "expected LOGIN:PASSWORD".to_string())?;
        if login.trim().is_empty() {
            return Err("login must not be empty".to_string());
        }
        if password.is_empty() {
            return Err("password must not be empty".to_string());
        }
        Ok(Self::new(login.trim(), password))
    }
}

/// Gets the session past the login page.
///
/// With credentials the sign-in form is filled and submitted. Without them
/// the user is expected to sign in through the visible browser window, and
/// this blocks until the community overview shows up, however long it takes.
#[instrument(skip(session, layout, credentials), fields(automatic = credentials.is_some()))]
pub async fn authenticate(
    session: &mut dyn Session,
    layout: &PortalLayout,
    credentials: Option<&Credentials>,
) -> Result<(), SessionError> {
    let Some(credentials) = credentials else {
        info!("Authentication data is expected to be entered in the browser");
        let ready = |title: &str| layout.is_community_page(title);
        loop {
            match session
                .wait_for_title(&ready, INTERACTIVE_WAIT_ROUND, "interactive sign-in")
                .await
            {
                Ok(_) => return Ok(()),
                Err(SessionError::Timeout { .. }) => continue,
                Err(other) => return Err(other),
            }
        }
    };

    let username = session.find_element(None, &layout.username_field).await?;
    session.clear(&username).await?;
    session.send_keys(&username, &credentials.login).await?;

    let password = session.find_element(None, &layout.password_field).await?;
    session.clear(&password).await?;
    session.send_keys(&password, credentials.password()).await?;

    let submit = session.find_element(None, &layout.sign_in_button).await?;
    session.click(&submit).await?;
    info!(login = %credentials.login, "submitted sign-in form");
    Ok(())
}

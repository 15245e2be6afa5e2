//! Interactive login against the portal, isolated behind the
//! [`Authenticator`] trait so the pagination phase depends only on the
//! exported cookies, never on the browser-automation stack.

use anyhow::{Context, Result};
use cookie::Cookie;
use fantoccini::{Client, ClientBuilder, Locator};
use std::time::Duration;
use tracing::{info, warn};

/// A cookie exported from the browser session, ready to be installed into a
/// plain HTTP client's jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    /// Perform the interactive login and export the resulting session
    /// cookies. A failed login is fatal and is not retried.
    async fn establish(&self) -> Result<Vec<SessionCookie>>;
}

/// WebDriver-backed authenticator. Submits the credential form, waits a
/// fixed settle interval, and checks that navigation reached the
/// authenticated area (URL contains the marker segment).
pub struct BrowserAuthenticator {
    webdriver_url: String,
    login_url: String,
    username: String,
    password: String,
    /// URL segment that confirms the authenticated area was reached
    marker: String,
    settle: Duration,
}

impl BrowserAuthenticator {
    pub fn new(
        webdriver_url: impl Into<String>,
        login_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            login_url: login_url.into(),
            username: username.into(),
            password: password.into(),
            marker: "feeds".to_string(),
            settle: Duration::from_secs(5),
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    async fn login_flow(&self, client: &mut Client) -> Result<Vec<SessionCookie>> {
        client
            .goto(&self.login_url)
            .await
            .context("failed to open login page")?;

        client
            .find(Locator::Id("session_email"))
            .await
            .context("login page has no email field")?
            .send_keys(&self.username)
            .await
            .context("failed to type username")?;

        client
            .find(Locator::Id("session_password"))
            .await
            .context("login page has no password field")?
            .send_keys(&self.password)
            .await
            .context("failed to type password")?;

        client
            .form(Locator::Css("form"))
            .await
            .context("login page has no form")?
            .submit()
            .await
            .context("failed to submit credentials")?;

        // Fixed settle interval; the portal redirects after login
        tokio::time::sleep(self.settle).await;

        let current = client
            .current_url()
            .await
            .context("failed to read post-login URL")?;

        if !current.as_str().contains(&self.marker) {
            anyhow::bail!(
                "login failed: post-login URL '{}' does not contain '{}'",
                current,
                self.marker
            );
        }

        info!(url = %current, "login successful");

        let cookies = client
            .get_all_cookies()
            .await
            .context("failed to export session cookies")?;

        Ok(cookies.iter().map(SessionCookie::from_browser).collect())
    }
}

impl SessionCookie {
    fn from_browser(c: &Cookie<'_>) -> Self {
        Self {
            name: c.name().to_string(),
            value: c.value().to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Authenticator for BrowserAuthenticator {
    async fn establish(&self) -> Result<Vec<SessionCookie>> {
        let mut client = ClientBuilder::native()
            .connect(&self.webdriver_url)
            .await
            .with_context(|| format!("failed to connect to WebDriver at {}", self.webdriver_url))?;

        // The session must be closed on every exit path, including login
        // failure, or the browser process leaks.
        let outcome = self.login_flow(&mut client).await;

        if let Err(e) = client.close().await {
            warn!(error = %e, "failed to close WebDriver session");
        }

        outcome
    }
}

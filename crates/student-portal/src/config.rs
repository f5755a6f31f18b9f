//! Configuration loading and resolution.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{PortalError, PortalResult};

pub const DEFAULT_BASE_URL: &str = "https://student.portal.local";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "hr-HR,hr;q=0.9,en;q=0.8";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
pub const DEFAULT_SESSION_COOKIE: &str = ".ASPXAUTH";

/// Everything the scraping core needs to know about the portal it talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Origin of the portal, e.g. `https://student.example.hr`.
    pub base_url: String,
    pub user_agent: String,
    pub accept_language: String,
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// Redirect hops followed before the last response is returned as-is.
    pub max_redirects: usize,
    /// Cookie whose presence means "logged in".
    pub session_cookie: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
        }
    }
}

impl PortalConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Resolve the configuration: explicit value, then environment, then default.
    pub fn resolve(explicit_base_url: Option<&str>, explicit_timeout_ms: Option<u64>) -> Self {
        let mut config = Self::default();

        if let Some(base) = explicit_base_url {
            config.base_url = base.to_string();
        } else if let Ok(env_base) = std::env::var("PORTAL_BASE_URL") {
            config.base_url = env_base;
        }

        if let Some(timeout) = explicit_timeout_ms {
            config.timeout_ms = timeout;
        } else if let Some(timeout) = std::env::var("PORTAL_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout_ms = timeout;
        }

        if let Ok(cookie) = std::env::var("PORTAL_SESSION_COOKIE") {
            if !cookie.trim().is_empty() {
                config.session_cookie = cookie;
            }
        }

        config
    }

    pub fn validate(&self) -> PortalResult<()> {
        self.origin()?;
        if self.timeout_ms == 0 {
            return Err(PortalError::Config("timeout_ms must be positive".into()));
        }
        if self.session_cookie.trim().is_empty() {
            return Err(PortalError::Config("session_cookie must not be empty".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The portal origin with a trailing slash.
    pub fn origin(&self) -> PortalResult<Url> {
        let trimmed = self.base_url.trim_end_matches('/');
        Url::parse(&format!("{trimmed}/")).map_err(|_| PortalError::InvalidUrl(self.base_url.clone()))
    }

    /// Base for resolving relative redirect locations: the student area, not the site root.
    pub fn student_area(&self) -> PortalResult<Url> {
        self.origin()?
            .join(crate::pages::STUDENT_AREA)
            .map_err(|_| PortalError::InvalidUrl(self.base_url.clone()))
    }
}

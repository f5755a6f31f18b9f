//! Error taxonomy for the scraping core.
//!
//! Transport and fetch failures are surfaced unmodified. Authentication
//! failures carry a localized message for end users. Extraction never fails:
//! an empty page is an empty [`crate::extract::Extracted`], not an error.

use std::sync::Arc;

/// All errors that can occur while talking to the portal.
#[derive(thiserror::Error, Debug, Clone)]
pub enum PortalError {
    /// Connection, DNS, TLS or timeout failure.
    #[error("network failure for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// A GET that was expected to succeed returned a non-200 status.
    #[error("unexpected HTTP status {status} fetching {url}")]
    Fetch { url: String, status: u16 },

    /// Login completed at the HTTP level but no session cookie was issued.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Session cookie issued, but the portal shows no signed-in user.
    #[error("login incomplete: session cookie present but no user label")]
    LoginIncomplete,

    /// The session failed post-hoc validation.
    #[error("session expired")]
    SessionExpired,

    /// The embedded tree array could not be parsed by any repair strategy.
    #[error("malformed embedded data ({raw_len} bytes, pattern `{pattern}`): {sample}")]
    MalformedEmbeddedData {
        raw_len: usize,
        pattern: String,
        sample: String,
    },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PortalError {
    pub fn network(url: impl Into<String>, error: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source: Arc::new(error),
        }
    }

    /// Whether this error belongs to the authentication family.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            PortalError::InvalidCredentials
                | PortalError::LoginIncomplete
                | PortalError::SessionExpired
        )
    }

    /// User-facing message, localized for the portal's audience.
    pub fn user_message(&self) -> &'static str {
        match self {
            PortalError::InvalidCredentials => "Neispravno korisničko ime ili lozinka.",
            PortalError::LoginIncomplete => {
                "Prijava nije dovršena. Provjerite status korisničkog računa na portalu."
            }
            PortalError::SessionExpired => "Sesija je istekla. Prijavite se ponovno.",
            PortalError::Network { .. } => "Portal trenutno nije dostupan.",
            PortalError::Fetch { .. } => "Dohvat podataka s portala nije uspio.",
            PortalError::MalformedEmbeddedData { .. } => "Podaci na portalu nisu u očekivanom obliku.",
            PortalError::InvalidUrl(_) | PortalError::Config(_) => "Neispravna konfiguracija.",
        }
    }
}

pub type PortalResult<T> = Result<T, PortalError>;

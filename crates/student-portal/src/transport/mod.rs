//! Session & transport engine.
//!
//! The transport never follows redirects and never keeps cookies on its own:
//! both are the engine's job so that the session's cookie map stays the single
//! source of truth.

pub mod cookies;
pub mod engine;
pub mod http_client;

use async_trait::async_trait;
use std::time::Duration;

use crate::encoding;
use crate::error::PortalResult;

pub use cookies::{CookieJar, SharedCookieJar};
pub use engine::Engine;
pub use http_client::ReqwestTransport;

/// HTTP methods the portal needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// A fully prepared request, headers included.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Url-encoded form body.
    pub body: Option<String>,
    pub timeout: Duration,
}

/// Undecoded response: bytes, status and every header.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// URL this response came from (the last hop after redirects).
    pub url: String,
    pub status: u16,
    /// Header names are lowercase. Values are raw 8-bit characters.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawPage {
    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated header such as `set-cookie`.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// Body decoded through the portal's charset.
    pub fn text(&self) -> String {
        encoding::decode(&self.body)
    }
}

/// A way of putting one request on the wire.
///
/// Implementations must not follow redirects and must not store cookies.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> PortalResult<RawPage>;
}

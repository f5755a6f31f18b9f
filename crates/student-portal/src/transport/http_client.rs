//! Async HTTP transport wrapping reqwest.
//!
//! Not a browser. One request in, one response out. Redirects are returned
//! to the engine untouched and no cookie store is kept, so a single transport
//! can be shared by every session.

use async_trait::async_trait;
use std::time::Duration;

use super::{HttpMethod, HttpRequest, RawPage, Transport};
use crate::encoding;
use crate::error::{PortalError, PortalResult};

/// Transport backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport whose client never follows redirects.
    pub fn new(timeout: Duration) -> PortalResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| PortalError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> PortalResult<RawPage> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let r = builder
            .send()
            .await
            .map_err(|e| PortalError::network(&request.url, e))?;

        let status = r.status().as_u16();
        let url = r.url().to_string();

        // Header values are kept as raw 8-bit characters; the portal puts
        // windows-1250 bytes into Content-Disposition.
        let headers: Vec<(String, String)> = r
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_ascii_lowercase(), encoding::raw_chars(v.as_bytes())))
            .collect();

        let body = r
            .bytes()
            .await
            .map_err(|e| PortalError::network(&request.url, e))?
            .to_vec();

        Ok(RawPage {
            url,
            status,
            headers,
            body,
        })
    }
}

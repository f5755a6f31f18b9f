//! Request construction, bounded redirect following and cookie bookkeeping.

use std::sync::Arc;
use url::Url;

use super::{CookieJar, HttpMethod, HttpRequest, RawPage, Transport};
use crate::config::PortalConfig;
use crate::error::{PortalError, PortalResult};

/// Sends requests on behalf of one session's cookie jar.
///
/// The engine itself holds no per-user state; the caller passes the jar in by
/// `&mut`, which keeps a session single-writer.
#[derive(Clone)]
pub struct Engine {
    config: Arc<PortalConfig>,
    transport: Arc<dyn Transport>,
}

impl Engine {
    pub fn new(config: Arc<PortalConfig>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Issue a request and follow redirects up to the configured bound.
    ///
    /// Every hop's `Set-Cookie` headers are merged into `jar` before the next
    /// hop is sent. When the bound is exceeded the last response is returned
    /// as-is; callers treat it as a possibly incomplete page.
    pub async fn send(
        &self,
        jar: &mut CookieJar,
        method: HttpMethod,
        path: &str,
        body: Option<String>,
    ) -> PortalResult<RawPage> {
        let url = self.resolve(path)?;
        let mut page = self.send_once(jar, method, url.as_str(), body).await?;

        let mut hops = 0usize;
        while page.is_redirect() {
            let Some(location) = page.header("location").map(str::to_string) else {
                break;
            };
            if hops >= self.config.max_redirects {
                tracing::warn!(
                    "redirect bound of {} hops reached at {}, returning last response",
                    self.config.max_redirects,
                    page.url
                );
                break;
            }
            hops += 1;
            let next = self.resolve(location.trim())?;
            tracing::debug!(hop = hops, from = %page.url, to = %next, "following redirect");
            page = self.send_once(jar, HttpMethod::Get, next.as_str(), None).await?;
        }

        Ok(page)
    }

    /// GET a page that must answer 200.
    pub async fn get_ok(&self, jar: &mut CookieJar, path: &str) -> PortalResult<RawPage> {
        let page = self.send(jar, HttpMethod::Get, path, None).await?;
        ensure_ok(page)
    }

    /// POST a form body to a page that must answer 200 (after redirects).
    pub async fn post_ok(
        &self,
        jar: &mut CookieJar,
        path: &str,
        body: String,
    ) -> PortalResult<RawPage> {
        let page = self.send(jar, HttpMethod::Post, path, Some(body)).await?;
        ensure_ok(page)
    }

    async fn send_once(
        &self,
        jar: &mut CookieJar,
        method: HttpMethod,
        url: &str,
        body: Option<String>,
    ) -> PortalResult<RawPage> {
        let request = HttpRequest {
            method,
            url: url.to_string(),
            headers: self.headers(jar, body.is_some())?,
            body,
            timeout: self.config.timeout(),
        };

        let page = self.transport.execute(request).await?;
        let changed = jar.merge_set_cookies(page.header_values("set-cookie"));

        tracing::debug!(
            method = method.as_str(),
            url,
            status = page.status,
            bytes = page.body.len(),
            cookies_changed = changed,
            "portal response"
        );

        Ok(page)
    }

    fn headers(&self, jar: &CookieJar, has_body: bool) -> PortalResult<Vec<(String, String)>> {
        let mut headers = vec![
            ("User-Agent".to_string(), self.config.user_agent.clone()),
            (
                "Accept".to_string(),
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            ),
            ("Accept-Language".to_string(), self.config.accept_language.clone()),
            ("Referer".to_string(), self.config.student_area()?.to_string()),
        ];
        if let Some(cookie) = jar.header_value() {
            headers.push(("Cookie".to_string(), cookie));
        }
        if has_body {
            headers.push((
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ));
        }
        Ok(headers)
    }

    /// Absolute URLs pass through; everything else resolves against the
    /// student area, so `Default.aspx` and `/lib-student/Default.aspx` land on
    /// the same page.
    pub fn resolve(&self, path: &str) -> PortalResult<Url> {
        if let Ok(absolute) = Url::parse(path) {
            return Ok(absolute);
        }
        self.config
            .student_area()?
            .join(path)
            .map_err(|_| PortalError::InvalidUrl(path.to_string()))
    }
}

fn ensure_ok(page: RawPage) -> PortalResult<RawPage> {
    if page.status == 200 {
        Ok(page)
    } else {
        Err(PortalError::Fetch {
            url: page.url,
            status: page.status,
        })
    }
}

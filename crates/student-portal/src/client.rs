//! Portal client: one user's session plus the logical operations.
//!
//! Every network operation takes `&mut self`, so a session's cookies and
//! tokens have a single writer at a time.

use chrono::NaiveDate;
use futures::future::join_all;
use std::sync::Arc;

use crate::auth;
use crate::config::PortalConfig;
use crate::download::DownloadedFile;
use crate::error::{PortalError, PortalResult};
use crate::extract::documents::{self, FileEntry, TreeNode};
use crate::extract::exams::{self, ExamEntry, ExamPeriod};
use crate::extract::grades::{self, GradeSummary};
use crate::extract::inbox::{self, Message, MessageDetail, Notification};
use crate::extract::payments::{self, PaymentSummary};
use crate::extract::regularity::{self, RegularityRow};
use crate::extract::timetable::{self, Lesson};
use crate::extract::Extracted;
use crate::pages::{self, controls};
use crate::postback::WebFormsTokens;
use crate::session::{AuthState, Session};
use crate::transport::{Engine, RawPage, ReqwestTransport, SharedCookieJar, Transport};

/// Token cache keys, one per logical page.
const TIMETABLE_KEY: &str = "timetable";
const EXAMS_KEY: &str = "exams";

/// Direction of a week postback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Week {
    Next,
    Previous,
}

pub struct PortalClient {
    engine: Engine,
    session: Session,
}

impl PortalClient {
    /// Client over a fresh reqwest transport.
    pub fn new(config: PortalConfig) -> PortalResult<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Client over a caller-supplied transport, shared or scripted.
    pub fn with_transport(config: PortalConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            engine: Engine::new(Arc::new(config), transport),
            session: Session::new(),
        }
    }

    pub fn config(&self) -> &PortalConfig {
        self.engine.config()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> AuthState {
        self.session.state()
    }

    // ── authentication ──────────────────────────────────────────────

    pub async fn login(&mut self, username: &str, password: &str) -> PortalResult<String> {
        auth::login(&self.engine, &mut self.session, username, password).await
    }

    pub async fn check_session(&mut self) -> bool {
        auth::check_session(&self.engine, &mut self.session).await
    }

    pub async fn logout(&mut self) {
        auth::logout(&self.engine, &mut self.session).await
    }

    /// Validate against the portal and map an invalid session to
    /// [`PortalError::SessionExpired`].
    pub async fn ensure_session(&mut self) -> PortalResult<()> {
        if self.check_session().await {
            Ok(())
        } else {
            Err(PortalError::SessionExpired)
        }
    }

    fn require_auth(&self) -> PortalResult<()> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(PortalError::SessionExpired)
        }
    }

    /// A content request that lands on the login page means the portal
    /// dropped the session.
    fn check_landing(&mut self, page: &RawPage) -> PortalResult<()> {
        if landed_on_login(page) {
            tracing::info!(url = %page.url, "redirected to login, session expired");
            return Err(self.expire());
        }
        Ok(())
    }

    fn expire(&mut self) -> PortalError {
        self.session.set_state(AuthState::Expired);
        PortalError::SessionExpired
    }

    // ── page plumbing ───────────────────────────────────────────────

    async fn fetch_raw(&mut self, path: &str) -> PortalResult<RawPage> {
        self.require_auth()?;
        let page = self.engine.get_ok(self.session.cookies_mut(), path).await?;
        self.check_landing(&page)?;
        Ok(page)
    }

    async fn fetch_page(&mut self, path: &str) -> PortalResult<String> {
        Ok(self.fetch_raw(path).await?.text())
    }

    /// Fetch a page whose tokens later postbacks will need.
    async fn fetch_tracked(&mut self, key: &str, path: &str) -> PortalResult<String> {
        let html = self.fetch_page(path).await?;
        self.session
            .remember_tokens(key, WebFormsTokens::from_html(&html));
        Ok(html)
    }

    /// Post back to a tracked page using its latest tokens, fetching the page
    /// first when none are cached. The response's tokens replace the cache.
    async fn postback(
        &mut self,
        key: &str,
        path: &str,
        event_target: &str,
        fields: &[(&str, &str)],
    ) -> PortalResult<String> {
        if self.session.tokens_for(key).is_none() {
            self.fetch_tracked(key, path).await?;
        }
        let body = self
            .session
            .tokens_for(key)
            .map(|t| t.form_body(event_target, fields))
            .unwrap_or_default();

        self.require_auth()?;
        let page = self
            .engine
            .post_ok(self.session.cookies_mut(), path, body)
            .await?;
        self.check_landing(&page)?;

        let html = page.text();
        self.session
            .remember_tokens(key, WebFormsTokens::from_html(&html));
        Ok(html)
    }

    // ── timetable ───────────────────────────────────────────────────

    /// Lessons of the current week.
    pub async fn timetable(&mut self) -> PortalResult<Extracted<Lesson>> {
        let html = self.fetch_tracked(TIMETABLE_KEY, pages::TIMETABLE).await?;
        Ok(timetable::parse(&html))
    }

    /// Move one week from the last timetable page this session saw.
    pub async fn timetable_step(&mut self, direction: Week) -> PortalResult<Extracted<Lesson>> {
        let target = match direction {
            Week::Next => controls::TIMETABLE_NEXT,
            Week::Previous => controls::TIMETABLE_PREVIOUS,
        };
        let html = self
            .postback(TIMETABLE_KEY, pages::TIMETABLE, target, &[])
            .await?;
        Ok(timetable::parse(&html))
    }

    /// Lessons `shift` weeks away from the current one.
    pub async fn timetable_week(&mut self, shift: i32) -> PortalResult<Extracted<Lesson>> {
        let mut result = self.timetable().await?;
        let direction = if shift >= 0 { Week::Next } else { Week::Previous };
        for _ in 0..shift.unsigned_abs() {
            result = self.timetable_step(direction).await?;
        }
        Ok(result)
    }

    /// Lessons of the week containing `date`.
    pub async fn timetable_for_date(&mut self, date: NaiveDate) -> PortalResult<Extracted<Lesson>> {
        let formatted = timetable::format_date(date);
        let html = self
            .postback(
                TIMETABLE_KEY,
                pages::TIMETABLE,
                controls::TIMETABLE_DATE,
                &[(controls::TIMETABLE_DATE, formatted.as_str())],
            )
            .await?;
        Ok(timetable::parse(&html))
    }

    // ── inbox ───────────────────────────────────────────────────────

    pub async fn messages(&mut self) -> PortalResult<Extracted<Message>> {
        let html = self.fetch_page(&pages::inbox(pages::INBOX_MESSAGES)).await?;
        Ok(inbox::parse_messages(&html))
    }

    pub async fn notifications(&mut self) -> PortalResult<Extracted<Notification>> {
        let html = self
            .fetch_page(&pages::inbox(pages::INBOX_NOTIFICATIONS))
            .await?;
        Ok(inbox::parse_notifications(&html))
    }

    /// One message or notification with its normalised body.
    pub async fn message_detail(&mut self, id: u64) -> PortalResult<Option<MessageDetail>> {
        let html = self.fetch_page(&pages::message_detail(id)).await?;
        Ok(inbox::parse_detail(&html, id))
    }

    // ── documents ───────────────────────────────────────────────────

    pub async fn documents(&mut self) -> PortalResult<Vec<TreeNode>> {
        let html = self.fetch_page(pages::DOCUMENTS).await?;
        documents::parse_tree(&html)
    }

    pub async fn folder_files(&mut self, folder_id: u64) -> PortalResult<Extracted<FileEntry>> {
        let html = self.fetch_page(&pages::folder(folder_id)).await?;
        Ok(documents::parse_files(&html))
    }

    pub async fn download(&mut self, file_id: u64) -> PortalResult<DownloadedFile> {
        let page = self.fetch_raw(&pages::download(file_id)).await?;
        Ok(DownloadedFile::from_page(file_id, page))
    }

    // ── grades and exams ────────────────────────────────────────────

    pub async fn grades(&mut self) -> PortalResult<GradeSummary> {
        let html = self.fetch_page(pages::GRADES).await?;
        Ok(grades::summarize(grades::parse(&html)))
    }

    pub async fn exam_periods(&mut self) -> PortalResult<Vec<ExamPeriod>> {
        let html = self.fetch_tracked(EXAMS_KEY, pages::EXAMS).await?;
        Ok(exams::periods(&html))
    }

    /// Registered exams.
    ///
    /// With a period pre-selected the page is parsed as is. Otherwise every
    /// period is posted back concurrently with the page's one token triple
    /// and the rows are merged without duplicates.
    pub async fn exams(&mut self) -> PortalResult<Extracted<ExamEntry>> {
        let html = self.fetch_tracked(EXAMS_KEY, pages::EXAMS).await?;

        if let Some(period) = exams::selected_period(&html) {
            tracing::debug!(period = %period.value, "exam period pre-selected");
            return Ok(exams::parse(&html));
        }
        let periods = exams::periods(&html);
        if periods.is_empty() {
            return Ok(exams::parse(&html));
        }

        let tokens = WebFormsTokens::from_html(&html);
        let shared = SharedCookieJar::new(self.session.cookies().clone());
        tracing::info!(periods = periods.len(), "fetching exams for every period");

        let batches = {
            let shared = &shared;
            let requests = periods.iter().map(|period| {
                let engine = self.engine.clone();
                let body = tokens.form_body(
                    controls::EXAM_PERIOD,
                    &[(controls::EXAM_PERIOD, period.value.as_str())],
                );
                async move {
                    let mut jar = shared.snapshot();
                    let result = engine.post_ok(&mut jar, pages::EXAMS, body).await;
                    shared.merge(&jar);
                    result.map(|page| {
                        if landed_on_login(&page) {
                            tracing::info!(url = %page.url, "exam period postback redirected to login");
                            None
                        } else {
                            Some(exams::parse(&page.text()))
                        }
                    })
                }
            });
            join_all(requests).await
        };

        self.session.replace_cookies(shared.into_inner());

        let batches = batches.into_iter().collect::<PortalResult<Vec<_>>>()?;
        let Some(batches) = batches.into_iter().collect::<Option<Vec<_>>>() else {
            return Err(self.expire());
        };

        let notice = batches.iter().find_map(|batch| batch.notice.clone());
        let merged = exams::merge_unique(batches.into_iter().map(|batch| batch.records));
        tracing::info!(records = merged.len(), "merged exam periods");
        match notice {
            Some(notice) if merged.is_empty() => Ok(Extracted::empty_with(notice)),
            _ => Ok(Extracted::new(merged)),
        }
    }

    // ── payments and regularity ─────────────────────────────────────

    pub async fn payments(&mut self) -> PortalResult<PaymentSummary> {
        let html = self.fetch_page(pages::PAYMENTS).await?;
        Ok(payments::summarize(payments::parse(&html)))
    }

    pub async fn regularity(&mut self) -> PortalResult<Extracted<RegularityRow>> {
        let html = self.fetch_page(pages::REGULARITY).await?;
        Ok(regularity::parse(&html))
    }
}

/// A content request that ends on the login page.
fn landed_on_login(page: &RawPage) -> bool {
    page.url
        .to_ascii_lowercase()
        .contains(&pages::LOGIN.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::engine::tests::{page, StubTransport};

    const TIMETABLE_PAGE: &str = r#"
        <input type="hidden" name="__VIEWSTATE" value="week-1" />
        <table id="tblRaspored"><tr><td>Pon</td><td>7.10.</td><td>08-10</td><td>Fizika</td><td>P</td><td>D1</td><td>Ivić</td></tr></table>"#;
    const NEXT_PAGE: &str = r#"
        <input type="hidden" name="__VIEWSTATE" value="week-2" />
        <table id="tblRaspored"><tr><td>Pon</td><td>14.10.</td><td>08-10</td><td>Kemija</td><td>P</td><td>D1</td><td>Anić</td></tr></table>"#;

    fn authenticated(stub: Arc<StubTransport>) -> PortalClient {
        let mut client = PortalClient::with_transport(
            PortalConfig::with_base_url("https://portal.example.hr"),
            stub,
        );
        client.session.cookies_mut().insert(".ASPXAUTH", "tok");
        client.session.set_state(AuthState::Authenticated);
        client
    }

    #[tokio::test]
    async fn test_operations_require_login() {
        let stub = Arc::new(StubTransport::new(Vec::new(), None));
        let mut client = PortalClient::with_transport(PortalConfig::default(), stub.clone());
        let err = client.grades().await.unwrap_err();
        assert!(matches!(err, PortalError::SessionExpired));
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn test_week_navigation_uses_latest_tokens() {
        let third = NEXT_PAGE.replace("week-2", "week-3");
        let stub = Arc::new(StubTransport::new(
            vec![
                page(200, &[], TIMETABLE_PAGE),
                page(200, &[], NEXT_PAGE),
                page(200, &[], &third),
            ],
            None,
        ));
        let mut client = authenticated(stub.clone());

        let lessons = client.timetable_week(2).await.unwrap();
        assert_eq!(lessons.records[0].subject, "Kemija");

        let requests = stub.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        let second = requests[1].body.as_deref().unwrap();
        let last = requests[2].body.as_deref().unwrap();
        assert!(second.contains("__VIEWSTATE=week-1"));
        assert!(last.contains("__VIEWSTATE=week-2"));
        assert!(last.contains("lbSljedeciTjedan"));
    }

    #[tokio::test]
    async fn test_landing_on_login_expires_session() {
        let stub = Arc::new(StubTransport::new(
            vec![
                page(302, &[("Location", "/lib-student/Login.aspx")], ""),
                page(200, &[], "<form>login</form>"),
            ],
            None,
        ));
        let mut client = authenticated(stub);
        let err = client.messages().await.unwrap_err();
        assert!(matches!(err, PortalError::SessionExpired));
        assert_eq!(client.state(), AuthState::Expired);
    }

    #[tokio::test]
    async fn test_exams_with_preselected_period_parse_directly() {
        let html = r#"
            <select name="ctl00$ContentPlaceHolder1$ddlAkGodRok">
                <option value="2024/2025|1" selected="selected">Zimski</option>
                <option value="2024/2025|2">Ljetni</option>
            </select>
            <table id="gvIspiti"><tr><td>Fizika</td><td>Marić</td><td>3. 2. 2025.</td><td>D1</td><td>Prijavljen</td></tr></table>"#;
        let stub = Arc::new(StubTransport::new(vec![page(200, &[], html)], None));
        let mut client = authenticated(stub.clone());

        let exams = client.exams().await.unwrap();
        assert_eq!(exams.len(), 1);
        assert_eq!(stub.request_count(), 1);
    }

    #[tokio::test]
    async fn test_exam_fan_out_merges_cookies_and_rows() {
        let periods = r#"
            <input type="hidden" name="__VIEWSTATE" value="vs" />
            <select name="ctl00$ContentPlaceHolder1$ddlAkGodRok">
                <option value="">--</option>
                <option value="2024/2025|1">Zimski</option>
                <option value="2024/2025|2">Ljetni</option>
            </select>"#;
        let rows = r#"<table id="gvIspiti"><tr><td>Fizika</td><td>Marić</td><td>3. 2. 2025.</td><td>D1</td><td>Prijavljen</td></tr></table>"#;
        let stub = Arc::new(StubTransport::new(
            vec![
                page(200, &[], periods),
                page(200, &[("Set-Cookie", "lastPeriod=x")], rows),
                page(200, &[], rows),
            ],
            None,
        ));
        let mut client = authenticated(stub.clone());

        let exams = client.exams().await.unwrap();
        assert_eq!(exams.len(), 1);
        assert_eq!(stub.request_count(), 3);
        assert_eq!(client.session().cookies().get("lastPeriod"), Some("x"));
        assert_eq!(client.session().cookies().get(".ASPXAUTH"), Some("tok"));
    }

    const TWO_PERIODS: &str = r#"
        <input type="hidden" name="__VIEWSTATE" value="vs" />
        <select name="ctl00$ContentPlaceHolder1$ddlAkGodRok">
            <option value="2024/2025|1">Zimski</option>
            <option value="2024/2025|2">Ljetni</option>
        </select>"#;

    #[tokio::test]
    async fn test_exam_fan_out_keeps_rotated_session_cookie() {
        let rows = r#"<table id="gvIspiti"><tr><td>Fizika</td><td>Marić</td><td>3. 2. 2025.</td><td>D1</td><td>Prijavljen</td></tr></table>"#;
        let stub = Arc::new(StubTransport::new(
            vec![
                page(200, &[], TWO_PERIODS),
                page(200, &[("Set-Cookie", "ASP.NET_SessionId=rotated; path=/")], rows),
                page(200, &[], rows),
            ],
            None,
        ));
        let mut client = authenticated(stub.clone());
        client
            .session
            .cookies_mut()
            .insert("ASP.NET_SessionId", "old");

        client.exams().await.unwrap();
        assert_eq!(
            client.session().cookies().get("ASP.NET_SessionId"),
            Some("rotated")
        );
        assert_eq!(client.session().cookies().get(".ASPXAUTH"), Some("tok"));
    }

    #[tokio::test]
    async fn test_exam_period_redirected_to_login_expires_session() {
        let rows = r#"<table id="gvIspiti"><tr><td>Fizika</td><td>Marić</td><td>3. 2. 2025.</td><td>D1</td><td>Prijavljen</td></tr></table>"#;
        let stub = Arc::new(StubTransport::new(
            vec![
                page(200, &[], TWO_PERIODS),
                page(200, &[], rows),
                page(302, &[("Location", "/lib-student/Login.aspx")], ""),
                page(200, &[], "<form>login</form>"),
            ],
            None,
        ));
        let mut client = authenticated(stub.clone());

        let err = client.exams().await.unwrap_err();
        assert!(matches!(err, PortalError::SessionExpired));
        assert_eq!(client.state(), AuthState::Expired);
    }

    #[tokio::test]
    async fn test_exam_fan_out_surfaces_no_records_label() {
        let empty = r#"<span id="ctl00_ContentPlaceHolder1_lblNemaIspita">Nema prijavljenih ispita</span>"#;
        let stub = Arc::new(StubTransport::new(
            vec![
                page(200, &[], TWO_PERIODS),
                page(200, &[], empty),
                page(200, &[], empty),
            ],
            None,
        ));
        let mut client = authenticated(stub);

        let exams = client.exams().await.unwrap();
        assert!(exams.is_empty());
        assert_eq!(exams.notice.as_deref(), Some("Nema prijavljenih ispita"));
    }
}

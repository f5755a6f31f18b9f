//! End-to-end tests against a mock portal.
//!
//! Drives the real reqwest transport against wiremock: cookies, redirects,
//! windows-1250 bodies and WebForms postbacks all cross a real socket.

use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use student_portal::encoding;
use student_portal::transport::{Engine, ReqwestTransport};
use student_portal::{AuthState, CookieJar, HttpMethod, PortalClient, PortalConfig, PortalError};

const LOGIN_PAGE: &str = r#"<html><body><form method="post" action="./Login.aspx">
    <input type="hidden" name="__VIEWSTATE" value="/wEPDwULLTE2MTY2ODcyMjlkZA==" />
    <input type="hidden" name="__VIEWSTATEGENERATOR" value="C2EE9ABB" />
    <input type="hidden" name="__EVENTVALIDATION" value="/wEdAAS2vt3W" />
    <input name="ctl00$ContentPlaceHolder1$txtKorisnickoIme" type="text" />
    <input name="ctl00$ContentPlaceHolder1$txtLozinka" type="password" />
    </form></body></html>"#;

const HOME_PAGE: &str = r#"<html><body>
    <div class="zaglavlje"><span id="ctl00_lblKorisnik">Ana Anić</span></div>
    </body></html>"#;

/// A 200 response with the body encoded the way the portal encodes it.
fn portal_html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(encoding::encode(body), "text/html")
}

fn client_for(server: &MockServer) -> PortalClient {
    PortalClient::new(PortalConfig::with_base_url(server.uri())).expect("client")
}

/// Login page, credential check and a home page that needs the auth cookie.
async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/lib-student/Login.aspx"))
        .respond_with(
            portal_html(LOGIN_PAGE).append_header("Set-Cookie", "ASP.NET_SessionId=s1; path=/; HttpOnly"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/lib-student/Login.aspx"))
        .and(body_string_contains("txtLozinka=tajna"))
        .and(body_string_contains("__VIEWSTATE=%2FwEPDwULLTE2MTY2ODcyMjlkZA%3D%3D"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "Default.aspx")
                .append_header("Set-Cookie", ".ASPXAUTH=A1B2C3; path=/; HttpOnly"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/lib-student/Login.aspx"))
        .respond_with(portal_html(LOGIN_PAGE))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/lib-student/Default.aspx"))
        .and(header_regex("cookie", r"\.ASPXAUTH=A1B2C3"))
        .respond_with(portal_html(HOME_PAGE))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/lib-student/Default.aspx"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "Login.aspx"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_success_decodes_user_name() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let mut client = client_for(&server);

    let user = client.login("ana.anic", "tajna").await.unwrap();

    assert_eq!(user, "Ana Anić");
    assert_eq!(client.state(), AuthState::Authenticated);
    let cookies = client.session().cookies();
    assert_eq!(cookies.get(".ASPXAUTH"), Some("A1B2C3"));
    assert_eq!(cookies.get("ASP.NET_SessionId"), Some("s1"));
    assert!(client.check_session().await);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_invalid_credentials() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let mut client = client_for(&server);

    let err = client.login("ana.anic", "kriva").await.unwrap_err();

    assert!(matches!(err, PortalError::InvalidCredentials));
    assert!(err.is_auth());
    assert_eq!(client.state(), AuthState::Anonymous);
    assert!(client.session().cookies().is_empty());
}

#[tokio::test]
async fn test_login_without_user_label_is_incomplete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lib-student/Login.aspx"))
        .respond_with(portal_html(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/lib-student/Login.aspx"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "Default.aspx")
                .append_header("Set-Cookie", ".ASPXAUTH=A1B2C3; path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lib-student/Default.aspx"))
        .respond_with(portal_html("<html><body>Korisnički račun je zaključan.</body></html>"))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let err = client.login("ana.anic", "tajna").await.unwrap_err();

    assert!(matches!(err, PortalError::LoginIncomplete));
    assert_ne!(err.user_message(), PortalError::InvalidCredentials.user_message());
}

#[tokio::test]
async fn test_expired_session_is_detected() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/lib-student/Indeks.aspx"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "Login.aspx"))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.login("ana.anic", "tajna").await.unwrap();

    let err = client.grades().await.unwrap_err();
    assert!(matches!(err, PortalError::SessionExpired));
    assert_eq!(client.state(), AuthState::Expired);
}

#[tokio::test]
async fn test_check_session_fails_closed_on_network_error() {
    // nothing listens on the discard port
    let config = PortalConfig {
        timeout_ms: 2_000,
        ..PortalConfig::with_base_url("http://127.0.0.1:9")
    };
    let mut client = PortalClient::new(config).unwrap();
    assert!(!client.check_session().await);
}

#[tokio::test]
async fn test_infinite_redirect_loop_stops_after_ten_hops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lib-student/Loop.aspx"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "Loop.aspx"))
        .expect(11)
        .mount(&server)
        .await;

    let config = Arc::new(PortalConfig::with_base_url(server.uri()));
    let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(5)).unwrap());
    let engine = Engine::new(config, transport);
    let mut jar = CookieJar::new();

    let page = engine
        .send(&mut jar, HttpMethod::Get, "Loop.aspx", None)
        .await
        .unwrap();
    assert_eq!(page.status, 302);
}

#[tokio::test]
async fn test_exam_periods_are_fanned_out_and_deduplicated() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let periods_page = r#"<html><body><form>
        <input type="hidden" name="__VIEWSTATE" value="exams-vs" />
        <input type="hidden" name="__EVENTVALIDATION" value="exams-ev" />
        <select name="ctl00$ContentPlaceHolder1$ddlAkGodRok">
            <option value="">-- odaberite --</option>
            <option value="2024/2025|1">2024/2025 - zimski</option>
            <option value="2024/2025|2">2024/2025 - ljetni</option>
        </select></form></body></html>"#;
    let row = |subject: &str, date: &str| {
        format!("<tr><td>{subject}</td><td>dr. sc. Ivo Ivić</td><td>{date}</td><td>D1</td><td>Prijavljen</td></tr>")
    };
    let winter = format!(
        r#"<table id="ctl00_ContentPlaceHolder1_gvIspiti">{}{}</table>"#,
        row("Matematika 1", "3. 2. 2025."),
        row("Fizika", "5. 2. 2025.")
    );
    let summer = format!(
        r#"<table id="ctl00_ContentPlaceHolder1_gvIspiti">{}{}</table>"#,
        row("Matematika 1", "3. 2. 2025."),
        row("Kemija", "20. 6. 2025.")
    );

    Mock::given(method("GET"))
        .and(path("/lib-student/IzvPrijavljeniIspiti.aspx"))
        .respond_with(portal_html(periods_page))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/lib-student/IzvPrijavljeniIspiti.aspx"))
        .and(body_string_contains("ddlAkGodRok=2024%2F2025%7C1"))
        .and(body_string_contains("__VIEWSTATE=exams-vs"))
        .respond_with(portal_html(&winter))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/lib-student/IzvPrijavljeniIspiti.aspx"))
        .and(body_string_contains("ddlAkGodRok=2024%2F2025%7C2"))
        .and(body_string_contains("__VIEWSTATE=exams-vs"))
        .respond_with(portal_html(&summer))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.login("ana.anic", "tajna").await.unwrap();
    let exams = client.exams().await.unwrap();

    let subjects: Vec<&str> = exams.records.iter().map(|e| e.subject.as_str()).collect();
    assert_eq!(subjects.len(), 3);
    assert_eq!(subjects.iter().filter(|s| **s == "Matematika 1").count(), 1);
    assert!(subjects.contains(&"Fizika"));
    assert!(subjects.contains(&"Kemija"));
    assert_eq!(exams.records[0].professor, "dr. sc. Ivo Ivić");
}

#[tokio::test]
async fn test_messages_and_notifications_share_endpoint() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/lib-student/PorukePrimljene.aspx"))
        .and(query_param("idPV", "1"))
        .respond_with(portal_html(
            r#"<table id="gvPoruke"><tr><td><a href="PorukaDetalji.aspx?id=12&amp;idThread=3">Žalba na ocjenu</a></td>
               <td>Referada</td><td>Ana Anić</td><td>1.10.2024.</td><td>2.10.2024.</td><td></td></tr></table>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lib-student/PorukePrimljene.aspx"))
        .and(query_param("idPV", "2"))
        .respond_with(portal_html(
            r#"<span id="ctl00_ContentPlaceHolder1_lblNemaObavijesti">Nema novih obavijesti.</span>"#,
        ))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.login("ana.anic", "tajna").await.unwrap();

    let messages = client.messages().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages.records[0].subject, "Žalba na ocjenu");
    assert_eq!(messages.records[0].thread_id, Some(3));
    assert!(messages.records[0].is_read);

    let notifications = client.notifications().await.unwrap();
    assert!(notifications.is_empty());
    assert_eq!(notifications.notice.as_deref(), Some("Nema novih obavijesti."));
}

#[tokio::test]
async fn test_download_recovers_windows_1250_filename() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let mut disposition = b"attachment; filename=\"".to_vec();
    disposition.extend(encoding::encode("Šifre ispita.pdf"));
    disposition.push(b'"');

    Mock::given(method("GET"))
        .and(path("/lib-student/getFile.aspx"))
        .and(query_param("id", "42"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", disposition.as_slice())
                .set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"),
        )
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.login("ana.anic", "tajna").await.unwrap();
    let file = client.download(42).await.unwrap();

    assert_eq!(file.file_name, "Šifre ispita.pdf");
    assert_eq!(file.content_type, "application/pdf");
    assert_eq!(file.bytes, b"%PDF-1.4");
}

#[tokio::test]
async fn test_logout_visits_portal_and_is_idempotent() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/lib-student/Logout.aspx"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "Login.aspx"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    client.login("ana.anic", "tajna").await.unwrap();
    client.logout().await;
    client.logout().await;

    assert_eq!(client.state(), AuthState::LoggedOut);
    assert!(client.session().cookies().is_empty());
}

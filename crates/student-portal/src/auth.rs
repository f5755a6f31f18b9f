//! Authentication state machine.
//!
//! `Anonymous -> Authenticating -> Authenticated -> (Expired | LoggedOut)`.
//! The session cookie is the only ground truth for "logged in"; the user-name
//! label is a second check that the portal accepted the account.

use scraper::Html;

use crate::error::{PortalError, PortalResult};
use crate::extract::select_text;
use crate::pages::{self, controls};
use crate::postback::WebFormsTokens;
use crate::session::{AuthState, Session};
use crate::transport::{Engine, HttpMethod};

/// Display name of the signed-in user, if the page shows one.
pub fn user_label(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    select_text(&document, pages::USER_LABEL_SELECTORS)
}

/// Log in from scratch. Any failure leaves the session anonymous and empty.
pub async fn login(
    engine: &Engine,
    session: &mut Session,
    username: &str,
    password: &str,
) -> PortalResult<String> {
    session.reset();
    session.set_state(AuthState::Authenticating);

    match try_login(engine, session, username, password).await {
        Ok(name) => {
            tracing::info!(user = %name, "logged in");
            session.set_user_name(Some(name.clone()));
            session.set_state(AuthState::Authenticated);
            Ok(name)
        }
        Err(err) => {
            tracing::warn!(error = %err, "login failed");
            session.reset();
            session.set_state(AuthState::Anonymous);
            Err(err)
        }
    }
}

async fn try_login(
    engine: &Engine,
    session: &mut Session,
    username: &str,
    password: &str,
) -> PortalResult<String> {
    let login_page = engine.get_ok(session.cookies_mut(), pages::LOGIN).await?;
    let tokens = WebFormsTokens::from_html(&login_page.text());
    if !tokens.is_present() {
        tracing::warn!("login page exposes no __VIEWSTATE");
    }

    let body = tokens.form_body(
        controls::LOGIN_BUTTON,
        &[
            (controls::LOGIN_USERNAME, username),
            (controls::LOGIN_PASSWORD, password),
        ],
    );
    let landing = engine
        .send(session.cookies_mut(), HttpMethod::Post, pages::LOGIN, Some(body))
        .await?;

    let cookie = &engine.config().session_cookie;
    if !session.cookies().has_value(cookie) {
        return Err(PortalError::InvalidCredentials);
    }

    let mut name = if landing.status == 200 {
        user_label(&landing.text())
    } else {
        None
    };
    if name.is_none() {
        let home = engine.get_ok(session.cookies_mut(), pages::HOME).await?;
        name = user_label(&home.text());
    }

    name.ok_or(PortalError::LoginIncomplete)
}

/// Validate the session against the home page. Fails closed: any transport
/// or fetch error counts as invalid.
pub async fn check_session(engine: &Engine, session: &mut Session) -> bool {
    let valid = match engine.get_ok(session.cookies_mut(), pages::HOME).await {
        Ok(page) => match user_label(&page.text()) {
            Some(name) => {
                if session.user_name().is_none() {
                    session.set_user_name(Some(name));
                }
                true
            }
            None => false,
        },
        Err(err) => {
            tracing::debug!(error = %err, "session check failed");
            false
        }
    };

    if !valid && session.state() == AuthState::Authenticated {
        tracing::info!("session expired");
        session.set_state(AuthState::Expired);
    }
    valid
}

/// Discard the session. Idempotent; the portal's logout page is visited
/// first when there is a session to end, and its failure is ignored.
pub async fn logout(engine: &Engine, session: &mut Session) {
    if session.is_authenticated() {
        if let Err(err) = engine.get_ok(session.cookies_mut(), pages::LOGOUT).await {
            tracing::debug!(error = %err, "portal logout failed, discarding session anyway");
        }
        tracing::info!(user = session.user_name().unwrap_or_default(), "logged out");
    }
    session.reset();
    session.set_state(AuthState::LoggedOut);
}

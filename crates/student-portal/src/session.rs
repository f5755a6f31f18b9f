//! Per-user session state.
//!
//! A session is owned by exactly one client and mutated only through `&mut`.

use std::collections::HashMap;

use crate::postback::WebFormsTokens;
use crate::transport::CookieJar;

/// Authentication lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated,
    Expired,
    LoggedOut,
}

/// Cookies, auth state and the latest WebForms tokens per logical page.
#[derive(Debug, Clone)]
pub struct Session {
    cookies: CookieJar,
    state: AuthState,
    user_name: Option<String>,
    tokens: HashMap<String, WebFormsTokens>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            cookies: CookieJar::new(),
            state: AuthState::Anonymous,
            user_name: None,
            tokens: HashMap::new(),
        }
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    pub fn replace_cookies(&mut self, cookies: CookieJar) {
        self.cookies = cookies;
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn set_state(&mut self, state: AuthState) {
        self.state = state;
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn set_user_name(&mut self, name: Option<String>) {
        self.user_name = name;
    }

    /// Remember the tokens of the latest response for `page`, replacing any
    /// older triple. Tokens are single-use.
    pub fn remember_tokens(&mut self, page: &str, tokens: WebFormsTokens) {
        self.tokens.insert(page.to_string(), tokens);
    }

    pub fn tokens_for(&self, page: &str) -> Option<&WebFormsTokens> {
        self.tokens.get(page)
    }

    /// Drop cookies, tokens and the user name.
    pub fn reset(&mut self) {
        self.cookies.clear();
        self.tokens.clear();
        self.user_name = None;
    }
}

//! WebForms postback handler.
//!
//! A WebForms page resubmits itself to simulate UI events. The server only
//! accepts the postback if it echoes the hidden state tokens of the page it
//! came from, so tokens are always taken from the immediately preceding
//! response and never reused after the next one arrives.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use url::form_urlencoded;

use crate::encoding;

pub const VIEWSTATE: &str = "__VIEWSTATE";
pub const VIEWSTATE_GENERATOR: &str = "__VIEWSTATEGENERATOR";
pub const EVENT_VALIDATION: &str = "__EVENTVALIDATION";
pub const EVENT_TARGET: &str = "__EVENTTARGET";
pub const EVENT_ARGUMENT: &str = "__EVENTARGUMENT";

/// The opaque token triple plus page-specific hidden echoes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebFormsTokens {
    pub view_state: String,
    pub event_validation: String,
    pub view_state_generator: String,
    /// Other hidden inputs (`__LASTFOCUS`, `currentDate`, ...), in page order.
    pub extras: Vec<(String, String)>,
}

impl WebFormsTokens {
    /// Read the hidden inputs of a decoded page, by name.
    pub fn from_html(html: &str) -> Self {
        let document = Html::parse_document(html);
        let input_sel = Selector::parse("input[name]").expect("input selector is valid");
        let mut tokens = WebFormsTokens::default();

        for input in document.select(&input_sel) {
            let name = input.value().attr("name").unwrap_or_default();
            let value = input.value().attr("value").unwrap_or_default().to_string();
            match name {
                VIEWSTATE => tokens.view_state = value,
                EVENT_VALIDATION => tokens.event_validation = value,
                VIEWSTATE_GENERATOR => tokens.view_state_generator = value,
                EVENT_TARGET | EVENT_ARGUMENT | "" => {}
                _ => {
                    let hidden = input
                        .value()
                        .attr("type")
                        .is_some_and(|t| t.eq_ignore_ascii_case("hidden"));
                    if hidden {
                        tokens.extras.push((name.to_string(), value));
                    }
                }
            }
        }

        tokens
    }

    /// Whether the page exposed a view state at all.
    pub fn is_present(&self) -> bool {
        !self.view_state.is_empty()
    }

    /// Url-encoded postback body.
    ///
    /// Caller fields override hidden echoes with the same name. Values are
    /// encoded in the portal's charset, as a browser on that page would.
    pub fn form_body(&self, event_target: &str, fields: &[(&str, &str)]) -> String {
        let charset: &dyn Fn(&str) -> Cow<'_, [u8]> = &portal_charset;
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.encoding_override(Some(charset));

        serializer.append_pair(EVENT_TARGET, event_target);
        serializer.append_pair(EVENT_ARGUMENT, "");
        serializer.append_pair(VIEWSTATE, &self.view_state);
        serializer.append_pair(VIEWSTATE_GENERATOR, &self.view_state_generator);
        serializer.append_pair(EVENT_VALIDATION, &self.event_validation);

        for (name, value) in &self.extras {
            if fields.iter().any(|(n, _)| n == name) {
                continue;
            }
            serializer.append_pair(name, value);
        }
        for (name, value) in fields {
            serializer.append_pair(name, value);
        }

        serializer.finish()
    }
}

fn portal_charset(input: &str) -> Cow<'_, [u8]> {
    if input.is_ascii() {
        Cow::Borrowed(input.as_bytes())
    } else {
        Cow::Owned(encoding::encode(input))
    }
}

/// Build the next postback for `source_page`.
///
/// Missing tokens are not fatal: empty defaults are submitted and the server
/// answers with an unchanged page.
pub fn build_postback(source_page: &str, event_target: &str, fields: &[(&str, &str)]) -> String {
    let tokens = WebFormsTokens::from_html(source_page);
    if !tokens.is_present() {
        tracing::warn!(event_target, "source page exposes no __VIEWSTATE, posting empty tokens");
    }
    tokens.form_body(event_target, fields)
}

/// One `<option>` of a dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// Options of the first dropdown matched by the selector chain that has any.
pub fn select_options(html: &str, selectors: &[&str]) -> Vec<SelectOption> {
    let document = Html::parse_document(html);
    let option_sel = Selector::parse("option").expect("option selector is valid");

    for raw in selectors {
        let Ok(sel) = Selector::parse(raw) else {
            tracing::warn!("invalid dropdown selector `{raw}`");
            continue;
        };
        for select in document.select(&sel) {
            let options: Vec<SelectOption> = select
                .select(&option_sel)
                .map(|opt| {
                    let label = crate::extract::collapse_ws(&opt.text().collect::<String>());
                    SelectOption {
                        value: opt
                            .value()
                            .attr("value")
                            .map(|v| v.trim().to_string())
                            .unwrap_or_else(|| label.clone()),
                        label,
                        selected: opt.value().attr("selected").is_some(),
                    }
                })
                .collect();
            if !options.is_empty() {
                return options;
            }
        }
    }

    Vec::new()
}

//! Received messages and notifications (`PorukePrimljene.aspx`) and the
//! single-message view (`PorukaDetalji.aspx`).

use scraper::Html;
use serde::{Deserialize, Serialize};

use super::{body, extract_table, query_param_u64, select_first, select_text, Extracted, TableSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Option<u64>,
    pub thread_id: Option<u64>,
    pub subject: String,
    pub sender: String,
    pub recipient: String,
    pub sent_date: String,
    pub read_date: String,
    pub is_read: bool,
    pub has_attachment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Option<u64>,
    pub title: String,
    pub author: String,
    pub date: String,
    pub is_new: bool,
}

/// One message with its body normalised to inline HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDetail {
    pub id: u64,
    pub subject: String,
    pub sender: String,
    pub sent_date: String,
    pub body_html: String,
}

pub const MESSAGES_TABLE: TableSpec = TableSpec {
    name: "messages",
    selectors: &[
        "table#gvPoruke",
        "table[id$='gvPoruke']",
        "table.poruke",
        "table[id*='oruke']",
    ],
    min_columns: 6,
    empty_labels: &["span[id$='lblNemaPoruka']"],
};

pub const NOTIFICATIONS_TABLE: TableSpec = TableSpec {
    name: "notifications",
    selectors: &[
        "table#gvObavijesti",
        "table[id$='gvObavijesti']",
        "table.obavijesti",
        "table[id$='gvPoruke']",
        "table[id*='bavijest']",
    ],
    min_columns: 3,
    empty_labels: &["span[id$='lblNemaObavijesti']", "span[id$='lblNemaPoruka']"],
};

const UNREAD_CLASSES: &[&str] = &["neprocitano", "neprocitana", "unread"];

/// Parse the message list (`idPV=1`).
pub fn parse_messages(html: &str) -> Extracted<Message> {
    extract_table(html, &MESSAGES_TABLE, |row| {
        let subject = row.text(0);
        if subject.is_empty() {
            return None;
        }
        let link = row.link(0).unwrap_or_default();
        let read_date = row.text(4);
        let marked_unread = UNREAD_CLASSES.iter().any(|c| row.has_class(c));
        let attachment_text = row.text(5).to_lowercase();

        Some(Message {
            id: query_param_u64(&link, "id"),
            thread_id: query_param_u64(&link, "idThread"),
            subject,
            sender: row.text(1),
            recipient: row.text(2),
            sent_date: row.text(3),
            is_read: !read_date.is_empty() && !marked_unread,
            read_date,
            has_attachment: row.cell_has(5, "img, a")
                || matches!(attachment_text.as_str(), "da" | "yes" | "x" | "1"),
        })
    })
}

/// Parse the notification list (`idPV=2`).
pub fn parse_notifications(html: &str) -> Extracted<Notification> {
    extract_table(html, &NOTIFICATIONS_TABLE, |row| {
        let title = row.text(0);
        if title.is_empty() {
            return None;
        }
        let link = row.link(0).unwrap_or_default();
        let is_new = ["novo", "nova"]
            .iter()
            .chain(UNREAD_CLASSES.iter())
            .any(|c| row.has_class(c))
            || row.cell_has(0, "b, strong");

        Some(Notification {
            id: query_param_u64(&link, "id"),
            title,
            author: row.text(1),
            date: row.text(2),
            is_new,
        })
    })
}

const SUBJECT_LABELS: &[&str] = &["#lblNaslov", "span[id$='lblNaslov']", ".poruka-naslov"];
const SENDER_LABELS: &[&str] = &["#lblPosiljatelj", "span[id$='lblPosiljatelj']", ".poruka-posiljatelj"];
const DATE_LABELS: &[&str] = &["#lblDatum", "span[id$='lblDatum']", ".poruka-datum"];
const BODY_CONTAINERS: &[&str] = &["#divTijelo", "div[id$='pnlTijelo']", ".poruka-tijelo"];

/// Parse a single message page. Returns `None` when the page has neither a
/// subject nor a body, e.g. after the portal redirected elsewhere.
pub fn parse_detail(html: &str, id: u64) -> Option<MessageDetail> {
    let document = Html::parse_document(html);
    let subject = select_text(&document, SUBJECT_LABELS).unwrap_or_default();
    let body_html = select_first(&document, BODY_CONTAINERS)
        .map(|el| body::normalize_fragment(&el.inner_html()))
        .unwrap_or_default();

    if subject.is_empty() && body_html.is_empty() {
        tracing::debug!(id, "message page has no subject or body");
        return None;
    }

    Some(MessageDetail {
        id,
        subject,
        sender: select_text(&document, SENDER_LABELS).unwrap_or_default(),
        sent_date: select_text(&document, DATE_LABELS).unwrap_or_default(),
        body_html,
    })
}

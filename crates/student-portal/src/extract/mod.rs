//! Tolerant HTML-to-record extraction.
//!
//! Every domain parser follows the same contract: try an ordered selector
//! chain for the data table, skip rows below a minimum column count, trim
//! text, and degrade to an empty result instead of failing. The shared part
//! lives here; each domain supplies a [`TableSpec`] and a row mapper.

pub mod body;
pub mod documents;
pub mod exams;
pub mod grades;
pub mod inbox;
pub mod payments;
pub mod regularity;
pub mod script_array;
pub mod timetable;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Records of one domain, plus the portal's "no records" text when it showed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extracted<T> {
    pub records: Vec<T>,
    pub notice: Option<String>,
}

impl<T> Default for Extracted<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            notice: None,
        }
    }
}

impl<T> Extracted<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            records,
            notice: None,
        }
    }

    /// Explicit "no records" outcome.
    pub fn empty_with(notice: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            notice: Some(notice.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Where a domain's table lives and what a usable row looks like.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    /// Domain name, for logging.
    pub name: &'static str,
    /// Table selectors, most specific first: id, class, then attribute-contains.
    pub selectors: &'static [&'static str],
    /// Rows with fewer `td` cells are skipped.
    pub min_columns: usize,
    /// Label elements the portal fills with its "no records" text.
    pub empty_labels: &'static [&'static str],
}

/// Labels shared by every panel of the portal.
pub const COMMON_EMPTY_LABELS: &[&str] = &[
    "span[id$='lblNemaPodataka']",
    "span[id$='lblNemaZapisa']",
    "span[id$='lblPoruka']",
    ".nema-podataka",
];

/// One table row handed to a row mapper.
pub struct Row<'a> {
    pub element: ElementRef<'a>,
    pub cells: Vec<ElementRef<'a>>,
}

impl<'a> Row<'a> {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, index: usize) -> Option<ElementRef<'a>> {
        self.cells.get(index).copied()
    }

    /// Trimmed, whitespace-collapsed text of a cell; empty when absent.
    pub fn text(&self, index: usize) -> String {
        self.cell(index).map(element_text).unwrap_or_default()
    }

    /// `href` of the first link inside a cell.
    pub fn link(&self, index: usize) -> Option<String> {
        let sel = Selector::parse("a[href]").ok()?;
        self.cell(index)?
            .select(&sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|h| h.trim().to_string())
    }

    /// Whether a cell contains an element matching `selector`.
    pub fn cell_has(&self, index: usize, selector: &str) -> bool {
        let (Some(cell), Ok(sel)) = (self.cell(index), Selector::parse(selector)) else {
            return false;
        };
        cell.select(&sel).next().is_some()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.element
            .value()
            .classes()
            .any(|c| c.eq_ignore_ascii_case(class))
    }
}

/// Run the tolerant-parse strategy for one domain.
///
/// The first selector that yields at least one usable row wins. The mapper
/// may return `None` to skip a row it cannot use.
pub fn extract_table<T, F>(html: &str, spec: &TableSpec, mut map_row: F) -> Extracted<T>
where
    F: FnMut(&Row<'_>) -> Option<T>,
{
    let document = Html::parse_document(html);

    if let Some(notice) = no_records_notice(&document, spec.empty_labels) {
        tracing::info!(domain = spec.name, notice = %notice, "portal reports no records");
        return Extracted::empty_with(notice);
    }

    let row_sel = Selector::parse("tr").expect("row selector is valid");
    let cell_sel = Selector::parse("td").expect("cell selector is valid");

    for raw in spec.selectors {
        let Ok(table_sel) = Selector::parse(raw) else {
            tracing::warn!(domain = spec.name, "invalid selector `{raw}`");
            continue;
        };

        let mut records = Vec::new();
        let mut usable_rows = 0usize;
        let mut seen = HashSet::new();
        for table in document.select(&table_sel) {
            for tr in table.select(&row_sel) {
                // Rows of a nested table the selector also matches belong to
                // that table's own pass.
                let nested = owning_table(tr)
                    .is_some_and(|owner| owner != table && table_sel.matches(&owner));
                if nested || !seen.insert(tr.id()) {
                    continue;
                }
                let cells: Vec<ElementRef<'_>> = tr
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|c| cell_sel.matches(c))
                    .collect();
                if cells.len() < spec.min_columns {
                    continue;
                }
                usable_rows += 1;
                let row = Row { element: tr, cells };
                if let Some(record) = map_row(&row) {
                    records.push(record);
                }
            }
        }

        if usable_rows > 0 {
            tracing::info!(
                domain = spec.name,
                selector = raw,
                records = records.len(),
                "extracted records"
            );
            return Extracted::new(records);
        }
    }

    tracing::debug!(domain = spec.name, "no matching table");
    Extracted::default()
}

/// Nearest `table` ancestor of a row.
fn owning_table(tr: ElementRef<'_>) -> Option<ElementRef<'_>> {
    tr.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
}

/// Text of the first non-empty "no records" label, if the page shows one.
pub fn no_records_notice(document: &Html, labels: &[&str]) -> Option<String> {
    labels
        .iter()
        .chain(COMMON_EMPTY_LABELS.iter())
        .filter_map(|raw| Selector::parse(raw).ok())
        .flat_map(|sel| {
            document
                .select(&sel)
                .map(element_text)
                .collect::<Vec<_>>()
        })
        .find(|text| is_no_records_text(text))
}

/// The portal's canonical "no records" phrasing.
pub fn is_no_records_text(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    !lower.is_empty()
        && (lower.starts_with("nema ")
            || lower.contains("nema podataka")
            || lower.contains("nema zapisa")
            || lower.contains("nije pronađen")
            || lower.contains("no records"))
}

/// First element matched by a selector chain.
pub fn select_first<'a>(document: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .filter_map(|raw| Selector::parse(raw).ok())
        .find_map(|sel| document.select(&sel).next())
}

/// First non-empty text matched by a selector chain.
pub fn select_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|raw| Selector::parse(raw).ok())
        .flat_map(|sel| document.select(&sel).map(element_text).collect::<Vec<_>>())
        .find(|t| !t.is_empty())
}

pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_ws(&el.text().collect::<String>())
}

/// Collapse whitespace runs (including non-breaking spaces) and trim.
pub fn collapse_ws(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a displayed number such as `6`, `5,5`, `1.234,56 €` or `-12,00`.
pub fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if cleaned.matches('.').count() > 1 {
        cleaned.replace('.', "")
    } else {
        cleaned
    };
    normalized.parse().ok()
}

/// Derived numbers treat unparseable display strings as zero.
pub fn number_or_zero(s: &str) -> f64 {
    parse_number(s).unwrap_or(0.0)
}

/// Numeric query parameter from a link, e.g. `id` in `PorukaDetalji.aspx?id=12`.
pub fn query_param_u64(href: &str, name: &str) -> Option<u64> {
    let query = href.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k.eq_ignore_ascii_case(name) {
            v.trim().parse().ok()
        } else {
            None
        }
    })
}

//! Registered exams (`IzvPrijavljeniIspiti.aspx`) and exam-period discovery.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{extract_table, Extracted, TableSpec};
use crate::postback::{self, SelectOption};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExamEntry {
    pub subject: String,
    pub professor: String,
    pub exam_date: String,
    pub room: String,
    pub registration_state: String,
}

/// A selectable academic-year/exam-session pair (`val|val`).
pub type ExamPeriod = SelectOption;

pub const TABLE: TableSpec = TableSpec {
    name: "exams",
    selectors: &[
        "table#gvIspiti",
        "table[id$='gvIspiti']",
        "table.ispiti",
        "table[id*='spit']",
    ],
    min_columns: 5,
    empty_labels: &["span[id$='lblNemaIspita']"],
};

pub const PERIOD_SELECTORS: &[&str] = &[
    "select[name$='ddlAkGodRok']",
    "select[id*='Rok']",
    "select",
];

pub fn parse(html: &str) -> Extracted<ExamEntry> {
    extract_table(html, &TABLE, |row| {
        let subject = row.text(0);
        if subject.is_empty() {
            return None;
        }
        Some(ExamEntry {
            subject,
            professor: row.text(1),
            exam_date: row.text(2),
            room: row.text(3),
            registration_state: row.text(4),
        })
    })
}

/// Selectable periods of the dropdown; placeholder options without a value
/// are dropped.
pub fn periods(html: &str) -> Vec<ExamPeriod> {
    postback::select_options(html, PERIOD_SELECTORS)
        .into_iter()
        .filter(|o| !o.value.is_empty())
        .collect()
}

/// The period the server already selected, if any.
pub fn selected_period(html: &str) -> Option<ExamPeriod> {
    periods(html).into_iter().find(|o| o.selected)
}

/// Merge per-period results, dropping rows identical in every field and
/// keeping first-seen order.
pub fn merge_unique(batches: impl IntoIterator<Item = Vec<ExamEntry>>) -> Vec<ExamEntry> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|entry| seen.insert(entry.clone()))
        .collect()
}

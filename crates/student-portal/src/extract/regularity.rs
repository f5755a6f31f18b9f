//! Enrollment history (`Redovitost.aspx`).

use serde::{Deserialize, Serialize};

use super::{extract_table, Extracted, TableSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegularityRow {
    pub academic_year: String,
    pub study_year: String,
    pub enrollment_status: String,
    pub ects_enrolled: String,
    pub ects_passed: String,
}

pub const TABLE: TableSpec = TableSpec {
    name: "regularity",
    selectors: &[
        "table#gvRedovitost",
        "table[id$='gvRedovitost']",
        "table.redovitost",
        "table[id*='edovit']",
    ],
    min_columns: 5,
    empty_labels: &["span[id$='lblNemaUpisa']"],
};

pub fn parse(html: &str) -> Extracted<RegularityRow> {
    extract_table(html, &TABLE, |row| {
        let academic_year = row.text(0);
        if academic_year.is_empty() {
            return None;
        }
        Some(RegularityRow {
            academic_year,
            study_year: row.text(1),
            enrollment_status: row.text(2),
            ects_enrolled: row.text(3),
            ects_passed: row.text(4),
        })
    })
}

//! Weekly timetable (`raspored.aspx`).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{extract_table, Extracted, TableSpec};

/// One scheduled class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub day: String,
    pub date: String,
    pub time_range: String,
    pub subject: String,
    pub lesson_type: String,
    pub room: String,
    pub professor: String,
}

pub const TABLE: TableSpec = TableSpec {
    name: "timetable",
    selectors: &[
        "table#tblRaspored",
        "table[id$='gvRaspored']",
        "table.raspored",
        "table[id*='aspored']",
    ],
    min_columns: 7,
    empty_labels: &["span[id$='lblNemaNastave']"],
};

/// Parse the lessons of one week.
///
/// The portal only prints the day and date on the first lesson of each day;
/// later rows of the same day inherit them.
pub fn parse(html: &str) -> Extracted<Lesson> {
    let mut day = String::new();
    let mut date = String::new();

    extract_table(html, &TABLE, |row| {
        let row_day = row.text(0);
        let row_date = row.text(1);
        if !row_day.is_empty() {
            day = row_day;
        }
        if !row_date.is_empty() {
            date = row_date;
        }

        let subject = row.text(3);
        if subject.is_empty() {
            return None;
        }

        Some(Lesson {
            day: day.clone(),
            date: date.clone(),
            time_range: row.text(2),
            subject,
            lesson_type: row.text(4),
            room: row.text(5),
            professor: row.text(6),
        })
    })
}

/// Date in the format the timetable's date box accepts: `D. M. YYYY.`
pub fn format_date(date: NaiveDate) -> String {
    format!("{}. {}. {}.", date.day(), date.month(), date.year())
}

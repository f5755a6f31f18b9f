//! Transcript (`Indeks.aspx`).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::{extract_table, number_or_zero, Extracted, TableSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRow {
    pub course: String,
    pub professor: String,
    pub attempts: String,
    /// As displayed, e.g. `izvrstan (5)` or empty when not yet graded.
    pub final_grade: String,
    pub ects: String,
}

impl GradeRow {
    /// Numeric passing grade (2..=5) shown in the grade column, if any.
    pub fn passing_grade(&self) -> Option<u8> {
        static CELL: OnceLock<Option<Regex>> = OnceLock::new();
        let regex = CELL.get_or_init(|| Regex::new(r"\b([1-5])\b").ok()).as_ref()?;
        let grade: u8 = regex.captures(&self.final_grade)?.get(1)?.as_str().parse().ok()?;
        (2..=5).contains(&grade).then_some(grade)
    }
}

/// Transcript rows plus derived totals over passed courses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSummary {
    pub rows: Vec<GradeRow>,
    pub notice: Option<String>,
    pub total_ects: f64,
    pub average_grade: f64,
    pub passed_courses: usize,
}

pub const TABLE: TableSpec = TableSpec {
    name: "grades",
    selectors: &[
        "table#gvIndeks",
        "table[id$='gvIndeks']",
        "table.indeks",
        "table[id*='ndeks']",
    ],
    min_columns: 5,
    empty_labels: &["span[id$='lblNemaOcjena']"],
};

pub fn parse(html: &str) -> Extracted<GradeRow> {
    extract_table(html, &TABLE, |row| {
        let course = row.text(0);
        if course.is_empty() {
            return None;
        }
        Some(GradeRow {
            course,
            professor: row.text(1),
            attempts: row.text(2),
            final_grade: row.text(3),
            ects: row.text(4),
        })
    })
}

/// Sum ECTS and average the grade over passed rows; 0.0 when none passed.
pub fn summarize(extracted: Extracted<GradeRow>) -> GradeSummary {
    let passed: Vec<(u8, f64)> = extracted
        .records
        .iter()
        .filter_map(|r| r.passing_grade().map(|g| (g, number_or_zero(&r.ects))))
        .collect();

    let total_ects = passed.iter().map(|(_, ects)| ects).sum();
    let average_grade = if passed.is_empty() {
        0.0
    } else {
        passed.iter().map(|(g, _)| f64::from(*g)).sum::<f64>() / passed.len() as f64
    };

    GradeSummary {
        passed_courses: passed.len(),
        rows: extracted.records,
        notice: extracted.notice,
        total_ects,
        average_grade,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str = r#"
        <table id="ctl00_ContentPlaceHolder1_gvIndeks">
          <tr><th>Predmet</th><th>Nastavnik</th><th>Izlazaka</th><th>Ocjena</th><th>ECTS</th></tr>
          <tr><td>Matematika 1</td><td>Ivo Ivić</td><td>1</td><td>izvrstan (5)</td><td>7</td></tr>
          <tr><td>Fizika</td><td>Marko Marić</td><td>2</td><td>dobar (3)</td><td>5,5</td></tr>
          <tr><td>Kemija</td><td>Iva Ivić</td><td>3</td><td>nedovoljan (1)</td><td>6</td></tr>
          <tr><td>Engleski</td><td>Ana Anić</td><td>0</td><td></td><td>abc</td></tr>
        </table>
    "#;

    #[test]
    fn test_parse_and_summarize() {
        let extracted = parse(TRANSCRIPT);
        assert_eq!(extracted.len(), 4);

        let summary = summarize(extracted);
        assert_eq!(summary.passed_courses, 2);
        assert!((summary.total_ects - 12.5).abs() < 1e-9);
        assert!((summary.average_grade - 4.0).abs() < 1e-9);
        assert_eq!(summary.rows[2].final_grade, "nedovoljan (1)");
    }

    #[test]
    fn test_no_passed_courses() {
        let summary = summarize(parse("<table></table>"));
        assert!(summary.rows.is_empty());
        assert_eq!(summary.total_ects, 0.0);
        assert_eq!(summary.average_grade, 0.0);
    }

    #[test]
    fn test_unparseable_ects_counts_as_zero() {
        let row = GradeRow {
            course: "X".into(),
            professor: String::new(),
            attempts: String::new(),
            final_grade: "4".into(),
            ects: "n/a".into(),
        };
        let summary = summarize(Extracted::new(vec![row]));
        assert_eq!(summary.total_ects, 0.0);
        assert_eq!(summary.average_grade, 4.0);
    }
}

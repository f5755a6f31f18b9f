//! Tuition payments (`Placanja.aspx`).

use serde::{Deserialize, Serialize};

use super::{extract_table, number_or_zero, Extracted, TableSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub date: String,
    pub name: String,
    pub payment: String,
    pub debt: String,
    pub balance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub transactions: Vec<PaymentTransaction>,
    pub notice: Option<String>,
    pub total_paid: f64,
    pub total_debt: f64,
}

pub const TABLE: TableSpec = TableSpec {
    name: "payments",
    selectors: &[
        "table#gvPlacanja",
        "table[id$='gvPlacanja']",
        "table.placanja",
        "table[id*='lacanj']",
    ],
    min_columns: 5,
    empty_labels: &["span[id$='lblNemaPlacanja']"],
};

pub fn parse(html: &str) -> Extracted<PaymentTransaction> {
    extract_table(html, &TABLE, |row| {
        let date = row.text(0);
        let name = row.text(1);
        // footer rows carry only the totals
        if date.is_empty() && name.is_empty() {
            return None;
        }
        Some(PaymentTransaction {
            date,
            name,
            payment: row.text(2),
            debt: row.text(3),
            balance: row.text(4),
        })
    })
}

pub fn summarize(extracted: Extracted<PaymentTransaction>) -> PaymentSummary {
    let total_paid = extracted
        .records
        .iter()
        .map(|t| number_or_zero(&t.payment))
        .sum();
    let total_debt = extracted
        .records
        .iter()
        .map(|t| number_or_zero(&t.debt))
        .sum();

    PaymentSummary {
        transactions: extracted.records,
        notice: extracted.notice,
        total_paid,
        total_debt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_total() {
        let html = r#"
            <table id="ctl00_ContentPlaceHolder1_gvPlacanja">
              <tr><th>Datum</th><th>Opis</th><th>Uplata</th><th>Dug</th><th>Saldo</th></tr>
              <tr><td>01.10.2024.</td><td>Školarina 1. rata</td><td></td><td>1.327,23</td><td>-1.327,23</td></tr>
              <tr><td>15.10.2024.</td><td>Uplata</td><td>1.000,00</td><td></td><td>-327,23</td></tr>
              <tr><td></td><td></td><td>1.000,00</td><td>1.327,23</td><td>-327,23</td></tr>
            </table>
        "#;
        let summary = summarize(parse(html));
        assert_eq!(summary.transactions.len(), 2);
        assert_eq!(summary.transactions[0].name, "Školarina 1. rata");
        assert!((summary.total_paid - 1000.0).abs() < 1e-9);
        assert!((summary.total_debt - 1327.23).abs() < 1e-9);
    }

    #[test]
    fn test_no_payments_notice() {
        let html = r#"<span id="ctl00_ContentPlaceHolder1_lblNemaPlacanja">Nema evidentiranih plaćanja.</span>"#;
        let summary = summarize(parse(html));
        assert!(summary.transactions.is_empty());
        assert!(summary.notice.is_some());
        assert_eq!(summary.total_paid, 0.0);
    }
}

//! Transforms that normalize raw scraped review rows.

use crate::error::EtlError;
use crate::table::{Table, str_cell};
use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::OnceLock;

/// Splits the `helpfulness` column (`"N out of M found this helpful"`) into
/// integer `upvotes` and `total_votes`, tolerating comma thousands
/// separators, then removes the source column. Malformed non-null values are
/// a structural error.
pub fn split_helpfulness_col(table: Table) -> Result<Table, EtlError> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let digits = DIGITS.get_or_init(|| Regex::new(r"\d+").expect("Invalid regex"));

    table.require_column("helpfulness")?;

    let mut out = Table::new();
    for mut row in table.into_rows() {
        let raw = str_cell(&row, "helpfulness").map(|s| s.replace(',', ""));
        let (upvotes, total) = match raw.as_deref() {
            None => (Value::Null, Value::Null),
            Some(cleaned) => {
                let mut numbers = digits
                    .find_iter(cleaned)
                    .filter_map(|m| m.as_str().parse::<i64>().ok());
                match (numbers.next(), numbers.next()) {
                    (Some(up), Some(total)) => (json!(up), json!(total)),
                    _ => {
                        return Err(EtlError::invalid_field("helpfulness", cleaned));
                    }
                }
            }
        };
        row.remove("helpfulness");
        row.insert("upvotes".to_string(), upvotes);
        row.insert("total_votes".to_string(), total);
        out.push(row);
    }
    Ok(out)
}

/// Canonicalizes review author identifiers down to the stable
/// `/user/urXXXXXX` prefix by cutting the href at its query string.
pub fn correct_review_author(table: Table) -> Result<Table, EtlError> {
    table.require_column("author")?;

    let mut out = Table::new();
    for mut row in table.into_rows() {
        if let Some(raw) = str_cell(&row, "author") {
            let prefix = raw.split('?').next().unwrap_or("").to_string();
            row.insert("author".to_string(), json!(prefix));
        }
        out.push(row);
    }
    Ok(out)
}

/// Cuts each review title at its first newline.
pub fn cut_off_review_title_newline(table: Table) -> Result<Table, EtlError> {
    table.require_column("title")?;

    let mut out = Table::new();
    for mut row in table.into_rows() {
        if let Some(raw) = str_cell(&row, "title") {
            let cut = raw.split('\n').next().unwrap_or("").to_string();
            row.insert("title".to_string(), json!(cut));
        }
        out.push(row);
    }
    Ok(out)
}

/// Converts the free-form `date` column into an ISO `review_date` column and
/// removes `date`. Unlike release dates, an unparsable review date raises:
/// the review page date markup is stable and a failure here means the source
/// changed shape.
pub fn convert_to_date(table: Table) -> Result<Table, EtlError> {
    table.require_column("date")?;

    let mut out = Table::new();
    for mut row in table.into_rows() {
        let review_date = match str_cell(&row, "date").map(str::trim) {
            None | Some("") => Value::Null,
            Some(raw) => {
                let parsed = NaiveDate::parse_from_str(raw, "%d %B %Y")
                    .or_else(|_| NaiveDate::parse_from_str(raw, "%B %d, %Y"))
                    .map_err(|_| EtlError::invalid_field("date", raw))?;
                json!(parsed.to_string())
            }
        };
        row.remove("date");
        row.insert("review_date".to_string(), review_date);
        out.push(row);
    }
    Ok(out)
}

//! Transforms that normalize raw scraped title metadata into typed columns.
//!
//! Every transform here is a pure `Table -> Table` function that fails fast
//! when its required source column is absent. Sub-field parsing is lenient
//! only for dates, runtime and the positional blobs: page markup variability
//! is expected there and a missing value is tolerable.

use crate::error::EtlError;
use crate::etl::numeric::expand_short_form;
use crate::etl::text::{split_with_capital_letter, substrings_after_anchors};
use crate::table::{Record, Table, str_cell};
use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::OnceLock;

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

/// Splits `agg_rating` (`"8.9/1099M"` shaped) into `rating` and
/// `total_votes`. Rows whose value lacks the literal `/10` anchor, null rows
/// included, are dropped entirely: downstream rating-based ranking assumes
/// every surviving row has a real rating, so drop-vs-null matters here.
pub fn split_aggregate_rating_col(table: Table) -> Result<Table, EtlError> {
    table.require_column("agg_rating")?;

    let mut out = Table::new();
    for mut row in table.into_rows() {
        let Some(raw) = str_cell(&row, "agg_rating").map(str::to_owned) else {
            continue;
        };
        // "/10" is a literal anchor, not a division: "8.9/1099M" splits
        // into "8.9" and "99M".
        let Some((rating_part, votes_part)) = raw.split_once("/10") else {
            continue;
        };

        let rating: f64 = rating_part
            .trim()
            .parse()
            .map_err(|_| EtlError::invalid_field("agg_rating", &raw))?;
        let votes = expand_short_form(Some(votes_part))?;

        row.remove("agg_rating");
        row.insert("rating".to_string(), json!(rating));
        row.insert("total_votes".to_string(), opt_num(votes));
        out.push(row);
    }
    Ok(out)
}

/// Splits `review_summary` (an object of three label-glued counts, e.g.
/// `"7.7KUser reviews"`) into `user_reviews_num`, `critic_reviews_num` and
/// `metascore`. The label text is used purely as a split delimiter; that is
/// brittle against upstream label changes and accepted as such.
pub fn split_review_summary(table: Table) -> Result<Table, EtlError> {
    static LABELS: OnceLock<Regex> = OnceLock::new();
    let labels = get_regex(&LABELS, "User reviews|Critic reviews|Metascore");

    table.require_column("review_summary")?;

    let source_keys = ["user_review_num", "critic_review_num", "metascore"];
    let target_cols = ["user_reviews_num", "critic_reviews_num", "metascore"];

    let mut out = Table::new();
    for mut row in table.into_rows() {
        let summary = parse_object_cell(&row, "review_summary")?;
        row.remove("review_summary");

        for (source, target) in source_keys.iter().zip(target_cols) {
            let count = summary
                .as_ref()
                .and_then(|obj| obj.get(*source))
                .and_then(Value::as_str)
                .map(|v| labels.split(v).next().unwrap_or(""));
            row.insert(target.to_string(), opt_num(expand_short_form(count)?));
        }
        out.push(row);
    }
    Ok(out)
}

/// Strips the `Original title: ` prefix; values without it become null.
pub fn extract_original_title(table: Table) -> Result<Table, EtlError> {
    table.require_column("original_title")?;
    Ok(map_column(table, "original_title", |raw| {
        raw.split_once("Original title: ")
            .map_or(Value::Null, |(_, title)| json!(title))
    }))
}

/// Keeps only the text after the `Taglines` label.
pub fn extract_tagline(table: Table) -> Result<Table, EtlError> {
    table.require_column("tagline")?;
    Ok(map_column(table, "tagline", |raw| {
        raw.split_once("Taglines")
            .map_or(Value::Null, |(_, tagline)| json!(tagline))
    }))
}

/// The Details section labels, in page order. Singular/plural label pairs
/// both appear because the page uses whichever matches the cardinality.
const DETAILS_ANCHORS: [&str; 12] = [
    "Release date",
    "Country of origin",
    "Countries of origin",
    "Official sites",
    "Official site",
    "Languages",
    "Language",
    "Also known as",
    "Filming locations",
    "Production companies",
    "Production company",
    "See more",
];

/// Extracts `release_date`, `country_of_origin` and `production_company`
/// from the concatenated `details` blob, then removes it. The blob is cut
/// into label-keyed sections first; the remaining labels are consumed only
/// as boundaries.
///
/// Dates are coerced to null on parse failure instead of raising: they are
/// less load-bearing downstream than ratings, and source markup varies.
pub fn extract_movie_details(table: Table) -> Result<Table, EtlError> {
    table.require_column("details")?;

    let mut out = Table::new();
    for mut row in table.into_rows() {
        let details = str_cell(&row, "details").map(str::to_owned);
        row.remove("details");

        let sections = details
            .as_deref()
            .map(|blob| substrings_after_anchors(blob, &DETAILS_ANCHORS))
            .unwrap_or_default();
        let section = |anchor: &str| sections.get(anchor).and_then(|s| s.clone());

        row.insert(
            "release_date".to_string(),
            parse_release_date(section("Release date").as_deref()),
        );
        row.insert(
            "country_of_origin".to_string(),
            json!(split_with_capital_letter(
                section("Countries of origin")
                    .or_else(|| section("Country of origin"))
                    .as_deref()
            )),
        );
        row.insert(
            "production_company".to_string(),
            json!(split_with_capital_letter(
                section("Production companies")
                    .or_else(|| section("Production company"))
                    .as_deref()
            )),
        );
        out.push(row);
    }
    Ok(out)
}

/// Truncates the captured date text to its first three space-separated
/// tokens (month, day-with-comma, year) and parses `Month DD, YYYY`.
fn parse_release_date(raw: Option<&str>) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    let mut tokens = raw.split(' ').filter(|t| !t.is_empty());
    let (Some(month), Some(day), Some(year)) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Value::Null;
    };
    let candidate = format!("{month} {day} {year}");
    NaiveDate::parse_from_str(&candidate, "%B %d, %Y")
        .map_or(Value::Null, |date| json!(date.to_string()))
}

/// Extracts `budget` and `boxoffice` from the boxoffice blob by fixed
/// positional index over a label-alternation split, mapping the `IMDbPro`
/// placeholder to null. Brittle to label-set changes by construction; the
/// output tables depend on these exact positions.
pub fn extract_boxoffice(table: Table) -> Result<Table, EtlError> {
    static SEP: OnceLock<Regex> = OnceLock::new();
    let sep = get_regex(&SEP, "Budget| |Gross worldwide|See detailed");

    table.require_column("boxoffice")?;

    let mut out = Table::new();
    for mut row in table.into_rows() {
        let raw = str_cell(&row, "boxoffice").map(str::to_owned);
        let (budget, gross) = raw.as_deref().map_or((Value::Null, Value::Null), |blob| {
            let parts: Vec<&str> = sep.split(blob).collect();
            (positional(&parts, 1), positional(&parts, 12))
        });

        row.insert("budget".to_string(), budget);
        row.insert("boxoffice".to_string(), gross);
        out.push(row);
    }
    Ok(out)
}

fn positional(parts: &[&str], index: usize) -> Value {
    match parts.get(index) {
        None | Some(&"IMDbPro") => Value::Null,
        Some(part) => json!(part),
    }
}

/// Converts the `techspecs` runtime blob into integer minutes
/// (`runtime_min`), coercing empty captures to 0 and any parse failure to
/// null. Removes `techspecs`.
pub fn extract_runtime(table: Table) -> Result<Table, EtlError> {
    static SEP: OnceLock<Regex> = OnceLock::new();
    let sep = get_regex(&SEP, "Runtime| |Sound|Color");

    table.require_column("techspecs")?;

    let mut out = Table::new();
    for mut row in table.into_rows() {
        let runtime = str_cell(&row, "techspecs").map_or(Value::Null, |blob| {
            let parts: Vec<&str> = sep.split(blob).collect();
            let hours = runtime_part(&parts, 1);
            let minutes = runtime_part(&parts, 3);
            match (hours, minutes) {
                (Some(h), Some(m)) => json!(h * 60 + m),
                _ => Value::Null,
            }
        });
        row.remove("techspecs");
        row.insert("runtime_min".to_string(), runtime);
        out.push(row);
    }
    Ok(out)
}

fn runtime_part(parts: &[&str], index: usize) -> Option<i64> {
    let part = parts.get(index)?;
    let part = if part.is_empty() { "0" } else { part };
    part.parse().ok()
}

fn opt_num(value: Option<f64>) -> Value {
    value.map_or(Value::Null, |v| json!(v))
}

/// Reads a cell that holds either a JSON object or an object serialized as a
/// string (the raw files carry both shapes). Null reads as absent; any other
/// malformed value is a structural error.
fn parse_object_cell(
    row: &Record,
    name: &'static str,
) -> Result<Option<serde_json::Map<String, Value>>, EtlError> {
    match row.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(obj)) => Ok(Some(obj.clone())),
        Some(Value::String(s)) => serde_json::from_str::<serde_json::Map<String, Value>>(s)
            .map(Some)
            .map_err(|_| EtlError::invalid_field(name, s.clone())),
        Some(other) => Err(EtlError::invalid_field(name, other.to_string())),
    }
}

fn map_column(table: Table, name: &str, f: impl Fn(&str) -> Value) -> Table {
    table
        .into_rows()
        .into_iter()
        .map(|mut row| {
            let mapped = str_cell(&row, name).map_or(Value::Null, &f);
            row.insert(name.to_string(), mapped);
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(col: &str, values: &[Value]) -> Table {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut row = Record::new();
                row.insert("title_id".to_string(), json!(i + 1));
                row.insert(col.to_string(), v.clone());
                row
            })
            .collect()
    }

    #[test]
    fn test_split_aggregate_rating_glued_votes() {
        let table = table_with("agg_rating", &[json!("8.9/1099M")]);
        let out = split_aggregate_rating_col(table).unwrap();

        let row = &out.rows()[0];
        assert!(!row.contains_key("agg_rating"));
        assert!((row["rating"].as_f64().unwrap() - 8.9).abs() < 1e-4);
        assert!((row["total_votes"].as_f64().unwrap() - 99_000_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_split_aggregate_rating_drops_rows_without_anchor() {
        let table = table_with(
            "agg_rating",
            &[json!("8.9/1099M"), json!(null), json!("no rating here")],
        );
        let out = split_aggregate_rating_col(table).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_split_aggregate_rating_requires_column() {
        let table = table_with("other", &[json!("x")]);
        let err = split_aggregate_rating_col(table).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn(col) if col == "agg_rating"));
    }

    #[test]
    fn test_split_review_summary() {
        let summary = json!({
            "user_review_num": "7.7KUser reviews",
            "critic_review_num": "432Critic reviews",
            "metascore": "84Metascore"
        });
        let table = table_with("review_summary", &[summary]);
        let out = split_review_summary(table).unwrap();

        let row = &out.rows()[0];
        assert!(!row.contains_key("review_summary"));
        assert!((row["user_reviews_num"].as_f64().unwrap() - 7_700.0).abs() < f64::EPSILON);
        assert!((row["critic_reviews_num"].as_f64().unwrap() - 432.0).abs() < f64::EPSILON);
        assert!((row["metascore"].as_f64().unwrap() - 84.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_split_review_summary_accepts_serialized_object() {
        let summary = json!(
            "{\"user_review_num\":\"1.2KUser reviews\",\
              \"critic_review_num\":\"12Critic reviews\",\
              \"metascore\":\"70Metascore\"}"
        );
        let table = table_with("review_summary", &[summary]);
        let out = split_review_summary(table).unwrap();
        assert!((out.rows()[0]["user_reviews_num"].as_f64().unwrap() - 1_200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_split_review_summary_null_row_yields_nulls() {
        let table = table_with("review_summary", &[json!(null)]);
        let out = split_review_summary(table).unwrap();
        assert!(out.rows()[0]["metascore"].is_null());
    }

    #[test]
    fn test_extract_movie_details() {
        let details = json!(
            "Release dateJuly 18, 2008 (United States)Countries of origin\
             United StatesUnited KingdomOfficial sitesOfficial Facebook\
             Production companiesWarner Bros.SyncopySee more"
        );
        let table = table_with("details", &[details]);
        let out = extract_movie_details(table).unwrap();

        let row = &out.rows()[0];
        assert!(!row.contains_key("details"));
        assert_eq!(row["release_date"], json!("2008-07-18"));
        assert_eq!(
            row["country_of_origin"],
            json!(["United States", "United Kingdom"])
        );
        assert_eq!(row["production_company"], json!(["Warner Bros.", "Syncopy"]));
    }

    #[test]
    fn test_extract_movie_details_unparsable_date_is_null() {
        let details = json!("Release datesometime soonCountries of originFranceOfficial site");
        let table = table_with("details", &[details]);
        let out = extract_movie_details(table).unwrap();
        assert!(out.rows()[0]["release_date"].is_null());
    }

    #[test]
    fn test_extract_boxoffice_positional_split() {
        let blob = json!(
            "Budget$185,000,000 (estimated)Gross US & Canada$534,987,076\
             Opening weekend US & Canada$158,074,286Jul 20, 2008\
             Gross worldwide$1,005,973,645See detailed box office info on IMDbPro"
        );
        let table = table_with("boxoffice", &[blob]);
        let out = extract_boxoffice(table).unwrap();

        let row = &out.rows()[0];
        assert_eq!(row["budget"], json!("$185,000,000"));
        assert_eq!(row["boxoffice"], json!("$1,005,973,645"));
    }

    #[test]
    fn test_extract_boxoffice_placeholder_becomes_null() {
        let table = table_with("boxoffice", &[json!("nothing useful"), json!(null)]);
        let out = extract_boxoffice(table).unwrap();
        assert!(out.rows()[0]["budget"].is_null());
        assert!(out.rows()[0]["boxoffice"].is_null());
        assert!(out.rows()[1]["budget"].is_null());
    }

    #[test]
    fn test_extract_runtime() {
        let table = table_with(
            "techspecs",
            &[json!("Runtime2 hours 32 minutesSound mixDolby DigitalColorColor")],
        );
        let out = extract_runtime(table).unwrap();

        let row = &out.rows()[0];
        assert!(!row.contains_key("techspecs"));
        assert_eq!(row["runtime_min"], json!(152));
    }

    #[test]
    fn test_extract_runtime_failure_is_null() {
        let table = table_with("techspecs", &[json!("no runtime at all"), json!(null)]);
        let out = extract_runtime(table).unwrap();
        assert!(out.rows()[0]["runtime_min"].is_null());
        assert!(out.rows()[1]["runtime_min"].is_null());
    }

    #[test]
    fn test_extract_original_title() {
        let table = table_with(
            "original_title",
            &[json!("Original title: Le fabuleux destin"), json!("Amelie")],
        );
        let out = extract_original_title(table).unwrap();
        assert_eq!(out.rows()[0]["original_title"], json!("Le fabuleux destin"));
        assert!(out.rows()[1]["original_title"].is_null());
    }
}

//! Row fan-out: converts a row's multi-valued fields into child-table rows.
//!
//! Every child row carries the owning `title_id` and a 1-based `order_num`
//! rank. Actor and recommendation ranks come from the reference-path suffix
//! (`..._1`, `..._2`); country and company ranks are the element position.
//! Child tables are append-only; they are never updated in place.

use crate::error::EtlError;
use crate::table::{Record, Table};
use serde_json::{Value, json};

const NORMALIZE_COLS: [&str; 4] = [
    "imdb_recommendations",
    "actors",
    "country_of_origin",
    "production_company",
];

/// Result of normalizing one metadata batch: the main table with the
/// multi-valued columns removed, plus one child table per collection field.
#[derive(Debug)]
pub struct NormalizedTables {
    pub main: Table,
    pub recommendations: Table,
    pub actors: Table,
    pub countries: Table,
    pub companies: Table,
}

/// Fans the four multi-valued columns out into child tables. All four source
/// columns are required; a missing one is a structural error naming the full
/// set. Running this on already-normalized output therefore raises instead
/// of silently no-op'ing.
pub fn normalize(table: Table) -> Result<NormalizedTables, EtlError> {
    if NORMALIZE_COLS.iter().any(|col| !table.has_column(col)) {
        return Err(EtlError::MissingColumns(
            NORMALIZE_COLS.iter().map(ToString::to_string).collect(),
        ));
    }

    let mut main = Table::new();
    let mut recommendations = Table::new();
    let mut actors = Table::new();
    let mut countries = Table::new();
    let mut companies = Table::new();

    for mut row in table.into_rows() {
        let title_id = row.get("title_id").cloned().unwrap_or(Value::Null);

        for rec in parse_recommendations(&row, &title_id)? {
            recommendations.push(rec);
        }
        for rec in parse_actors(&row, &title_id)? {
            actors.push(rec);
        }
        for rec in parse_ranked_list(&row, &title_id, "country_of_origin", "country")? {
            countries.push(rec);
        }
        for rec in parse_ranked_list(&row, &title_id, "production_company", "company")? {
            companies.push(rec);
        }

        for col in NORMALIZE_COLS {
            row.remove(col);
        }
        main.push(row);
    }

    Ok(NormalizedTables {
        main,
        recommendations,
        actors,
        countries,
        companies,
    })
}

/// Emits `(title_id, actor_id, actor_name, order_num)` rows from the
/// name-to-href `actors` map. The actor id is the href with its query
/// parameters stripped, renormalized to always end in `/`.
pub fn parse_actors(row: &Record, title_id: &Value) -> Result<Vec<Record>, EtlError> {
    let Some(map) = object_cell(row, "actors")? else {
        return Ok(Vec::new());
    };

    let mut records = Vec::with_capacity(map.len());
    for (name, href) in &map {
        let href = href
            .as_str()
            .ok_or_else(|| EtlError::invalid_field("actors", href.to_string()))?;
        let mut record = Record::new();
        record.insert("title_id".to_string(), title_id.clone());
        record.insert("actor_id".to_string(), json!(ref_id(href, true)));
        record.insert("actor_name".to_string(), json!(name));
        record.insert("order_num".to_string(), json!(ref_order("actors", href)?));
        records.push(record);
    }
    Ok(records)
}

/// Emits `(title_id, suggested_title_id, order_num)` rows from the
/// recommendation href list. Title ids keep their source shape, so no
/// trailing-slash renormalization here.
pub fn parse_recommendations(row: &Record, title_id: &Value) -> Result<Vec<Record>, EtlError> {
    let Some(refs) = array_cell(row, "imdb_recommendations")? else {
        return Ok(Vec::new());
    };

    let mut records = Vec::with_capacity(refs.len());
    for href in &refs {
        let href = href
            .as_str()
            .ok_or_else(|| EtlError::invalid_field("imdb_recommendations", href.to_string()))?;
        let mut record = Record::new();
        record.insert("title_id".to_string(), title_id.clone());
        record.insert("suggested_title_id".to_string(), json!(ref_id(href, false)));
        record.insert(
            "order_num".to_string(),
            json!(ref_order("imdb_recommendations", href)?),
        );
        records.push(record);
    }
    Ok(records)
}

/// Emits one child row per list element with its 1-based position as rank.
fn parse_ranked_list(
    row: &Record,
    title_id: &Value,
    source_col: &'static str,
    value_col: &str,
) -> Result<Vec<Record>, EtlError> {
    let Some(values) = array_cell(row, source_col)? else {
        return Ok(Vec::new());
    };

    let mut records = Vec::with_capacity(values.len());
    for (num, value) in values.iter().enumerate() {
        let mut record = Record::new();
        record.insert("title_id".to_string(), title_id.clone());
        record.insert(value_col.to_string(), value.clone());
        record.insert("order_num".to_string(), json!(num + 1));
        records.push(record);
    }
    Ok(records)
}

/// Strips the query string off a reference path. Actor paths additionally
/// get a trailing slash; recommendation paths do not, matching the two
/// source id formats.
fn ref_id(href: &str, trailing_slash: bool) -> String {
    let mut id = href.split('?').next().unwrap_or("").to_string();
    if trailing_slash && !id.ends_with('/') {
        id.push('/');
    }
    id
}

/// Rank is the integer suffix after the last `_` of the reference path.
fn ref_order(field: &'static str, href: &str) -> Result<i64, EtlError> {
    href.rsplit('_')
        .next()
        .and_then(|suffix| suffix.parse().ok())
        .ok_or_else(|| EtlError::invalid_field(field, href))
}

fn object_cell(
    row: &Record,
    name: &'static str,
) -> Result<Option<serde_json::Map<String, Value>>, EtlError> {
    match row.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(obj)) => Ok(Some(obj.clone())),
        Some(Value::String(s)) => serde_json::from_str(s)
            .map(Some)
            .map_err(|_| EtlError::invalid_field(name, s.clone())),
        Some(other) => Err(EtlError::invalid_field(name, other.to_string())),
    }
}

fn array_cell(row: &Record, name: &'static str) -> Result<Option<Vec<Value>>, EtlError> {
    match row.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(values)) => Ok(Some(values.clone())),
        Some(Value::String(s)) => serde_json::from_str(s)
            .map(Some)
            .map_err(|_| EtlError::invalid_field(name, s.clone())),
        Some(other) => Err(EtlError::invalid_field(name, other.to_string())),
    }
}

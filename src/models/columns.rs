//! Typed reads of text columns
//!
//! Dates and JSON are stored as TEXT. Conversion failures report the index
//! of the column they came from.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn format_datetime(at: NaiveDateTime) -> String {
    at.format(DATETIME_FORMAT).to_string()
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn text(row: &Row, column: &str) -> rusqlite::Result<(usize, Option<String>)> {
    let idx = row.as_ref().column_index(column)?;
    Ok((idx, row.get(idx)?))
}

fn required(idx: usize, column: &str, raw: Option<String>) -> rusqlite::Result<String> {
    raw.ok_or_else(|| rusqlite::Error::InvalidColumnType(idx, column.to_string(), Type::Null))
}

pub(crate) fn date_column(row: &Row, column: &str) -> rusqlite::Result<NaiveDate> {
    let (idx, raw) = text(row, column)?;
    let raw = required(idx, column, raw)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn optional_date_column(row: &Row, column: &str) -> rusqlite::Result<Option<NaiveDate>> {
    let (idx, raw) = text(row, column)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn datetime_column(row: &Row, column: &str) -> rusqlite::Result<NaiveDateTime> {
    let (idx, raw) = text(row, column)?;
    let raw = required(idx, column, raw)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn json_column<T: DeserializeOwned>(row: &Row, column: &str) -> rusqlite::Result<T> {
    let (idx, raw) = text(row, column)?;
    let raw = required(idx, column, raw)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

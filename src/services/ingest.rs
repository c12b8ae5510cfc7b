// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Validation of untrusted tabular stop input.
//!
//! A batch is accepted or rejected as a whole: one bad coordinate rejects
//! every row.

use crate::error::ValidationError;
use crate::models::Stop;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Read;

const LATITUDE_COLUMNS: &[&str] = &["lat", "latitude", "географическая широта"];
const LONGITUDE_COLUMNS: &[&str] = &[
    "lng",
    "lon",
    "long",
    "longitude",
    "географическая долгота",
];
const LABEL_COLUMNS: &[&str] = &["name", "label", "title", "address", "адрес объекта"];
const PRIORITY_COLUMNS: &[&str] = &["vip", "priority", "is_priority", "уровень клиента"];
const PRIORITY_VALUES: &[&str] = &["1", "true", "yes", "y", "vip"];

/// Raw rows as read from a CSV file, header first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from keyed rows. The header set is taken from the first row.
    pub fn from_records(records: &[BTreeMap<String, String>]) -> Self {
        let Some(first) = records.first() else {
            return Self::default();
        };
        let headers: Vec<String> = first.keys().cloned().collect();
        let rows = records
            .iter()
            .map(|r| {
                headers
                    .iter()
                    .map(|h| r.get(h).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { headers, rows }
    }

    /// Read a comma-separated table. Rows may be shorter than the header.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, ValidationError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| ValidationError::Unreadable(e.to_string()))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect::<Vec<_>>();

        // Blank lines are skipped by the reader; rows of empty cells are kept
        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(|e| ValidationError::Unreadable(e.to_string()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    fn column(&self, aliases: &[&str]) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| aliases.contains(&h.trim().to_lowercase().as_str()))
    }
}

/// Validate a table and turn every row into a stop, preserving order.
pub fn ingest(table: &RawTable) -> Result<Vec<Stop>, ValidationError> {
    if table.rows.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    let lat_col = table
        .column(LATITUDE_COLUMNS)
        .ok_or(ValidationError::MissingColumn("lat"))?;
    let lng_col = table
        .column(LONGITUDE_COLUMNS)
        .ok_or(ValidationError::MissingColumn("lng"))?;
    let label_col = table.column(LABEL_COLUMNS);
    let priority_col = table.column(PRIORITY_COLUMNS);

    let mut stops = Vec::with_capacity(table.rows.len());
    for (index, row) in table.rows.iter().enumerate() {
        // Rows are numbered from 1 and the header occupies row 1
        let row_number = index + 2;
        let latitude = parse_coordinate(cell(row, lat_col))
            .ok_or(ValidationError::InvalidCoordinates { row: row_number })?;
        let longitude = parse_coordinate(cell(row, lng_col))
            .ok_or(ValidationError::InvalidCoordinates { row: row_number })?;

        let label = label_col.map(|c| cell(row, c)).unwrap_or("").to_string();
        let is_priority = priority_col
            .map(|c| is_priority_value(cell(row, c)))
            .unwrap_or(false);

        let mut metadata = Map::new();
        for (col, header) in table.headers.iter().enumerate() {
            if [Some(lat_col), Some(lng_col), label_col, priority_col].contains(&Some(col)) {
                continue;
            }
            metadata.insert(header.clone(), Value::String(cell(row, col).to_string()));
        }

        stops.push(Stop::new(latitude, longitude, label, is_priority).with_metadata(metadata));
    }

    tracing::debug!(count = stops.len(), "Ingested stops");
    Ok(stops)
}

fn cell(row: &[String], col: usize) -> &str {
    row.get(col).map(String::as_str).unwrap_or("")
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

fn is_priority_value(raw: &str) -> bool {
    PRIORITY_VALUES.contains(&raw.trim().to_lowercase().as_str())
}

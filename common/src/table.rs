// Sensor table normalizer
// PRTG csvtable output carries every column twice, once readable and once
// suffixed "(RAW)". Only the readable columns are kept.

use crate::errors::TableError;
use crate::models::Sensor;
use csv::{ReaderBuilder, Trim};
use tracing::{debug, warn};

const RAW_SUFFIX: &str = "(RAW)";

const COLUMN_PROBE: &str = "Probe";
const COLUMN_GROUP: &str = "Group";
const COLUMN_DEVICE: &str = "Device";
const COLUMN_NAME: &str = "Object";
const COLUMN_ID: &str = "ID";
const COLUMN_INTERVAL: &str = "Interval";

/// A CSV table with the raw columns removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SensorTable {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn required_column(&self, name: &str) -> Result<usize, TableError> {
        self.column(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Map rows to sensors using the readable PRTG column names
    pub fn into_sensors(self) -> Result<Vec<Sensor>, TableError> {
        if self.headers.is_empty() {
            return Ok(Vec::new());
        }

        let name_idx = self.required_column(COLUMN_NAME)?;
        let id_idx = self.required_column(COLUMN_ID)?;
        let interval_idx = self.required_column(COLUMN_INTERVAL)?;
        let probe_idx = self.column(COLUMN_PROBE);
        let group_idx = self.column(COLUMN_GROUP);
        let device_idx = self.column(COLUMN_DEVICE);

        let cell = |row: &[String], idx: Option<usize>| -> String {
            idx.and_then(|i| row.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let mut sensors = Vec::with_capacity(self.rows.len());
        for (line, row) in self.rows.iter().enumerate() {
            let id = cell(row, Some(id_idx));
            if id.is_empty() {
                warn!(row = line + 1, "Skipping sensor row without an ID");
                continue;
            }

            sensors.push(Sensor {
                id,
                name: cell(row, Some(name_idx)),
                probe: cell(row, probe_idx),
                group: cell(row, group_idx),
                device: cell(row, device_idx),
                interval: cell(row, Some(interval_idx)),
            });
        }

        Ok(sensors)
    }
}

/// Parse a CSV table and drop every column whose header ends with "(RAW)"
pub fn strip_raw_columns(body: &str) -> Result<SensorTable, TableError> {
    let body = body.trim_start_matches('\u{feff}');

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(body.as_bytes());

    let all_headers = reader.headers()?.clone();
    let keep: Vec<usize> = all_headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.trim_end().ends_with(RAW_SUFFIX))
        .map(|(i, _)| i)
        .collect();

    let headers = keep
        .iter()
        .map(|&i| all_headers[i].to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row = keep
            .iter()
            .map(|&i| record.get(i).unwrap_or_default().to_string())
            .collect();
        rows.push(row);
    }

    debug!(
        columns = headers.len(),
        raw_columns = all_headers.len() - headers.len(),
        rows = rows.len(),
        "Sensor table normalized"
    );

    Ok(SensorTable { headers, rows })
}

/// Normalize a PRTG sensor table and map it to sensors
pub fn parse_sensors(body: &str) -> Result<Vec<Sensor>, TableError> {
    strip_raw_columns(body)?.into_sensors()
}

//! Satellite observations already extracted to CSV.
//!
//! Expected header: `datetime,lat,lon,pollutant,value,unit,product`. `unit` may
//! be empty. A row that does not parse, lacks a product or pollutant, or holds a
//! non-finite number is logged and skipped.

use crate::satellite::decode::parse_timestamp;
use crate::satellite::error::SatelliteError;
use crate::satellite::store::{AsObservationRow, ObservationRow};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvRow {
    datetime: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    pollutant: Option<String>,
    value: f64,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    product: Option<String>,
}

/// One usable CSV row.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvObservation {
    pub product: String,
    pub parameter: String,
    pub unit: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
    pub raw_path: String,
}

impl AsObservationRow for CsvObservation {
    fn as_row(&self) -> ObservationRow<'_> {
        ObservationRow {
            product: &self.product,
            parameter: &self.parameter,
            unit: self.unit.as_deref(),
            latitude: self.latitude,
            longitude: self.longitude,
            value: self.value,
            observed_at: Some(self.observed_at),
            raw_path: Some(&self.raw_path),
        }
    }
}

impl CsvRow {
    fn into_observation(self, raw_path: &str) -> Result<CsvObservation, String> {
        let text = |field: Option<String>| field.filter(|s| !s.is_empty());

        let observed_at = parse_timestamp(&self.datetime)
            .ok_or_else(|| format!("unparseable datetime '{}'", self.datetime))?;
        let product = text(self.product).ok_or("missing product")?;
        let parameter = text(self.pollutant).ok_or("missing pollutant")?;
        if ![self.lat, self.lon, self.value].iter().all(|v| v.is_finite()) {
            return Err("non-finite number".to_string());
        }

        Ok(CsvObservation {
            product,
            parameter,
            unit: text(self.unit),
            latitude: self.lat,
            longitude: self.lon,
            value: self.value,
            observed_at,
            raw_path: raw_path.to_string(),
        })
    }
}

/// Reads every usable row of the CSV at `path`. Blocking; call from `spawn_blocking`.
pub fn read_observations(path: &Path) -> Result<Vec<CsvObservation>, SatelliteError> {
    let raw_path = path.to_string_lossy();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| SatelliteError::Csv(path.to_path_buf(), e))?;

    let mut observations = Vec::new();
    let mut skipped = 0;
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let parsed = row
            .map_err(|e| e.to_string())
            .and_then(|row| row.into_observation(&raw_path));
        match parsed {
            Ok(observation) => observations.push(observation),
            Err(reason) => {
                // Line 1 is the header.
                warn!("Skipping {} line {}: {}", raw_path, index + 2, reason);
                skipped += 1;
            }
        }
    }
    debug!(
        "Read {} observations from {} ({} skipped)",
        observations.len(),
        raw_path,
        skipped
    );
    Ok(observations)
}

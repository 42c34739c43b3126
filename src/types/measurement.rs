//! Measurement records as the OpenAQ feed returns them, and the normalized
//! reading written to the `measurements` table.

use crate::types::parameter::Parameter;
use crate::types::provider::Provider;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One entry of the OpenAQ measurement feed.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MeasurementRecord {
    /// Display name of the reporting location; resolved against `stations.name`.
    pub location: String,
    pub parameter: ParameterField,
    pub value: f64,
    pub unit: Option<String>,
    pub date: MeasurementDate,
}

/// Parameters arrive either as a bare name or as `{"name": ..., "units": ...}`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParameterField {
    Name(String),
    Detailed { name: String, units: Option<String> },
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct MeasurementDate {
    pub utc: DateTime<Utc>,
}

impl MeasurementRecord {
    pub fn parameter_name(&self) -> &str {
        match &self.parameter {
            ParameterField::Name(name) => name,
            ParameterField::Detailed { name, .. } => name,
        }
    }

    /// The unit, taken from the record or from a detailed parameter object.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref().or(match &self.parameter {
            ParameterField::Detailed { units, .. } => units.as_deref(),
            ParameterField::Name(_) => None,
        })
    }

    /// Normalizes the record, or `None` when its parameter is not one the store keeps.
    pub fn normalize(&self, source: Provider) -> Option<NewMeasurement> {
        let parameter = Parameter::from_provider(self.parameter_name())?;
        Some(NewMeasurement {
            observed_at: self.date.utc,
            parameter,
            value: self.value,
            unit: self.unit().map(str::to_string),
            source,
        })
    }
}

/// A reading ready to be upserted on (station, observed_at, parameter).
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub observed_at: DateTime<Utc>,
    pub parameter: Parameter,
    pub value: f64,
    pub unit: Option<String>,
    pub source: Provider,
}

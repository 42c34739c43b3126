//! Defines the monitoring-station records: the shape OpenAQ returns from its
//! location listing, and the row the store keeps for each station.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// --- Provider records ---

/// One entry of the OpenAQ `/locations` listing.
///
/// Every field is optional on the wire; a record is only turned into a station
/// once a display name can be derived from it (see [`NewStation::from_location`]).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    /// The provider-assigned location id, used to query the measurement feed.
    pub id: Option<i64>,
    /// The display name of the location (e.g., "Usaquen").
    pub name: Option<String>,
    /// City or locality the station reports under.
    #[serde(alias = "city")]
    pub locality: Option<String>,
    /// Geographical position of the station, if reported.
    pub coordinates: Option<Coordinates>,
    /// Last-update timestamp as reported by the provider (RFC 3339).
    pub last_updated: Option<String>,
    /// Newer listings report the last measurement time as an object instead.
    pub datetime_last: Option<ProviderTime>,
}

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A provider timestamp object such as `{"utc": "...", "local": "..."}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ProviderTime {
    pub utc: Option<String>,
}

impl LocationRecord {
    /// The raw last-update string, preferring `lastUpdated` over `datetimeLast.utc`.
    pub fn last_seen_raw(&self) -> Option<&str> {
        self.last_updated
            .as_deref()
            .or_else(|| self.datetime_last.as_ref()?.utc.as_deref())
    }

    /// The parsed last-update time; `None` when missing or unparseable.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_seen_raw()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// --- Stored stations ---

/// Whether a station is a physical monitor or a stand-in for provider-level data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationKind {
    Station,
    Virtual,
}

impl StationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationKind::Station => "station",
            StationKind::Virtual => "virtual",
        }
    }
}

impl fmt::Display for StationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A station row about to be inserted into `stations`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStation {
    /// Provider id, or the display name when the provider gave none.
    pub provider_id: String,
    /// Unique display name; the conflict key of the `stations` table.
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub kind: StationKind,
    pub source: String,
}

impl NewStation {
    /// Derives a station row from a listing record.
    ///
    /// The display name falls back from `name` to `locality` to the provider id.
    /// Returns `None` when none of them is present.
    pub fn from_location(record: &LocationRecord, source: &str) -> Option<Self> {
        let name = non_blank(record.name.as_deref())
            .or_else(|| non_blank(record.locality.as_deref()))
            .map(str::to_string)
            .or_else(|| record.id.map(|id| id.to_string()))?;
        let provider_id = record
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| name.clone());

        Some(Self {
            provider_id,
            name,
            latitude: record.coordinates.map(|c| c.latitude),
            longitude: record.coordinates.map(|c| c.longitude),
            kind: StationKind::Station,
            source: source.to_string(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

//! Run configuration, passed explicitly to every stage.
//!
//! [`EtlConfig::from_env`] reads the settings below; anything unset keeps the
//! default of the original Bogotá deployment.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `OPENAQ_API_KEY` | OpenAQ key, sent as `x-api-key` |
//! | `OPENWEATHER_API_KEY` | OpenWeather key, sent as `appid` |
//! | `AQ_DATABASE_URL` | SQLite URL, e.g. `sqlite://aq.sqlite` |
//! | `AQ_CITY`, `AQ_COUNTRY` | Region for the station listing |
//! | `AQ_LATITUDE`, `AQ_LONGITUDE`, `AQ_RADIUS_M` | Fixed coordinate and fallback search radius |
//! | `AQ_HISTORY_DAYS` | Measurement window, days back from now |
//! | `AQ_GRANULES` | Comma-separated `kind@url-or-file-id` granules |
//! | `AQ_GRANULE_BASE_URL`, `AQ_GRANULE_TOKEN` | Archive for file ids and its bearer token |
//! | `AQ_SATELLITE_CSV` | Comma-separated CSV files of pre-extracted satellite observations |
//! | `AQ_CACHE_DIR` | Where granules are cached |
//! | `AQ_QA_THRESHOLD` | Minimum satellite pixel QA value |

use crate::http::RetryPolicy;
use crate::measurements::FeedPolicy;
use crate::satellite::{GranuleSpec, PixelFilter};
use crate::stations::ListingPolicy;
use crate::utils::{default_cache_dir, default_database_url};
use bon::Builder;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// The area the pipeline covers.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct Region {
    #[builder(default = "Bogota".to_string())]
    pub city: String,
    /// ISO 3166-1 alpha-2 country code.
    #[builder(default = "CO".to_string())]
    pub country: String,
    #[builder(default = 4.7110)]
    pub latitude: f64,
    #[builder(default = -74.0721)]
    pub longitude: f64,
    #[builder(default = 50_000)]
    pub radius_m: u32,
}

impl Default for Region {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, Builder)]
pub struct EtlConfig {
    #[builder(default)]
    pub region: Region,
    pub openaq_api_key: Option<String>,
    pub openweather_api_key: Option<String>,
    #[builder(default = default_database_url())]
    pub database_url: String,
    /// How far back measurements are requested.
    #[builder(default = 60)]
    pub history_days: i64,
    /// Stations not updated within this many days are ignored.
    #[builder(default = 60)]
    pub max_station_age_days: i64,
    #[builder(default)]
    pub retry: RetryPolicy,
    #[builder(default)]
    pub listing: ListingPolicy,
    #[builder(default)]
    pub feed: FeedPolicy,
    #[builder(default)]
    pub granules: Vec<GranuleSpec>,
    pub granule_base_url: Option<String>,
    pub granule_token: Option<String>,
    /// CSV files of satellite observations extracted elsewhere.
    #[builder(default)]
    pub satellite_csv: Vec<PathBuf>,
    #[builder(default = default_cache_dir())]
    pub cache_dir: PathBuf,
    #[builder(default)]
    pub pixel_filter: PixelFilter,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl EtlConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let region = Region::builder()
            .maybe_city(get("AQ_CITY"))
            .maybe_country(get("AQ_COUNTRY"))
            .maybe_latitude(parse(&get, "AQ_LATITUDE")?)
            .maybe_longitude(parse(&get, "AQ_LONGITUDE")?)
            .maybe_radius_m(parse(&get, "AQ_RADIUS_M")?)
            .build();

        let pixel_filter = PixelFilter::builder()
            .maybe_qa_threshold(parse(&get, "AQ_QA_THRESHOLD")?)
            .build();

        let granules = match get("AQ_GRANULES") {
            Some(raw) => parse_granules(&raw)?,
            None => Vec::new(),
        };

        Ok(Self::builder()
            .region(region)
            .maybe_openaq_api_key(get("OPENAQ_API_KEY"))
            .maybe_openweather_api_key(get("OPENWEATHER_API_KEY"))
            .maybe_database_url(get("AQ_DATABASE_URL"))
            .maybe_history_days(parse(&get, "AQ_HISTORY_DAYS")?)
            .granules(granules)
            .maybe_granule_base_url(get("AQ_GRANULE_BASE_URL"))
            .maybe_granule_token(get("AQ_GRANULE_TOKEN"))
            .satellite_csv(
                get("AQ_SATELLITE_CSV")
                    .map(|raw| parse_paths(&raw))
                    .unwrap_or_default(),
            )
            .maybe_cache_dir(get("AQ_CACHE_DIR").map(PathBuf::from))
            .pixel_filter(pixel_filter)
            .build())
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    get(key)
        .map(|value| {
            value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_granules(raw: &str) -> Result<Vec<GranuleSpec>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse().map_err(|reason| ConfigError::Invalid {
                key: "AQ_GRANULES",
                value: entry.to_string(),
                reason,
            })
        })
        .collect()
}

fn parse_paths(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::satellite::{GranuleSource, ProductKind};
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_the_defaults() {
        let config = EtlConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.region, Region::default());
        assert_eq!(config.region.city, "Bogota");
        assert_eq!(config.region.radius_m, 50_000);
        assert_eq!(config.history_days, 60);
        assert_eq!(config.openaq_api_key, None);
        assert!(config.granules.is_empty());
        assert!(config.satellite_csv.is_empty());
        assert_eq!(config.pixel_filter.qa_threshold, 0.75);
        assert!(config.database_url.starts_with("sqlite://"));
    }

    #[test]
    fn variables_override_defaults() {
        let config = EtlConfig::from_lookup(lookup(&[
            ("OPENAQ_API_KEY", "aq-key"),
            ("AQ_CITY", "Medellin"),
            ("AQ_LATITUDE", "6.2442"),
            ("AQ_HISTORY_DAYS", "7"),
            ("AQ_DATABASE_URL", "sqlite::memory:"),
            ("AQ_QA_THRESHOLD", "0.5"),
            ("AQ_COUNTRY", "   "),
            ("AQ_SATELLITE_CSV", "tropomi_sample.csv, ,/data/tempo.csv"),
            (
                "AQ_GRANULES",
                "tropomi_no2@https://host/S5P.nc, tempo_cloud@abc123,",
            ),
        ]))
        .unwrap();

        assert_eq!(config.openaq_api_key.as_deref(), Some("aq-key"));
        assert_eq!(config.region.city, "Medellin");
        assert_eq!(config.region.country, "CO");
        assert_eq!(config.region.latitude, 6.2442);
        assert_eq!(config.history_days, 7);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.pixel_filter.qa_threshold, 0.5);
        assert_eq!(
            config.satellite_csv,
            [PathBuf::from("tropomi_sample.csv"), PathBuf::from("/data/tempo.csv")]
        );
        assert_eq!(config.granules.len(), 2);
        assert_eq!(config.granules[1].product, ProductKind::TempoCloud);
        assert_eq!(
            config.granules[1].source,
            GranuleSource::FileId("abc123".to_string())
        );
    }

    #[test]
    fn malformed_numbers_name_the_variable() {
        let err = EtlConfig::from_lookup(lookup(&[("AQ_RADIUS_M", "fifty")])).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::Invalid { key: "AQ_RADIUS_M", ref value, .. } if value == "fifty"
        ));
    }

    #[test]
    fn malformed_granules_are_rejected() {
        let err = EtlConfig::from_lookup(lookup(&[("AQ_GRANULES", "modis@x")])).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "AQ_GRANULES", .. }));
    }
}

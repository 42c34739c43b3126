//! Satellite products the ingester understands, the variable names each one is
//! known to use, and the `kind@source` granule notation used in configuration.

use crate::types::provider::Provider;
use std::fmt;
use std::str::FromStr;

/// How a product marks its usable pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityCheck {
    /// A 0..1 QA value compared against the configured floor. Required.
    QaFloor(&'static [&'static str]),
    /// A quality flag where 0 means good. Pixels are unfiltered when absent.
    ZeroFlag(&'static [&'static str]),
}

/// A gridded satellite product.
///
/// Each kind lists candidate variable paths in order of preference; paths are
/// `group/variable` or a bare root-level variable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductKind {
    TropomiNo2,
    TropomiCo,
    TropomiO3,
    TropomiCloud,
    TempoNo2,
    TempoCloud,
}

const TROPOMI_LATITUDE: &[&str] = &["PRODUCT/latitude", "latitude", "lat"];
const TROPOMI_LONGITUDE: &[&str] = &["PRODUCT/longitude", "longitude", "lon"];
const TROPOMI_QA: &[&str] = &["PRODUCT/qa_value", "qa_value"];
const TEMPO_QUALITY_FLAG: &[&str] = &["product/main_data_quality_flag", "main_data_quality_flag"];
const TEMPO_LATITUDE: &[&str] = &["geolocation/latitude", "latitude", "lat"];
const TEMPO_LONGITUDE: &[&str] = &["geolocation/longitude", "longitude", "lon"];

impl ProductKind {
    pub const ALL: [ProductKind; 6] = [
        ProductKind::TropomiNo2,
        ProductKind::TropomiCo,
        ProductKind::TropomiO3,
        ProductKind::TropomiCloud,
        ProductKind::TempoNo2,
        ProductKind::TempoCloud,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProductKind::TropomiNo2 => "tropomi_no2",
            ProductKind::TropomiCo => "tropomi_co",
            ProductKind::TropomiO3 => "tropomi_o3",
            ProductKind::TropomiCloud => "tropomi_cloud",
            ProductKind::TempoNo2 => "tempo_no2",
            ProductKind::TempoCloud => "tempo_cloud",
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            ProductKind::TropomiNo2
            | ProductKind::TropomiCo
            | ProductKind::TropomiO3
            | ProductKind::TropomiCloud => Provider::Tropomi,
            ProductKind::TempoNo2 | ProductKind::TempoCloud => Provider::Tempo,
        }
    }

    /// The parameter stored in `satellite_observations.parameter`.
    pub fn parameter(&self) -> &'static str {
        match self {
            ProductKind::TropomiNo2 | ProductKind::TempoNo2 => "no2",
            ProductKind::TropomiCo => "co",
            ProductKind::TropomiO3 => "o3",
            ProductKind::TropomiCloud | ProductKind::TempoCloud => "cloud_fraction",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            ProductKind::TropomiNo2 | ProductKind::TropomiCo | ProductKind::TropomiO3 => "mol/m2",
            ProductKind::TempoNo2 => "molecules/cm2",
            ProductKind::TropomiCloud | ProductKind::TempoCloud => "1",
        }
    }

    pub fn latitude_candidates(&self) -> &'static [&'static str] {
        match self.provider() {
            Provider::Tempo => TEMPO_LATITUDE,
            _ => TROPOMI_LATITUDE,
        }
    }

    pub fn longitude_candidates(&self) -> &'static [&'static str] {
        match self.provider() {
            Provider::Tempo => TEMPO_LONGITUDE,
            _ => TROPOMI_LONGITUDE,
        }
    }

    pub fn value_candidates(&self) -> &'static [&'static str] {
        match self {
            ProductKind::TropomiNo2 => &[
                "PRODUCT/nitrogendioxide_tropospheric_column",
                "nitrogendioxide_tropospheric_column",
                "tropospheric_NO2_column_number_density",
            ],
            ProductKind::TropomiCo => &[
                "PRODUCT/carbonmonoxide_total_column",
                "carbonmonoxide_total_column",
                "CO_column_number_density",
            ],
            ProductKind::TropomiO3 => &[
                "PRODUCT/ozone_total_vertical_column",
                "ozone_total_vertical_column",
                "O3_column_number_density",
            ],
            ProductKind::TropomiCloud => &[
                "PRODUCT/cloud_fraction",
                "cloud_fraction",
                "PRODUCT/cloud_fraction_crb",
                "cloud_fraction_crb",
            ],
            ProductKind::TempoNo2 => &[
                "product/vertical_column_troposphere",
                "vertical_column_troposphere",
            ],
            ProductKind::TempoCloud => &[
                "product/eff_cloud_fraction",
                "eff_cloud_fraction",
                "product/cloud_fraction",
                "cloud_fraction",
            ],
        }
    }

    pub fn quality_check(&self) -> QualityCheck {
        match self.provider() {
            Provider::Tempo => QualityCheck::ZeroFlag(TEMPO_QUALITY_FLAG),
            _ => QualityCheck::QaFloor(TROPOMI_QA),
        }
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProductKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ProductKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| format!("unknown product kind '{}'", s.trim()))
    }
}

/// Where a granule is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GranuleSource {
    Url(String),
    /// Opaque identifier resolved against the configured granule base URL.
    FileId(String),
}

impl GranuleSource {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            GranuleSource::Url(raw.to_string())
        } else {
            GranuleSource::FileId(raw.to_string())
        }
    }

    /// File name used for the on-disk cache copy.
    pub fn file_name(&self) -> String {
        let stem = match self {
            GranuleSource::Url(url) => {
                let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
                path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(path)
            }
            GranuleSource::FileId(id) => id.as_str(),
        };
        let safe: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if safe.ends_with(".nc") || safe.ends_with(".nc4") {
            safe
        } else {
            format!("{safe}.nc")
        }
    }
}

/// A configured granule: `tropomi_no2@https://host/path/S5P_granule.nc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GranuleSpec {
    pub product: ProductKind,
    pub source: GranuleSource,
}

impl FromStr for GranuleSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, source) = s
            .split_once('@')
            .ok_or_else(|| format!("expected 'kind@source', got '{}'", s.trim()))?;
        if source.trim().is_empty() {
            return Err(format!("missing granule source in '{}'", s.trim()));
        }
        Ok(GranuleSpec {
            product: kind.parse()?,
            source: GranuleSource::parse(source),
        })
    }
}

//! Turns a gridded granule into point observations.
//!
//! Decoding is written against [`GridSource`] so the pixel filtering does not
//! depend on how the granule is stored; the NetCDF reader lives in
//! [`crate::satellite::netcdf`].

use crate::satellite::error::SatelliteError;
use crate::satellite::product::{ProductKind, QualityCheck};
use bon::Builder;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};

/// Values at or beyond this magnitude are fill values (NetCDF default is ~9.97e36).
const FILL_THRESHOLD: f64 = 1.0e30;

/// Global attributes that carry the granule start time, in order of preference.
const COVERAGE_START_ATTRIBUTES: &[&str] = &["time_coverage_start", "time_coverage_begin"];

/// A variable as stored on disk, with the CF attributes needed to unpack it.
///
/// Fill values and the valid range apply to the stored values, before scaling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedVariable {
    pub values: Vec<f64>,
    pub scale_factor: Option<f64>,
    pub add_offset: Option<f64>,
    /// `_FillValue` and `missing_value`.
    pub fill_values: Vec<f64>,
    pub valid_min: Option<f64>,
    pub valid_max: Option<f64>,
}

impl PackedVariable {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    /// Physical values: `stored * scale_factor + add_offset`, with fill and
    /// out-of-range values replaced by NaN.
    pub fn unpack(self) -> Vec<f64> {
        let PackedVariable {
            values,
            scale_factor,
            add_offset,
            fill_values,
            valid_min,
            valid_max,
        } = self;
        let scale = scale_factor.unwrap_or(1.0);
        let offset = add_offset.unwrap_or(0.0);

        values
            .into_iter()
            .map(|stored| {
                let missing = fill_values.contains(&stored)
                    || valid_min.is_some_and(|min| stored < min)
                    || valid_max.is_some_and(|max| stored > max);
                if missing {
                    f64::NAN
                } else {
                    stored * scale + offset
                }
            })
            .collect()
    }
}

/// Read access to the named variables and global attributes of a granule.
pub trait GridSource {
    /// Flattened stored values of the variable at `path` (`group/name` or
    /// `name`) with its packing attributes, `None` if absent.
    fn read_packed(&self, path: &str) -> Result<Option<PackedVariable>, SatelliteError>;

    /// A text global attribute, `None` if absent or not text.
    fn global_attribute(&self, name: &str) -> Option<String>;

    /// Unpacked values of the variable at `path`.
    fn read_variable(&self, path: &str) -> Result<Option<Vec<f64>>, SatelliteError> {
        Ok(self.read_packed(path)?.map(PackedVariable::unpack))
    }
}

/// Which pixels survive decoding.
#[derive(Debug, Clone, Copy, PartialEq, Builder)]
pub struct PixelFilter {
    /// Pixels with a QA value below this floor are dropped.
    #[builder(default = 0.75)]
    pub qa_threshold: f64,
    /// Inclusive `(min, max)` latitude range.
    pub lat_bounds: Option<(f64, f64)>,
    /// Inclusive `(min, max)` longitude range.
    pub lon_bounds: Option<(f64, f64)>,
}

impl Default for PixelFilter {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PixelFilter {
    fn in_bounds(&self, latitude: f64, longitude: f64) -> bool {
        let within = |bounds: Option<(f64, f64)>, v: f64| match bounds {
            Some((min, max)) => v >= min && v <= max,
            None => true,
        };
        within(self.lat_bounds, latitude) && within(self.lon_bounds, longitude)
    }
}

/// Per-pixel quality values of one granule.
enum Quality {
    Floor(Vec<f64>, f64),
    Flag(Vec<f64>),
}

impl Quality {
    fn len(&self) -> usize {
        match self {
            Quality::Floor(values, _) | Quality::Flag(values) => values.len(),
        }
    }

    // NaN compares false either way, so missing quality drops the pixel.
    fn passes(&self, i: usize) -> bool {
        match self {
            Quality::Floor(qa, floor) => qa[i] >= *floor,
            Quality::Flag(flags) => flags[i] == 0.0,
        }
    }
}

/// One surviving pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteRecord {
    pub product: ProductKind,
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
    /// Granule-level start time; every pixel of a granule shares it.
    pub observed_at: Option<DateTime<Utc>>,
    pub raw_path: Option<String>,
}

impl SatelliteRecord {
    pub fn parameter(&self) -> &'static str {
        self.product.parameter()
    }

    pub fn unit(&self) -> &'static str {
        self.product.unit()
    }
}

/// Decodes every pixel of `source` that passes `filter`.
///
/// A product whose required variables cannot be found under any candidate name
/// yields no records and a warning rather than an error.
pub fn decode_grid(
    source: &impl GridSource,
    product: ProductKind,
    filter: &PixelFilter,
    raw_path: Option<&str>,
) -> Result<Vec<SatelliteRecord>, SatelliteError> {
    let Some(latitude) = resolve(source, product.latitude_candidates())? else {
        return skip_product(product, "latitude");
    };
    let Some(longitude) = resolve(source, product.longitude_candidates())? else {
        return skip_product(product, "longitude");
    };
    let Some(values) = resolve(source, product.value_candidates())? else {
        return skip_product(product, "value");
    };
    let quality = match product.quality_check() {
        QualityCheck::QaFloor(candidates) => match resolve(source, candidates)? {
            Some(qa) => Some(Quality::Floor(qa, filter.qa_threshold)),
            None => return skip_product(product, "qa"),
        },
        QualityCheck::ZeroFlag(candidates) => {
            let flags = resolve(source, candidates)?;
            if flags.is_none() {
                debug!("No quality flag for {}; keeping every pixel", product);
            }
            flags.map(Quality::Flag)
        }
    };

    let pixels = values.len();
    if latitude.len() != pixels
        || longitude.len() != pixels
        || quality.as_ref().is_some_and(|q| q.len() != pixels)
    {
        return Err(SatelliteError::ShapeMismatch {
            product,
            latitude: latitude.len(),
            longitude: longitude.len(),
            values: pixels,
            qa: quality.as_ref().map(Quality::len),
        });
    }

    let observed_at = coverage_start(source);
    let raw_path = raw_path.map(str::to_string);

    let records: Vec<SatelliteRecord> = (0..pixels)
        .filter(|&i| is_valid(values[i]) && is_valid(latitude[i]) && is_valid(longitude[i]))
        .filter(|&i| quality.as_ref().map_or(true, |q| q.passes(i)))
        .filter(|&i| filter.in_bounds(latitude[i], longitude[i]))
        .map(|i| SatelliteRecord {
            product,
            latitude: latitude[i],
            longitude: longitude[i],
            value: values[i],
            observed_at,
            raw_path: raw_path.clone(),
        })
        .collect();

    debug!(
        "Decoded {} of {} pixels for {}",
        records.len(),
        pixels,
        product
    );
    Ok(records)
}

/// Returns the unpacked values of the first candidate present in `source`.
fn resolve(
    source: &impl GridSource,
    candidates: &[&str],
) -> Result<Option<Vec<f64>>, SatelliteError> {
    for path in candidates {
        if let Some(values) = source.read_variable(path)? {
            return Ok(Some(values));
        }
    }
    Ok(None)
}

fn skip_product(
    product: ProductKind,
    role: &str,
) -> Result<Vec<SatelliteRecord>, SatelliteError> {
    warn!(
        "No {} variable found for product {}; skipping granule",
        role, product
    );
    Ok(Vec::new())
}

fn is_valid(value: f64) -> bool {
    value.is_finite() && value.abs() < FILL_THRESHOLD
}

/// Parses the granule start time from the global attributes.
pub fn coverage_start(source: &impl GridSource) -> Option<DateTime<Utc>> {
    COVERAGE_START_ATTRIBUTES
        .iter()
        .filter_map(|name| source.global_attribute(name))
        .find_map(|raw| parse_timestamp(&raw))
}

/// RFC 3339, or a naive ISO timestamp (`T` or space separated) taken as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = raw.trim_end_matches('Z');
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Granule held in memory, keyed by variable path.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryGrid {
        pub variables: HashMap<String, PackedVariable>,
        pub attributes: HashMap<String, String>,
    }

    impl MemoryGrid {
        pub fn with(self, path: &str, values: &[f64]) -> Self {
            self.packed(path, PackedVariable::new(values.to_vec()))
        }

        pub fn packed(mut self, path: &str, variable: PackedVariable) -> Self {
            self.variables.insert(path.to_string(), variable);
            self
        }

        pub fn attribute(mut self, name: &str, value: &str) -> Self {
            self.attributes.insert(name.to_string(), value.to_string());
            self
        }
    }

    impl GridSource for MemoryGrid {
        fn read_packed(&self, path: &str) -> Result<Option<PackedVariable>, SatelliteError> {
            Ok(self.variables.get(path).cloned())
        }

        fn global_attribute(&self, name: &str) -> Option<String> {
            self.attributes.get(name).cloned()
        }
    }

    pub(crate) fn tropomi_no2(qa: &[f64]) -> MemoryGrid {
        let n = qa.len();
        MemoryGrid::default()
            .with("PRODUCT/latitude", &vec![4.7; n])
            .with("PRODUCT/longitude", &vec![-74.0; n])
            .with(
                "PRODUCT/nitrogendioxide_tropospheric_column",
                &(0..n).map(|i| 1.0e-5 * (i + 1) as f64).collect::<Vec<_>>(),
            )
            .with("PRODUCT/qa_value", qa)
            .attribute("time_coverage_start", "2025-01-10T17:05:00Z")
    }

    #[test]
    fn qa_floor_keeps_two_of_three_pixels() {
        let grid = tropomi_no2(&[0.9, 0.5, 0.8]);
        let filter = PixelFilter::builder().qa_threshold(0.75).build();

        let records = decode_grid(&grid, ProductKind::TropomiNo2, &filter, None).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value, 1.0e-5);
        assert_eq!(records[1].value, 1.0e-5 * 3.0);
    }

    #[test]
    fn packed_qa_values_are_scaled_before_the_floor() {
        // TROPOMI stores qa_value as ubyte 0..100 with scale_factor 0.01 and fill 255.
        let qa = PackedVariable {
            scale_factor: Some(0.01),
            fill_values: vec![255.0],
            ..PackedVariable::new(vec![90.0, 50.0, 80.0, 255.0])
        };
        let grid = tropomi_no2(&[0.0; 4]).packed("PRODUCT/qa_value", qa);
        let filter = PixelFilter::builder().qa_threshold(0.75).build();

        let records = decode_grid(&grid, ProductKind::TropomiNo2, &filter, None).unwrap();

        let values: Vec<f64> = records.iter().map(|r| r.value).collect();
        assert_eq!(values, [1.0e-5, 1.0e-5 * 3.0]);
    }

    #[test]
    fn unpacking_applies_offset_and_valid_range() {
        let variable = PackedVariable {
            scale_factor: Some(0.5),
            add_offset: Some(10.0),
            fill_values: vec![-999.0],
            valid_min: Some(0.0),
            valid_max: Some(100.0),
            values: vec![4.0, -999.0, -1.0, 101.0, 100.0],
        };

        let unpacked = variable.unpack();

        assert_eq!(unpacked[0], 12.0);
        assert!(unpacked[1..4].iter().all(|v| v.is_nan()));
        assert_eq!(unpacked[4], 60.0);
    }

    #[test]
    fn tempo_pixels_need_a_zero_quality_flag() {
        let flags = PackedVariable {
            fill_values: vec![-999.0],
            ..PackedVariable::new(vec![0.0, 1.0, 0.0, -999.0])
        };
        let grid = MemoryGrid::default()
            .with("geolocation/latitude", &[4.7; 4])
            .with("geolocation/longitude", &[-74.0; 4])
            .with("product/vertical_column_troposphere", &[1.0e15, 2.0e15, 3.0e15, 4.0e15])
            .packed("product/main_data_quality_flag", flags);

        let records =
            decode_grid(&grid, ProductKind::TempoNo2, &PixelFilter::default(), None).unwrap();

        let values: Vec<f64> = records.iter().map(|r| r.value).collect();
        assert_eq!(values, [1.0e15, 3.0e15]);
    }

    #[test]
    fn every_pixel_shares_the_granule_timestamp() {
        let grid = tropomi_no2(&[1.0, 1.0]);
        let records =
            decode_grid(&grid, ProductKind::TropomiNo2, &PixelFilter::default(), Some("g.nc"))
                .unwrap();

        let expected = parse_timestamp("2025-01-10T17:05:00Z");
        assert!(expected.is_some());
        assert!(records.iter().all(|r| r.observed_at == expected));
        assert!(records.iter().all(|r| r.raw_path.as_deref() == Some("g.nc")));
    }

    #[test]
    fn bounding_box_drops_outside_pixels() {
        let grid = MemoryGrid::default()
            .with("latitude", &[4.6, 5.5, 4.8])
            .with("longitude", &[-74.1, -74.1, -80.0])
            .with("nitrogendioxide_tropospheric_column", &[1.0, 2.0, 3.0])
            .with("qa_value", &[1.0, 1.0, 1.0]);
        let filter = PixelFilter::builder()
            .lat_bounds((4.0, 5.0))
            .lon_bounds((-75.0, -73.0))
            .build();

        let records = decode_grid(&grid, ProductKind::TropomiNo2, &filter, None).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, 1.0);
        assert_eq!(records[0].observed_at, None);
    }

    #[test]
    fn fill_and_nan_pixels_are_dropped() {
        let grid = MemoryGrid::default()
            .with("lat", &[4.7, 4.7, 4.7])
            .with("lon", &[-74.0, -74.0, -74.0])
            .with("product/vertical_column_troposphere", &[9.96921e36, f64::NAN, 3.2e15]);

        let records =
            decode_grid(&grid, ProductKind::TempoNo2, &PixelFilter::default(), None).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, 3.2e15);
    }

    #[test]
    fn missing_value_variable_skips_the_product() {
        let grid = MemoryGrid::default()
            .with("PRODUCT/latitude", &[4.7])
            .with("PRODUCT/longitude", &[-74.0])
            .with("PRODUCT/qa_value", &[1.0]);

        let records =
            decode_grid(&grid, ProductKind::TropomiNo2, &PixelFilter::default(), None).unwrap();

        assert!(records.is_empty());
    }

    #[test]
    fn later_candidate_names_are_tried() {
        let grid = MemoryGrid::default()
            .with("PRODUCT/latitude", &[4.7])
            .with("PRODUCT/longitude", &[-74.0])
            .with("PRODUCT/cloud_fraction_crb", &[0.4])
            .with("PRODUCT/qa_value", &[0.9]);

        let records =
            decode_grid(&grid, ProductKind::TropomiCloud, &PixelFilter::default(), None).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].parameter(), "cloud_fraction");
    }

    #[test]
    fn mismatched_arrays_are_an_error() {
        let grid = MemoryGrid::default()
            .with("latitude", &[4.7, 4.8])
            .with("longitude", &[-74.0])
            .with("nitrogendioxide_tropospheric_column", &[1.0, 2.0])
            .with("qa_value", &[1.0, 1.0]);

        let result = decode_grid(&grid, ProductKind::TropomiNo2, &PixelFilter::default(), None);

        assert!(matches!(result, Err(SatelliteError::ShapeMismatch { .. })));
    }

    #[test]
    fn parses_timestamps_without_offset() {
        let parsed = parse_timestamp("2024-06-01T10:20:30.123456Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-06-01T10:20:30.123456+00:00");
        assert_eq!(
            parse_timestamp("2024-06-01T10:20:30").unwrap().to_rfc3339(),
            "2024-06-01T10:20:30+00:00"
        );
        assert_eq!(
            parse_timestamp("2024-06-01 10:20:30").unwrap().to_rfc3339(),
            "2024-06-01T10:20:30+00:00"
        );
        assert!(parse_timestamp("June").is_none());
    }
}

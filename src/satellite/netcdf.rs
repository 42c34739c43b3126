//! Opens granules from disk.
//!
//! Reading NetCDF needs the system netCDF library, so the reader is only built
//! with the `netcdf` feature; without it every granule reports
//! [`SatelliteError::Unsupported`].

#[cfg(feature = "netcdf")]
use crate::satellite::decode::decode_grid;
use crate::satellite::decode::{PixelFilter, SatelliteRecord};
use crate::satellite::error::SatelliteError;
use crate::satellite::product::ProductKind;
use std::path::Path;

/// Decodes the granule at `path` as `product`. Blocking; call from `spawn_blocking`.
#[cfg(feature = "netcdf")]
pub fn decode_file(
    path: &Path,
    product: ProductKind,
    filter: &PixelFilter,
) -> Result<Vec<SatelliteRecord>, SatelliteError> {
    let granule = reader::NetcdfGranule::open(path)?;
    decode_grid(&granule, product, filter, path.to_str())
}

#[cfg(not(feature = "netcdf"))]
pub fn decode_file(
    path: &Path,
    _product: ProductKind,
    _filter: &PixelFilter,
) -> Result<Vec<SatelliteRecord>, SatelliteError> {
    Err(SatelliteError::Unsupported(path.to_path_buf()))
}

#[cfg(feature = "netcdf")]
mod reader {
    use crate::satellite::decode::{GridSource, PackedVariable};
    use crate::satellite::error::SatelliteError;
    use netcdf::{AttributeValue, Variable};
    use std::path::Path;

    pub struct NetcdfGranule {
        file: netcdf::File,
    }

    impl NetcdfGranule {
        pub fn open(path: &Path) -> Result<Self, SatelliteError> {
            netcdf::open(path)
                .map(|file| Self { file })
                .map_err(|e| SatelliteError::Open(path.to_path_buf(), e.to_string()))
        }
    }

    impl GridSource for NetcdfGranule {
        fn read_packed(&self, path: &str) -> Result<Option<PackedVariable>, SatelliteError> {
            let read_error = |e: netcdf::error::Error| SatelliteError::ReadVariable {
                variable: path.to_string(),
                message: e.to_string(),
            };

            match path.split_once('/') {
                Some((group_name, name)) => {
                    let Some(group) = self.file.group(group_name).map_err(read_error)? else {
                        return Ok(None);
                    };
                    match group.variable(name) {
                        Some(variable) => packed_values(&variable).map(Some).map_err(read_error),
                        None => Ok(None),
                    }
                }
                None => match self.file.variable(path) {
                    Some(variable) => packed_values(&variable).map(Some).map_err(read_error),
                    None => Ok(None),
                },
            }
        }

        fn global_attribute(&self, name: &str) -> Option<String> {
            match self.file.attribute(name)?.value().ok()? {
                AttributeValue::Str(value) => Some(value),
                _ => None,
            }
        }
    }

    /// Stored values converted to `f64` plus the CF packing attributes.
    fn packed_values(variable: &Variable<'_>) -> Result<PackedVariable, netcdf::error::Error> {
        let values = variable.get_values::<f64, _>(..)?;
        let numbers = |name: &str| -> Vec<f64> {
            variable
                .attribute(name)
                .and_then(|attribute| attribute.value().ok())
                .map(numeric_values)
                .unwrap_or_default()
        };

        let valid_range = numbers("valid_range");
        let mut fill_values = numbers("_FillValue");
        fill_values.extend(numbers("missing_value"));

        Ok(PackedVariable {
            values,
            scale_factor: numbers("scale_factor").first().copied(),
            add_offset: numbers("add_offset").first().copied(),
            fill_values,
            valid_min: numbers("valid_min").first().or(valid_range.first()).copied(),
            valid_max: numbers("valid_max").first().or(valid_range.get(1)).copied(),
        })
    }

    fn numeric_values(value: AttributeValue) -> Vec<f64> {
        match value {
            AttributeValue::Uchar(v) => vec![v.into()],
            AttributeValue::Uchars(v) => v.into_iter().map(f64::from).collect(),
            AttributeValue::Schar(v) => vec![v.into()],
            AttributeValue::Schars(v) => v.into_iter().map(f64::from).collect(),
            AttributeValue::Ushort(v) => vec![v.into()],
            AttributeValue::Ushorts(v) => v.into_iter().map(f64::from).collect(),
            AttributeValue::Short(v) => vec![v.into()],
            AttributeValue::Shorts(v) => v.into_iter().map(f64::from).collect(),
            AttributeValue::Uint(v) => vec![v.into()],
            AttributeValue::Uints(v) => v.into_iter().map(f64::from).collect(),
            AttributeValue::Int(v) => vec![v.into()],
            AttributeValue::Ints(v) => v.into_iter().map(f64::from).collect(),
            AttributeValue::Ulonglong(v) => vec![v as f64],
            AttributeValue::Ulonglongs(v) => v.into_iter().map(|v| v as f64).collect(),
            AttributeValue::Longlong(v) => vec![v as f64],
            AttributeValue::Longlongs(v) => v.into_iter().map(|v| v as f64).collect(),
            AttributeValue::Float(v) => vec![v.into()],
            AttributeValue::Floats(v) => v.into_iter().map(f64::from).collect(),
            AttributeValue::Double(v) => vec![v],
            AttributeValue::Doubles(v) => v,
            _ => Vec::new(),
        }
    }
}

//! Canonical pollutant parameters and the fixed mapping from provider names.

use std::fmt;

/// A pollutant the store knows about. Provider parameters that do not map to
/// one of these are dropped at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    Pm25,
    Pm10,
    Co,
    O3,
    No2,
    So2,
}

impl Parameter {
    pub const ALL: [Parameter; 6] = [
        Parameter::Pm25,
        Parameter::Pm10,
        Parameter::Co,
        Parameter::O3,
        Parameter::No2,
        Parameter::So2,
    ];

    /// Maps a provider parameter name onto its canonical parameter.
    ///
    /// ```
    /// use aq_etl::Parameter;
    ///
    /// assert_eq!(Parameter::from_provider("pm25"), Some(Parameter::Pm25));
    /// assert_eq!(Parameter::from_provider("bc"), None);
    /// ```
    pub fn from_provider(name: &str) -> Option<Self> {
        match name {
            "pm25" => Some(Parameter::Pm25),
            "pm10" => Some(Parameter::Pm10),
            "co" => Some(Parameter::Co),
            "o3" => Some(Parameter::O3),
            "no2" => Some(Parameter::No2),
            "so2" => Some(Parameter::So2),
            _ => None,
        }
    }

    /// Canonical column name stored in `measurements.parameter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::Pm25 => "pm25",
            Parameter::Pm10 => "pm10",
            Parameter::Co => "co",
            Parameter::O3 => "o3",
            Parameter::No2 => "no2",
            Parameter::So2 => "so2",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_canonical_name_maps_back_to_itself() {
        for parameter in Parameter::ALL {
            assert_eq!(Parameter::from_provider(parameter.as_str()), Some(parameter));
        }
    }

    #[test]
    fn unknown_and_differently_cased_names_are_unmapped() {
        assert_eq!(Parameter::from_provider("PM25"), None);
        assert_eq!(Parameter::from_provider("temperature"), None);
        assert_eq!(Parameter::from_provider(""), None);
    }
}

//! Identifies which upstream provider a stored row came from.

use std::fmt;

/// Upstream data providers. The string form is what lands in the `source` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAq,
    OpenWeather,
    Tropomi,
    Tempo,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAq => "OpenAQ",
            Provider::OpenWeather => "OpenWeather",
            Provider::Tropomi => "TROPOMI",
            Provider::Tempo => "TEMPO",
        }
    }
}

/// Formats a `Provider` using its stored name.
///
/// ```
/// use aq_etl::Provider;
///
/// assert_eq!(Provider::OpenAq.to_string(), "OpenAQ");
/// ```
impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// The `{"results": [...]}` envelope used by paginated provider endpoints.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    results: Vec<Value>,
}

/// One page of typed records.
///
/// `raw_len` counts what the provider sent, so a page whose records all fail
/// validation is still told apart from the empty page that ends pagination.
#[derive(Debug)]
pub struct Page<T> {
    pub raw_len: usize,
    pub records: Vec<T>,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.raw_len == 0
    }
}

/// Validates every entry of a results page into `T`, skipping (and logging) invalid ones.
pub fn typed_results<T: DeserializeOwned>(body: Value) -> Result<Page<T>, serde_json::Error> {
    let envelope: Envelope = serde_json::from_value(body)?;
    let raw_len = envelope.results.len();
    let records = envelope
        .results
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<T>(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed record: {}", e);
                None
            }
        })
        .collect();
    Ok(Page { raw_len, records })
}

use crate::db::Database;
use crate::http::{ApiRequest, ReqwestTransport, RetryingClient, Transport};
use crate::measurements::error::MeasurementError;
use crate::measurements::store::{store_for_station, StoreOutcome};
use crate::types::measurement::MeasurementRecord;
use crate::types::page::typed_results;
use crate::types::provider::Provider;
use crate::types::station::LocationRecord;
use bon::Builder;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use std::fmt;
use std::time::Duration;

pub const OPENAQ_MEASUREMENTS_URL: &str = "https://api.openaq.org/v3/measurements";

/// Pacing of the per-station measurement feed.
#[derive(Debug, Clone, Copy, PartialEq, Builder)]
pub struct FeedPolicy {
    #[builder(default = 100)]
    pub page_size: u32,
    #[builder(default = Duration::from_millis(1500))]
    pub page_delay: Duration,
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Totals of one ingestion over many stations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Records the feed returned, stored or not.
    pub records: usize,
    pub with_data: usize,
    pub empty: usize,
    pub failed: usize,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records; stations with data: {}, without data: {}, failed: {}",
            self.records, self.with_data, self.empty, self.failed
        )
    }
}

/// Pulls historical readings from the OpenAQ measurement feed.
#[derive(Debug, Clone)]
pub struct MeasurementIngester<T = ReqwestTransport> {
    client: RetryingClient<T>,
    db: Database,
    api_key: Option<String>,
    policy: FeedPolicy,
}

impl<T: Transport> MeasurementIngester<T> {
    pub fn new(
        client: RetryingClient<T>,
        db: Database,
        api_key: Option<String>,
        policy: FeedPolicy,
    ) -> Self {
        Self {
            client,
            db,
            api_key,
            policy,
        }
    }

    /// Pages through the readings of one location between `from` and `to`.
    ///
    /// Returns how many records the feed returned. A 404 means the location
    /// has no data: paging stops and the records seen so far are reported.
    pub async fn fetch_for_station(
        &self,
        location_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page_size: u32,
    ) -> Result<usize, MeasurementError> {
        let mut base = ApiRequest::new(OPENAQ_MEASUREMENTS_URL)
            .query("location_id", location_id)
            .query("limit", page_size);
        if let Some(key) = &self.api_key {
            base = base.header("x-api-key", key);
        }

        let mut total = 0;
        let mut page = 1;
        loop {
            let request = base
                .clone()
                .query("page", page)
                .query("date_from", from.to_rfc3339_opts(SecondsFormat::Secs, true))
                .query("date_to", to.to_rfc3339_opts(SecondsFormat::Secs, true))
                .query("sort", "asc");

            let body = match self.client.get(&request).await {
                Ok(body) => body,
                Err(e) if e.is_not_found() => {
                    info!("No data for location {}; skipping", location_id);
                    return Ok(total);
                }
                Err(e) => return Err(MeasurementError::Feed(e)),
            };

            let records =
                typed_results::<MeasurementRecord>(body).map_err(MeasurementError::Decode)?;
            if records.is_empty() {
                break;
            }
            total += records.raw_len;
            for record in &records.records {
                self.store(record).await;
            }

            page += 1;
            tokio::time::sleep(self.policy.page_delay).await;
        }
        Ok(total)
    }

    /// Runs [`Self::fetch_for_station`] for every location with a provider id.
    ///
    /// A failing location is logged and counted; it does not stop the others.
    pub async fn ingest_all(
        &self,
        locations: &[LocationRecord],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for location in locations {
            let Some(id) = location.id else {
                debug!("Location {:?} has no id; skipping", location.name);
                continue;
            };
            match self
                .fetch_for_station(id, from, to, self.policy.page_size)
                .await
            {
                Ok(0) => summary.empty += 1,
                Ok(count) => {
                    info!("Location {} returned {} records", id, count);
                    summary.with_data += 1;
                    summary.records += count;
                }
                Err(e) => {
                    warn!("Fetching measurements for location {} failed: {}", id, e);
                    summary.failed += 1;
                }
            }
        }
        info!("OpenAQ: {}", summary);
        summary
    }

    async fn store(&self, record: &MeasurementRecord) {
        let Some(measurement) = record.normalize(Provider::OpenAq) else {
            warn!(
                "Parameter {} is not mapped; skipping",
                record.parameter_name()
            );
            return;
        };
        match store_for_station(&self.db, &record.location, &measurement).await {
            Ok(StoreOutcome::Stored) => {}
            Ok(StoreOutcome::UnknownStation) => {
                warn!("Station {} is not in the directory; skipping", record.location)
            }
            Err(e) => warn!(
                "Failed to store {} reading for {}: {}",
                measurement.parameter, record.location, e
            ),
        }
    }
}

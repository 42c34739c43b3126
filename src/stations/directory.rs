use crate::config::Region;
use crate::db::Database;
use crate::http::{ApiRequest, ReqwestTransport, RetryingClient, Transport};
use crate::stations::error::StationError;
use crate::stations::store::insert_station;
use crate::types::page::typed_results;
use crate::types::provider::Provider;
use crate::types::station::{LocationRecord, NewStation};
use bon::Builder;
use chrono::{DateTime, Duration as TimeDelta, Utc};
use log::{debug, info, warn};
use std::time::Duration;

pub const OPENAQ_LOCATIONS_URL: &str = "https://api.openaq.org/v3/locations";

/// Pacing of the location listing.
#[derive(Debug, Clone, Copy, PartialEq, Builder)]
pub struct ListingPolicy {
    #[builder(default = 100)]
    pub page_size: u32,
    #[builder(default = 5)]
    pub max_pages: u32,
    /// Pause between consecutive pages.
    #[builder(default = Duration::from_secs(2))]
    pub page_delay: Duration,
    /// Pause before asking for a rate-limited page again.
    #[builder(default = Duration::from_secs(30))]
    pub rate_limit_wait: Duration,
    /// Total rate-limit waiting allowed for one listing.
    #[builder(default = Duration::from_secs(300))]
    pub rate_limit_budget: Duration,
}

impl Default for ListingPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Finds OpenAQ monitoring locations and records them as stations.
#[derive(Debug, Clone)]
pub struct StationDirectory<T = ReqwestTransport> {
    client: RetryingClient<T>,
    db: Database,
    api_key: Option<String>,
    policy: ListingPolicy,
}

impl<T: Transport> StationDirectory<T> {
    pub fn new(
        client: RetryingClient<T>,
        db: Database,
        api_key: Option<String>,
        policy: ListingPolicy,
    ) -> Self {
        Self {
            client,
            db,
            api_key,
            policy,
        }
    }

    /// Locations registered under `city`/`country`, at most `max_pages` pages.
    pub async fn list_by_region(
        &self,
        city: &str,
        country: &str,
        page_size: u32,
        max_pages: u32,
    ) -> Result<Vec<LocationRecord>, StationError> {
        let request = self
            .request()
            .query("city", city)
            .query("country", country);
        let locations = self.paginate(request, page_size, max_pages).await?;
        info!(
            "Found {} locations for {}, {}",
            locations.len(),
            city,
            country
        );
        Ok(locations)
    }

    /// Locations within `radius_m` metres of a point.
    pub async fn list_by_radius(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: u32,
        page_size: u32,
    ) -> Result<Vec<LocationRecord>, StationError> {
        let request = self
            .request()
            .query("coordinates", format!("{latitude},{longitude}"))
            .query("radius", radius_m);
        let locations = self
            .paginate(request, page_size, self.policy.max_pages)
            .await?;
        info!(
            "Found {} locations within {} m of ({}, {})",
            locations.len(),
            radius_m,
            latitude,
            longitude
        );
        Ok(locations)
    }

    /// The locations to ingest for `region`: the active ones of the region
    /// listing, or the radius listing when none of those is active.
    pub async fn discover(
        &self,
        region: &Region,
        max_age_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<LocationRecord>, StationError> {
        let listed = self
            .list_by_region(
                &region.city,
                &region.country,
                self.policy.page_size,
                self.policy.max_pages,
            )
            .await?;
        let active = filter_active(listed, max_age_days, now);
        info!(
            "{} locations updated within the last {} days",
            active.len(),
            max_age_days
        );
        if !active.is_empty() {
            return Ok(active);
        }

        warn!("No active locations by city; falling back to radius search");
        self.list_by_radius(
            region.latitude,
            region.longitude,
            region.radius_m,
            self.policy.page_size,
        )
        .await
    }

    /// Inserts every derivable station, skipping names already stored.
    ///
    /// Rows are written one by one so a failing row is logged and skipped
    /// without losing the others. Returns how many rows were added.
    pub async fn persist(&self, locations: &[LocationRecord]) -> usize {
        let mut inserted = 0;
        for station in resolve(locations) {
            match insert_station(&self.db, &station).await {
                Ok(true) => inserted += 1,
                Ok(false) => debug!("Station {} already stored", station.name),
                Err(e) => warn!("Failed to store station {}: {}", station.name, e),
            }
        }
        info!(
            "Stored {} new stations out of {} locations",
            inserted,
            locations.len()
        );
        inserted
    }

    fn request(&self) -> ApiRequest {
        let request = ApiRequest::new(OPENAQ_LOCATIONS_URL);
        match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    /// Walks pages `1..=max_pages` until an empty page.
    ///
    /// A rate-limited page is asked for again after `rate_limit_wait`, until the
    /// listing has spent `rate_limit_budget` waiting.
    async fn paginate(
        &self,
        base: ApiRequest,
        page_size: u32,
        max_pages: u32,
    ) -> Result<Vec<LocationRecord>, StationError> {
        let mut locations = Vec::new();
        let mut waited = Duration::ZERO;
        let mut page = 1;

        while page <= max_pages {
            let request = base.clone().query("limit", page_size).query("page", page);
            let body = match self.client.get(&request).await {
                Ok(body) => body,
                Err(e) if e.is_rate_limited() => {
                    let wait = self.policy.rate_limit_wait;
                    if wait.is_zero() || waited + wait > self.policy.rate_limit_budget {
                        return Err(StationError::RateLimitExhausted { waited });
                    }
                    warn!("Rate limited on page {}; waiting {:?}", page, wait);
                    tokio::time::sleep(wait).await;
                    waited += wait;
                    continue;
                }
                Err(e) => return Err(StationError::Listing(e)),
            };

            let records = typed_results::<LocationRecord>(body).map_err(StationError::Decode)?;
            if records.is_empty() {
                break;
            }
            debug!("Page {} returned {} locations", page, records.raw_len);
            locations.extend(records.records);

            page += 1;
            if page <= max_pages {
                tokio::time::sleep(self.policy.page_delay).await;
            }
        }
        Ok(locations)
    }
}

/// Keeps locations last updated at or after `now - max_age_days`.
///
/// Timestamps ahead of `now` are kept; provider clocks drift. Locations without
/// a parseable timestamp are dropped.
pub fn filter_active(
    locations: Vec<LocationRecord>,
    max_age_days: i64,
    now: DateTime<Utc>,
) -> Vec<LocationRecord> {
    let oldest = now - TimeDelta::days(max_age_days);
    locations
        .into_iter()
        .filter(|location| match location.last_seen() {
            Some(seen) => seen >= oldest,
            None => {
                debug!(
                    "Dropping location {:?} without a usable lastUpdated ({:?})",
                    location.name,
                    location.last_seen_raw()
                );
                false
            }
        })
        .collect()
}

/// Station rows for the locations a display name can be derived for.
pub fn resolve(locations: &[LocationRecord]) -> Vec<NewStation> {
    locations
        .iter()
        .filter_map(|location| {
            let station = NewStation::from_location(location, Provider::OpenAq.as_str());
            if station.is_none() {
                warn!("Skipping location without name or id: {:?}", location);
            }
            station
        })
        .collect()
}

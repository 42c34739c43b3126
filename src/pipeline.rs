//! One end-to-end run: stations, measurements, weather, satellite, features.

use crate::config::EtlConfig;
use crate::db::Database;
use crate::error::EtlError;
use crate::features::FeatureAssembler;
use crate::http::{ReqwestTransport, RetryingClient, Transport};
use crate::measurements::{IngestSummary, MeasurementIngester};
use crate::satellite::{GranuleDownloader, SatelliteIngester};
use crate::stations::StationDirectory;
use crate::utils::{ensure_dir_exists, sqlite_file_path};
use crate::weather::WeatherIngester;
use chrono::{DateTime, Duration as TimeDelta, Utc};
use log::{error, info, warn};
use std::fmt;

/// What a run did. Failed stages are listed by name; the stages after them still ran.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub stations_found: usize,
    pub stations_inserted: usize,
    pub measurements: IngestSummary,
    pub weather_rows: u64,
    pub pollution_readings: usize,
    pub satellite_rows: u64,
    pub feature_rows: u64,
    pub failed_stages: Vec<&'static str>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.failed_stages.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stations {} ({} new); measurements {}; weather {}; pollution {}; satellite {}; features {}",
            self.stations_found,
            self.stations_inserted,
            self.measurements,
            self.weather_rows,
            self.pollution_readings,
            self.satellite_rows,
            self.feature_rows
        )?;
        if !self.is_complete() {
            write!(f, "; failed: {}", self.failed_stages.join(", "))?;
        }
        Ok(())
    }
}

pub struct Pipeline<T = ReqwestTransport> {
    config: EtlConfig,
    directory: StationDirectory<T>,
    measurements: MeasurementIngester<T>,
    weather: WeatherIngester<T>,
    satellite: SatelliteIngester,
    features: FeatureAssembler,
}

impl Pipeline<ReqwestTransport> {
    /// Opens the database named in `config` and wires every stage to it.
    pub async fn new(config: EtlConfig) -> Result<Self, EtlError> {
        if let Some(parent) = sqlite_file_path(&config.database_url)
            .as_deref()
            .and_then(|path| path.parent())
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            ensure_dir_exists(parent)
                .await
                .map_err(|e| EtlError::DirCreation(parent.to_path_buf(), e))?;
        }
        let db = Database::connect(&config.database_url).await?;
        let transport = ReqwestTransport::new()?;
        let downloader = GranuleDownloader::new(
            config.granule_base_url.clone(),
            config.granule_token.clone(),
        )?;
        Ok(Self::with_parts(config, db, transport, downloader))
    }
}

impl<T: Transport + Clone> Pipeline<T> {
    pub fn with_parts(
        config: EtlConfig,
        db: Database,
        transport: T,
        downloader: GranuleDownloader,
    ) -> Self {
        let client = RetryingClient::new(transport, config.retry);
        Self {
            directory: StationDirectory::new(
                client.clone(),
                db.clone(),
                config.openaq_api_key.clone(),
                config.listing,
            ),
            measurements: MeasurementIngester::new(
                client.clone(),
                db.clone(),
                config.openaq_api_key.clone(),
                config.feed,
            ),
            weather: WeatherIngester::new(
                client,
                db.clone(),
                config.openweather_api_key.clone(),
                config.region.latitude,
                config.region.longitude,
            ),
            satellite: SatelliteIngester::new(
                downloader,
                db.clone(),
                &config.cache_dir,
                config.pixel_filter,
            ),
            features: FeatureAssembler::new(db),
            config,
        }
    }

    pub async fn run(&self) -> RunSummary {
        self.run_at(Utc::now()).await
    }

    /// Runs every stage once as of `now`. A failing stage is logged and
    /// recorded; the stages after it still run.
    pub async fn run_at(&self, now: DateTime<Utc>) -> RunSummary {
        let mut summary = RunSummary::default();

        let locations = match self
            .directory
            .discover(&self.config.region, self.config.max_station_age_days, now)
            .await
        {
            Ok(locations) => locations,
            Err(e) => {
                error!("Station discovery failed: {}", e);
                summary.failed_stages.push("stations");
                Vec::new()
            }
        };
        if locations.is_empty() {
            warn!("No OpenAQ stations found near the configured region");
        }
        summary.stations_found = locations.len();
        summary.stations_inserted = self.directory.persist(&locations).await;

        let from = now - TimeDelta::days(self.config.history_days);
        info!("Fetching measurements from {} to {}", from, now);
        summary.measurements = self.measurements.ingest_all(&locations, from, now).await;

        match self.weather.fetch_current().await {
            Ok(rows) => summary.weather_rows = rows,
            Err(e) => {
                error!("OpenWeather current failed: {}", e);
                summary.failed_stages.push("weather");
            }
        }
        match self.weather.fetch_pollution().await {
            Ok(readings) => summary.pollution_readings = readings,
            Err(e) => {
                error!("OpenWeather air pollution failed: {}", e);
                summary.failed_stages.push("pollution");
            }
        }

        if self.config.granules.is_empty() {
            info!("No satellite granules configured");
        } else {
            summary.satellite_rows = self.satellite.ingest_all(&self.config.granules).await;
        }
        for path in &self.config.satellite_csv {
            match self.satellite.ingest_csv(path).await {
                Ok(rows) => summary.satellite_rows += rows,
                Err(e) => {
                    error!("Satellite CSV {:?} failed: {}", path, e);
                    if !summary.failed_stages.contains(&"satellite_csv") {
                        summary.failed_stages.push("satellite_csv");
                    }
                }
            }
        }

        match self.features.assemble().await {
            Ok(rows) => summary.feature_rows = rows,
            Err(e) => {
                error!("Feature assembly failed: {}", e);
                summary.failed_stages.push("features");
            }
        }

        summary
    }
}

//! TROPOMI and TEMPO granule ingestion: download, decode, filter, store.
//! Observations already extracted to CSV go through the same store.

pub mod csv_file;
pub mod decode;
pub mod download;
pub mod error;
pub mod netcdf;
pub mod product;
pub mod store;

pub use csv_file::CsvObservation;
pub use decode::{decode_grid, GridSource, PackedVariable, PixelFilter, SatelliteRecord};
pub use download::GranuleDownloader;
pub use error::SatelliteError;
pub use product::{GranuleSource, GranuleSpec, ProductKind, QualityCheck};

use crate::db::Database;
use log::{info, warn};
use std::path::{Path, PathBuf};
use tokio::task;

/// Runs configured granules through download, decode and persist.
#[derive(Debug, Clone)]
pub struct SatelliteIngester {
    downloader: GranuleDownloader,
    db: Database,
    cache_dir: PathBuf,
    filter: PixelFilter,
}

impl SatelliteIngester {
    pub fn new(
        downloader: GranuleDownloader,
        db: Database,
        cache_dir: &Path,
        filter: PixelFilter,
    ) -> Self {
        Self {
            downloader,
            db,
            cache_dir: cache_dir.to_path_buf(),
            filter,
        }
    }

    /// Where the cached copy of `granule` lives.
    pub fn cache_path(&self, granule: &GranuleSpec) -> PathBuf {
        self.cache_dir
            .join(granule.product.name())
            .join(granule.source.file_name())
    }

    /// Downloads (unless cached), decodes and stores one granule.
    ///
    /// A granule that cannot be decoded is logged and yields zero rows; download
    /// and database failures are returned.
    pub async fn ingest(&self, granule: &GranuleSpec) -> Result<u64, SatelliteError> {
        let path = self.cache_path(granule);
        let path = self.downloader.download(&granule.source, &path).await?;

        let records = match decode_blocking(path.clone(), granule.product, self.filter).await? {
            Ok(records) => records,
            Err(e) => {
                warn!("Skipping granule {:?} ({}): {}", path, granule.product, e);
                return Ok(0);
            }
        };

        store::persist(&self.db, &records).await
    }

    /// Stores the observations of a pre-extracted CSV (see [`csv_file`]).
    ///
    /// All usable rows go in one transaction, ignoring ones already stored.
    pub async fn ingest_csv(&self, path: &Path) -> Result<u64, SatelliteError> {
        let owned = path.to_path_buf();
        let observations =
            task::spawn_blocking(move || csv_file::read_observations(&owned)).await??;
        info!(
            "Loaded {} satellite observations from {:?}",
            observations.len(),
            path
        );
        store::persist(&self.db, &observations).await
    }

    /// Ingests every granule in turn; one failing granule does not stop the rest.
    pub async fn ingest_all(&self, granules: &[GranuleSpec]) -> u64 {
        let mut total = 0;
        for granule in granules {
            match self.ingest(granule).await {
                Ok(inserted) => total += inserted,
                Err(e) => warn!(
                    "Granule {} ({:?}) failed: {}",
                    granule.product, granule.source, e
                ),
            }
        }
        info!(
            "Satellite: stored {} observations from {} granules",
            total,
            granules.len()
        );
        total
    }
}

/// Decoding reads whole arrays from disk; keep it off the async workers.
///
/// The outer error is a failed background task; the inner one a bad granule.
async fn decode_blocking(
    path: PathBuf,
    product: ProductKind,
    filter: PixelFilter,
) -> Result<Result<Vec<SatelliteRecord>, SatelliteError>, SatelliteError> {
    Ok(task::spawn_blocking(move || netcdf::decode_file(&path, product, &filter)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ingester(cache_dir: &Path) -> SatelliteIngester {
        SatelliteIngester::new(
            GranuleDownloader::new(None, None).unwrap(),
            Database::in_memory().await.unwrap(),
            cache_dir,
            PixelFilter::default(),
        )
    }

    #[tokio::test]
    async fn cache_path_is_grouped_by_product() {
        let dir = tempfile::tempdir().unwrap();
        let ingester = ingester(dir.path()).await;
        let granule: GranuleSpec = "tempo_no2@https://host/a/TEMPO_NO2_L2.nc".parse().unwrap();

        assert_eq!(
            ingester.cache_path(&granule),
            dir.path().join("tempo_no2").join("TEMPO_NO2_L2.nc")
        );
    }

    #[tokio::test]
    async fn undecodable_granule_yields_zero_rows() {
        let dir = tempfile::tempdir().unwrap();
        let ingester = ingester(dir.path()).await;
        let granule: GranuleSpec = "tropomi_no2@https://host/S5P_broken.nc".parse().unwrap();
        let cached = ingester.cache_path(&granule);
        std::fs::create_dir_all(cached.parent().unwrap()).unwrap();
        std::fs::write(&cached, b"not a netcdf file").unwrap();

        assert_eq!(ingester.ingest(&granule).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn csv_rows_are_stored_once() {
        let dir = tempfile::tempdir().unwrap();
        let ingester = ingester(dir.path()).await;
        let path = dir.path().join("tropomi_sample.csv");
        std::fs::write(
            &path,
            "datetime,lat,lon,pollutant,value,unit,product\n\
             2025-01-10T17:05:00Z,4.71,-74.07,no2,0.00012,mol/m2,S5P_NO2\n\
             2025-01-10T17:05:00Z,4.72,-74.07,no2,0.00015,mol/m2,S5P_NO2\n\
             2025-01-10T17:05:00Z,4.72,-74.07,no2,bad,mol/m2,S5P_NO2\n",
        )
        .unwrap();

        assert_eq!(ingester.ingest_csv(&path).await.unwrap(), 2);
        assert_eq!(ingester.ingest_csv(&path).await.unwrap(), 0);

        let products: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT product FROM satellite_observations")
                .fetch_all(ingester.db.pool())
                .await
                .unwrap();
        assert_eq!(products, ["S5P_NO2"]);
    }

    #[tokio::test]
    async fn failing_granules_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let ingester = ingester(dir.path()).await;
        let granules: Vec<GranuleSpec> = vec![
            "tropomi_co@file-without-base-url".parse().unwrap(),
            "tropomi_o3@another-file-id".parse().unwrap(),
        ];

        assert_eq!(ingester.ingest_all(&granules).await, 0);
    }
}

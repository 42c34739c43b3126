use crate::http::REQUEST_TIMEOUT;
use crate::satellite::error::SatelliteError;
use crate::satellite::product::GranuleSource;
use futures_util::StreamExt;
use log::{info, warn};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Granules are large; the body may take far longer than an API response.
const DOWNLOAD_TIMEOUT_FACTOR: u32 = 30;

/// Fetches granules into a local cache, at most once per destination path.
#[derive(Debug, Clone)]
pub struct GranuleDownloader {
    client: Client,
    base_url: Option<String>,
    token: Option<String>,
}

impl GranuleDownloader {
    pub fn new(base_url: Option<String>, token: Option<String>) -> Result<Self, SatelliteError> {
        let client = Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT * DOWNLOAD_TIMEOUT_FACTOR)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SatelliteError::ClientBuild)?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// The URL a source is fetched from. File ids are appended to the base URL.
    pub fn resolve_url(&self, source: &GranuleSource) -> Result<String, SatelliteError> {
        match source {
            GranuleSource::Url(url) => Ok(url.clone()),
            GranuleSource::FileId(id) => match &self.base_url {
                Some(base) => Ok(format!(
                    "{}/{}",
                    base.trim_end_matches('/'),
                    id.trim_start_matches('/')
                )),
                None => Err(SatelliteError::MissingBaseUrl(id.clone())),
            },
        }
    }

    /// Downloads `source` to `dest` unless `dest` already exists.
    ///
    /// The body is streamed into a temporary file next to `dest` and renamed
    /// into place once complete, so an interrupted download never leaves a
    /// truncated granule behind.
    pub async fn download(
        &self,
        source: &GranuleSource,
        dest: &Path,
    ) -> Result<PathBuf, SatelliteError> {
        if fs::metadata(dest).await.is_ok() {
            info!("Cache hit for granule at {:?}", dest);
            return Ok(dest.to_path_buf());
        }

        let url = self.resolve_url(source)?;
        let dir = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SatelliteError::CacheDirCreation(dir.clone(), e))?;

        info!("Downloading granule from {}", url);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SatelliteError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(match e.status() {
                    Some(status) => SatelliteError::HttpStatus {
                        url,
                        status,
                        source: e,
                    },
                    None => SatelliteError::NetworkRequest(url, e),
                });
            }
        };

        let partial = tempfile::Builder::new()
            .prefix(".granule")
            .suffix(".part")
            .tempfile_in(&dir)
            .map_err(|e| SatelliteError::CacheWrite(dir.clone(), e))?;
        let std_file = partial
            .as_file()
            .try_clone()
            .map_err(|e| SatelliteError::CacheWrite(partial.path().to_path_buf(), e))?;
        let mut file = fs::File::from_std(std_file);

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SatelliteError::NetworkRequest(url.clone(), e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| SatelliteError::CacheWrite(partial.path().to_path_buf(), e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| SatelliteError::CacheWrite(partial.path().to_path_buf(), e))?;
        drop(file);

        partial
            .persist(dest)
            .map_err(|e| SatelliteError::CacheWrite(dest.to_path_buf(), e.error))?;
        info!("Saved {} bytes to {:?}", written, dest);
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn existing_destination_is_not_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("granule.nc");
        std::fs::write(&dest, b"cached").unwrap();

        // No network: an unroutable URL would fail if it were fetched.
        let downloader = GranuleDownloader::new(None, None).unwrap();
        let source = GranuleSource::Url("http://127.0.0.1:9/granule.nc".to_string());
        let path = downloader.download(&source, &dest).await.unwrap();

        assert_eq!(path, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn file_id_without_base_url_fails_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = GranuleDownloader::new(None, None).unwrap();
        let source = GranuleSource::FileId("S5P_NO2_0001".to_string());

        let result = downloader
            .download(&source, &dir.path().join("S5P_NO2_0001.nc"))
            .await;

        assert!(matches!(result, Err(SatelliteError::MissingBaseUrl(id)) if id == "S5P_NO2_0001"));
    }

    #[test]
    fn file_ids_resolve_against_the_base_url() {
        let downloader =
            GranuleDownloader::new(Some("https://archive.example/files/".to_string()), None)
                .unwrap();
        let url = downloader
            .resolve_url(&GranuleSource::FileId("/abc123".to_string()))
            .unwrap();
        assert_eq!(url, "https://archive.example/files/abc123");
    }
}

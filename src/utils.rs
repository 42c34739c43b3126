use log::info;
use std::io;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "aq_etl";
const DATABASE_FILE_NAME: &str = "aq_etl.sqlite";

pub fn get_cache_dir() -> io::Result<PathBuf> {
    dirs::cache_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no system cache directory"))
        .map(|p| p.join(APP_DIR_NAME))
}

pub fn get_data_dir() -> io::Result<PathBuf> {
    dirs::data_local_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no system data directory"))
        .map(|p| p.join(APP_DIR_NAME))
}

/// `sqlite://<data dir>/aq_etl.sqlite`, or a file in the working directory
/// when the platform has no data directory.
pub fn default_database_url() -> String {
    let path = get_data_dir()
        .map(|dir| dir.join(DATABASE_FILE_NAME))
        .unwrap_or_else(|_| PathBuf::from(DATABASE_FILE_NAME));
    format!("sqlite://{}", path.display())
}

pub fn default_cache_dir() -> PathBuf {
    get_cache_dir().unwrap_or_else(|_| PathBuf::from(".aq_etl_cache"))
}

/// The file behind a SQLite URL; `None` for in-memory databases.
pub fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

pub async fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("path exists but is not a directory: {}", path.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls_map_to_files() {
        assert_eq!(
            sqlite_file_path("sqlite:///var/lib/aq/aq.sqlite?mode=rwc"),
            Some(PathBuf::from("/var/lib/aq/aq.sqlite"))
        );
        assert_eq!(
            sqlite_file_path("sqlite:data/aq.sqlite"),
            Some(PathBuf::from("data/aq.sqlite"))
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://localhost/aq"), None);
    }

    #[tokio::test]
    async fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        ensure_dir_exists(&nested).await.unwrap();
        ensure_dir_exists(&nested).await.unwrap();

        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn rejects_a_file_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"").unwrap();

        assert!(ensure_dir_exists(&file).await.is_err());
    }
}

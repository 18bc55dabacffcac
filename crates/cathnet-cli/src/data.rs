use crate::error::{CliError, Result};
use cathnet::data::store::{FetchError, MirrorStore, OfflineStore, RemoteStore, partial_path};
use directories::ProjectDirs;
use futures_util::StreamExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct DataManager {
    base_path: PathBuf,
}

impl DataManager {
    pub fn new() -> Result<Self> {
        let path = Self::determine_data_path()?;
        debug!("DataManager initialized with path: {:?}", &path);
        Ok(Self { base_path: path })
    }

    #[cfg(test)]
    pub fn with_custom_path(path: PathBuf) -> Self {
        Self { base_path: path }
    }

    pub fn get_data_path(&self) -> &Path {
        &self.base_path
    }

    pub fn set_custom_path(path: &Path) -> Result<()> {
        let text = path.to_str().ok_or_else(|| {
            CliError::Argument(format!("Data path {:?} is not valid UTF-8.", path))
        })?;
        let config_path = Self::get_path_config_file()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(config_path, text).map_err(CliError::from)
    }

    pub fn reset_path() -> Result<()> {
        if let Ok(config_path) = Self::get_path_config_file() {
            if config_path.exists() {
                fs::remove_file(config_path)?;
            }
        }
        Ok(())
    }

    fn determine_data_path() -> Result<PathBuf> {
        match Self::get_path_config_file() {
            Ok(config_path) if config_path.exists() => {
                let custom_path_str = fs::read_to_string(&config_path)?.trim().to_string();
                if custom_path_str.is_empty() {
                    warn!("Custom path config file is empty, falling back to default path.");
                    Self::get_default_data_path()
                } else {
                    Ok(PathBuf::from(custom_path_str))
                }
            }
            _ => Self::get_default_data_path(),
        }
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("edu", "caltech", "cathnet")
    }

    fn get_path_config_file() -> Result<PathBuf> {
        Self::project_dirs()
            .map(|dirs| dirs.config_dir().join("path.conf"))
            .ok_or_else(|| CliError::Data("Could not determine config directory path.".to_string()))
    }

    fn get_default_data_path() -> Result<PathBuf> {
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().join("mdcath"))
            .ok_or_else(|| {
                CliError::Data("Could not determine default data directory path.".to_string())
            })
    }
}

/// Picks the store behind a `remote-url`: HTTP(S) URLs are downloaded, anything else is
/// treated as a mirror directory. `None` means local files only.
pub fn remote_store(remote_url: Option<&str>) -> Result<Box<dyn RemoteStore>> {
    match remote_url {
        None => Ok(Box::new(OfflineStore)),
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            Ok(Box::new(HttpStore::new(url)?))
        }
        Some(dir) => Ok(Box::new(MirrorStore::new(dir))),
    }
}

/// Downloads domain files over HTTP.
///
/// Fetching blocks the calling thread on the runtime captured at construction, so it must
/// not be called from an async task (wrap the caller in `block_in_place`).
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    client: reqwest::Client,
    runtime: Handle,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| CliError::Other(anyhow::anyhow!("No async runtime for downloads: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            runtime,
        })
    }

    fn file_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_url, file_name)
    }

    async fn download(&self, url: &str, partial: &Path) -> std::result::Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        let response = response
            .error_for_status()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let mut file = fs::File::create(partial)?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|e| FetchError::Request(e.to_string()))?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
        }
        file.sync_all()?;
        Ok(downloaded)
    }
}

impl RemoteStore for HttpStore {
    fn fetch(&self, file_name: &str, destination: &Path) -> std::result::Result<(), FetchError> {
        let url = self.file_url(file_name);
        let partial = partial_path(destination);
        info!("Sending request to {}", url);

        match self.runtime.block_on(self.download(&url, &partial)) {
            Ok(bytes) => {
                fs::rename(&partial, destination)?;
                debug!(bytes, path = %destination.display(), "Download complete.");
                Ok(())
            }
            Err(e) => {
                if partial.exists() {
                    let _ = fs::remove_file(&partial);
                }
                Err(e)
            }
        }
    }
}

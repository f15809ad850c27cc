//! Byte transports for the fetch layer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::FetchError;

const USER_AGENT: &str = concat!("grapher-data/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches the body of a resource.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<String, FetchError>;
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if !resp.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }

        resp.text().map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: format!("failed to read body: {e}"),
        })
    }
}

/// Serves resources from a local directory.
///
/// A URL is mapped to a file by dropping any `file://` prefix and query
/// string, then taking the path relative to `root` (absolute paths are used
/// as-is). With `DataApiConfig::new(dir)` this reads `{dir}/{id}.data.json`.
#[derive(Debug, Clone)]
pub struct FileTransport {
    root: PathBuf,
}

impl FileTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = url.strip_prefix("file://").unwrap_or(url);
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        let path = Path::new(path);
        if path.is_absolute() || path.starts_with(&self.root) {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Transport for FileTransport {
    fn get(&self, url: &str) -> Result<String, FetchError> {
        let path = self.resolve(url);
        std::fs::read_to_string(&path).map_err(|e| FetchError::Io {
            path: path.display().to_string(),
            kind: e.kind(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_transport_reads_relative_and_prefixed_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("5.data.json"), "{}").unwrap();
        let transport = FileTransport::new(dir.path());

        assert_eq!(transport.get("5.data.json").unwrap(), "{}");

        let absolute = format!("file://{}/5.data.json?nocache", dir.path().display());
        assert_eq!(transport.get(&absolute).unwrap(), "{}");
    }

    #[test]
    fn file_transport_maps_missing_files_to_permanent_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FileTransport::new(dir.path());
        let err = transport.get("404.data.json").unwrap_err();
        assert!(matches!(
            err,
            FetchError::Io {
                kind: std::io::ErrorKind::NotFound,
                ..
            }
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_file_fails_on_the_first_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FileTransport::new(dir.path());
        let policy = crate::data::RetryPolicy {
            max_attempts: 3,
            base_delay: std::time::Duration::from_secs(5),
            max_delay: std::time::Duration::from_secs(5),
        };
        let started = std::time::Instant::now();
        let mut attempts = 0;
        let out = policy.run(|| {
            attempts += 1;
            transport.get("404.data.json")
        });
        assert!(out.is_err());
        assert_eq!(attempts, 1);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }
}

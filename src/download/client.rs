//! Blocking HTTP session for fetching pages into memory and files onto disk.
//!
//! Each [Downloader] owns its client and connection pool; there is no process-wide
//! setup or teardown. Cloning is cheap and clones share the pool.

use super::error::DownloadError;
use super::progress::Progress;
use reqwest::Url;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Browser user agent sent with every request unless overridden.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.77 Safari/537.36 Edg/91.0.864.37";
/// System CA bundle added on top of the built-in and native roots when present.
pub const DEFAULT_CA_FILE: &str = "/etc/ssl/certs/ca-certificates.crt";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
const MAX_REDIRECTS: usize = 10;
const CHUNK_SIZE: usize = 16 * 1024;

/// Blocking HTTP session. Follows redirects, verifies TLS, never uses a proxy.
#[derive(Debug, Clone)]
pub struct Downloader {
    inner: reqwest::blocking::Client,
}

impl Downloader {
    /// Build a downloader with the default user agent, timeouts and CA setup.
    pub fn new() -> Result<Self, DownloadError> {
        Self::builder().build()
    }

    pub fn builder() -> DownloaderBuilder {
        DownloaderBuilder::default()
    }

    /// GET `url` and return the body decoded as text.
    ///
    /// Charset comes from the Content-Type header, UTF-8 otherwise. An empty body is an error.
    pub fn get_page(&self, url: &str) -> Result<String, DownloadError> {
        let response = self.send(url)?;
        let text = response.text().map_err(|source| DownloadError::Transfer {
            url: url.to_string(),
            source,
        })?;
        if text.is_empty() {
            return Err(DownloadError::EmptyResponse {
                url: url.to_string(),
            });
        }
        tracing::debug!(url, bytes = text.len(), "page fetched");
        Ok(text)
    }

    /// GET `url` and return the raw body. An empty body is an error.
    pub fn get_page_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self.send(url)?;
        let body = response.bytes().map_err(|source| DownloadError::Transfer {
            url: url.to_string(),
            source,
        })?;
        if body.is_empty() {
            return Err(DownloadError::EmptyResponse {
                url: url.to_string(),
            });
        }
        tracing::debug!(url, bytes = body.len(), "page fetched");
        Ok(body.to_vec())
    }

    /// GET `url` and write the body to `path`. Returns the number of bytes written.
    pub fn get_file(&self, url: &str, path: impl AsRef<Path>) -> Result<u64, DownloadError> {
        self.get_file_with_progress(url, path, None)
    }

    /// Like [Downloader::get_file], calling `progress` after every chunk written.
    ///
    /// The destination is opened (created or truncated) before any request is made, so an
    /// unwritable path fails without touching the network. If anything fails after that,
    /// the partial file is removed. A zero-byte result is an error.
    pub fn get_file_with_progress(
        &self,
        url: &str,
        path: impl AsRef<Path>,
        progress: Option<&dyn Fn(Progress)>,
    ) -> Result<u64, DownloadError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| DownloadError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let result = self.stream_to_file(url, path, file, progress);
        if result.is_err() {
            discard_partial(path);
        }
        result
    }

    fn stream_to_file(
        &self,
        url: &str,
        path: &Path,
        file: File,
        progress: Option<&dyn Fn(Progress)>,
    ) -> Result<u64, DownloadError> {
        let mut response = self.send(url)?;
        let total = response.content_length();
        let write_err = |source| DownloadError::FileWrite {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = BufWriter::new(file);
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut downloaded: u64 = 0;
        loop {
            let n = match response.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(DownloadError::BodyRead {
                        url: url.to_string(),
                        source,
                    })
                }
            };
            writer.write_all(&buf[..n]).map_err(write_err)?;
            downloaded += n as u64;
            if let Some(cb) = progress {
                cb(Progress { downloaded, total });
            }
        }
        let file = writer
            .into_inner()
            .map_err(|e| write_err(e.into_error()))?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        let size = std::fs::metadata(path).map_err(write_err)?.len();
        if size == 0 {
            return Err(DownloadError::EmptyFile {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!(url, path = %path.display(), bytes = size, "file fetched");
        Ok(size)
    }

    /// Send a GET and require a success status.
    fn send(&self, url: &str) -> Result<reqwest::blocking::Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(url, "GET");
        let response = self
            .inner
            .get(parsed)
            .send()
            .map_err(|source| DownloadError::Transfer {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        tracing::debug!(url, status = status.as_u16(), final_url = %response.url(), "response");
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

fn discard_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove partial file"),
    }
}

/// Builder for [Downloader] with optional User-Agent, timeouts, redirect limit and CA bundle.
#[derive(Debug)]
pub struct DownloaderBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
    connect_timeout_secs: u64,
    max_redirects: usize,
    ca_file: Option<PathBuf>,
}

impl Default for DownloaderBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_redirects: MAX_REDIRECTS,
            ca_file: None,
        }
    }
}

impl DownloaderBuilder {
    /// Start from defaults and apply every key present in `config`.
    pub fn from_config(config: &crate::config::Config) -> Self {
        let mut builder = Self::default();
        if let Some(ua) = &config.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout_secs(secs);
        }
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout_secs(secs);
        }
        if let Some(n) = config.max_redirects {
            builder = builder.max_redirects(n);
        }
        if let Some(path) = &config.ca_file {
            builder = builder.ca_file(path.clone());
        }
        builder
    }

    /// Set a custom User-Agent. If not set, [DEFAULT_USER_AGENT] is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Whole-request timeout in seconds, body included. 0 disables it. Default 60.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Connect timeout in seconds. 0 disables it. Default 15.
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Maximum redirects to follow before failing. Default 10.
    pub fn max_redirects(mut self, n: usize) -> Self {
        self.max_redirects = n;
        self
    }

    /// Extra PEM bundle of trusted CAs. Failing to load it fails [DownloaderBuilder::build].
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Downloader, DownloadError> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let mut builder = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .no_proxy()
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .timeout(secs_or_none(self.timeout_secs))
            .connect_timeout(secs_or_none(self.connect_timeout_secs));

        match &self.ca_file {
            Some(path) => {
                let certs = load_pem_bundle(path).map_err(|reason| DownloadError::CaBundle {
                    path: path.clone(),
                    reason,
                })?;
                for cert in certs {
                    builder = builder.add_root_certificate(cert);
                }
            }
            None => {
                let path = Path::new(DEFAULT_CA_FILE);
                if path.exists() {
                    match load_pem_bundle(path) {
                        Ok(certs) => {
                            for cert in certs {
                                builder = builder.add_root_certificate(cert);
                            }
                        }
                        Err(reason) => {
                            tracing::warn!(path = DEFAULT_CA_FILE, %reason, "skipping system CA bundle")
                        }
                    }
                }
            }
        }

        let inner = builder
            .build()
            .map_err(|source| DownloadError::Client { source })?;
        Ok(Downloader { inner })
    }
}

fn secs_or_none(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn load_pem_bundle(path: &Path) -> Result<Vec<reqwest::Certificate>, String> {
    let pem = std::fs::read(path).map_err(|e| e.to_string())?;
    let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| e.to_string())?;
    if certs.is_empty() {
        return Err("no certificates found".to_string());
    }
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::ErrorKind;

    #[test]
    fn downloader_is_send_sync_and_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<Downloader>();
    }

    #[test]
    fn secs_or_none_treats_zero_as_disabled() {
        assert_eq!(secs_or_none(0), None);
        assert_eq!(secs_or_none(5), Some(Duration::from_secs(5)));
    }

    #[test]
    fn from_config_applies_present_keys_only() {
        let config = crate::config::Config {
            user_agent: Some("Custom/1.0".to_string()),
            timeout_secs: Some(5),
            ..Default::default()
        };
        let b = DownloaderBuilder::from_config(&config);
        assert_eq!(b.user_agent.as_deref(), Some("Custom/1.0"));
        assert_eq!(b.timeout_secs, 5);
        assert_eq!(b.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(b.max_redirects, MAX_REDIRECTS);
        assert!(b.ca_file.is_none());
    }

    #[test]
    fn missing_ca_file_is_initialization_failure() {
        let result = Downloader::builder()
            .ca_file("/nonexistent_kepub_dir/ca.pem")
            .build();
        match result {
            Err(e) => assert_eq!(e.kind(), ErrorKind::InitializationFailure),
            Ok(_) => panic!("expected CaBundle error"),
        }
    }

    #[test]
    fn ca_file_without_certificates_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pem");
        std::fs::write(&path, "not a certificate\n").unwrap();
        let result = Downloader::builder().ca_file(&path).build();
        assert!(matches!(result, Err(DownloadError::CaBundle { .. })));
    }

    #[test]
    fn invalid_url_is_initialization_failure() {
        let client = Downloader::new().unwrap();
        let err = client.get_page("not a url").unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }));
        assert_eq!(err.kind(), ErrorKind::InitializationFailure);
    }

    #[test]
    fn connection_refused_is_transfer_failure() {
        let client = Downloader::builder().connect_timeout_secs(2).build().unwrap();
        let err = client.get_page_bytes("http://127.0.0.1:1/").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransferFailure);
    }

    #[test]
    fn unwritable_destination_fails_before_request() {
        let client = Downloader::new().unwrap();
        // Unroutable URL: reaching the network would surface as a transfer error instead.
        let err = client
            .get_file(
                "http://127.0.0.1:1/cover.jpg",
                "/nonexistent_kepub_dir/cover.jpg",
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileOpenFailure);
    }
}

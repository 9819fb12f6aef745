//! Error type for page and file retrieval.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse failure category. Every [DownloadError] maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client or request could not be set up (bad URL, TLS setup, CA bundle).
    InitializationFailure,
    /// Transport or protocol failure, non-success status, or a failed write while streaming.
    TransferFailure,
    /// Memory fetch produced an empty body.
    EmptyResponse,
    /// Destination file could not be opened for writing.
    FileOpenFailure,
    /// File fetch produced a zero-byte file.
    EmptyFile,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    // Setup
    #[error("Invalid URL: {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to create HTTP client: {source}")]
    Client { source: reqwest::Error },

    #[error("Could not load CA bundle {}: {reason}", .path.display())]
    CaBundle { path: PathBuf, reason: String },

    // Transfer
    #[error("Request failed: {url}: {source}")]
    Transfer { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead { url: String, source: std::io::Error },

    #[error("Empty response body: {url}")]
    EmptyResponse { url: String },

    // Destination file
    #[error("Cannot open file for writing: {}: {source}", .path.display())]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write file: {}: {source}", .path.display())]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Downloaded file is empty: {}", .path.display())]
    EmptyFile { path: PathBuf },
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::InvalidUrl { .. }
            | DownloadError::Client { .. }
            | DownloadError::CaBundle { .. } => ErrorKind::InitializationFailure,
            DownloadError::Transfer { .. }
            | DownloadError::HttpStatus { .. }
            | DownloadError::BodyRead { .. }
            | DownloadError::FileWrite { .. } => ErrorKind::TransferFailure,
            DownloadError::EmptyResponse { .. } => ErrorKind::EmptyResponse,
            DownloadError::FileOpen { .. } => ErrorKind::FileOpenFailure,
            DownloadError::EmptyFile { .. } => ErrorKind::EmptyFile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn kinds_cover_setup_transfer_and_file_failures() {
        let invalid = DownloadError::InvalidUrl {
            url: "nope".into(),
            reason: "relative URL without a base".into(),
        };
        assert_eq!(invalid.kind(), ErrorKind::InitializationFailure);

        let status = DownloadError::HttpStatus {
            status: 404,
            url: "https://www.esjzone.cc/x".into(),
        };
        assert_eq!(status.kind(), ErrorKind::TransferFailure);

        let write = DownloadError::FileWrite {
            path: PathBuf::from("out.jpg"),
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(write.kind(), ErrorKind::TransferFailure);

        let open = DownloadError::FileOpen {
            path: PathBuf::from("/nonexistent/out.jpg"),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert_eq!(open.kind(), ErrorKind::FileOpenFailure);

        assert_eq!(
            DownloadError::EmptyResponse { url: "u".into() }.kind(),
            ErrorKind::EmptyResponse
        );
        assert_eq!(
            DownloadError::EmptyFile {
                path: PathBuf::from("a")
            }
            .kind(),
            ErrorKind::EmptyFile
        );
    }

    #[test]
    fn file_open_message_names_path_and_os_error() {
        let e = DownloadError::FileOpen {
            path: PathBuf::from("/nonexistent/cover.jpg"),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        let msg = e.to_string();
        assert!(msg.contains("/nonexistent/cover.jpg"));
        assert!(msg.contains("No such file or directory"));
    }
}

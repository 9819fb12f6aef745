//! HTTP retrieval: pages into memory, files onto disk.

mod client;
mod error;
mod progress;

pub use client::{Downloader, DownloaderBuilder, DEFAULT_CA_FILE, DEFAULT_USER_AGENT};
pub use error::{DownloadError, ErrorKind};
pub use progress::{progress_bar, update_bar, Progress};

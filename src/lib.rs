//! kepub: page and file retrieval over HTTP, and HTML-to-XML normalization for ESJ Zone pages.

pub mod config;
pub mod download;
pub mod html;
pub mod logging;

// Re-exports for consumers.
pub use config::{load_config, Config, ConfigError};
pub use download::{Downloader, DownloaderBuilder, DownloadError, ErrorKind, Progress};
pub use html::{get_node_texts, html_to_xml, HtmlError, XmlDocument};

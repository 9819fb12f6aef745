//! Progress reporting for file downloads.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Snapshot passed to the progress callback after each chunk is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes written to the destination so far.
    pub downloaded: u64,
    /// Expected size from Content-Length, if the server sent one.
    pub total: Option<u64>,
}

impl Progress {
    /// Fraction complete in `0.0..=1.0`, or None when the total is unknown or zero.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some((self.downloaded as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }
}

/// Terminal progress bar for a download. Byte bar when `total` is known, spinner otherwise.
pub fn progress_bar(total: Option<u64>) -> ProgressBar {
    let (bar, template) = match total {
        Some(len) => (
            ProgressBar::new(len),
            "{spinner} {msg} [{bar:40}] {bytes}/{total_bytes} ({elapsed})",
        ),
        None => (ProgressBar::new_spinner(), "{spinner} {msg} {bytes} ({elapsed})"),
    };
    let style = ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .progress_chars("█▉▊▋▌▍▎▏ ");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Move `bar` to the state described by `progress`, picking up a late-known total.
/// The message shows the percentage when the total is known.
pub fn update_bar(bar: &ProgressBar, progress: Progress) {
    if let Some(total) = progress.total {
        if bar.length() != Some(total) {
            bar.set_length(total);
        }
    }
    bar.set_position(progress.downloaded);
    if let Some(fraction) = progress.fraction() {
        bar.set_message(format!("{:.0}%", fraction * 100.0));
    }
}

//! Logging init: `tracing` events to stderr, filtered by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,kepub=debug"
    } else {
        "warn"
    }
}

/// Install a stderr subscriber. Returns false if a global subscriber was already set,
/// in which case nothing changes.
pub fn init_logging() -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_noop() {
        init_logging();
        assert!(!init_logging());
    }
}

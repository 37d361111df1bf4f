//! Tracing subscriber setup shared by every consumer of the clients

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global fmt subscriber; `RUST_LOG` overrides the `info` default.
///
/// Returns an error if a global subscriber is already set.
pub fn try_init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .try_init()
}

/// Like [`try_init_tracing`] but ignores an already-installed subscriber
pub fn init_tracing() {
    let _ = try_init_tracing();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        init_tracing();
        assert!(try_init_tracing().is_err());
    }
}

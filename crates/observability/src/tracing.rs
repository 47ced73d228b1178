//! JSON subscriber with env-based filtering.

use tracing_subscriber::EnvFilter;

pub(crate) const DEFAULT_FILTER: &str = "info";

/// `RUST_LOG` wins; otherwise `fallback`, otherwise `info`.
pub fn env_filter(fallback: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        fallback
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
    })
}

/// Installs the global subscriber. A second call is a no-op.
pub fn init(fallback: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

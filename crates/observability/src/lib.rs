//! Process-wide logging setup shared by every stockwise binary and test.

/// Initialize structured logging with `RUST_LOG` or `info`.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(None);
}

/// Like [`init`], falling back to `filter` (e.g. the configured
/// `log_filter`) when `RUST_LOG` is unset.
pub fn init_with_filter(filter: &str) {
    tracing::init(Some(filter));
}

/// Subscriber construction.
pub mod tracing;

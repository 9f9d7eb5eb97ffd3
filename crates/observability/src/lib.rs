//! Process-wide tracing setup shared by binaries and tests.

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Initialize process-wide tracing with an explicit filter directive, falling
/// back to `RUST_LOG` (default `info`) when `filter` is `None`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init_with_filter(filter: Option<&str>) {
    tracing::init(filter);
}

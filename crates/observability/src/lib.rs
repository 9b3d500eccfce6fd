//! Shared tracing setup for binaries and integration tests.

/// Install the process-wide subscriber.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (filters, formatting).
pub mod tracing;

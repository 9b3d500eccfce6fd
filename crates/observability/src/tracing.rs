//! Subscriber initialization.
//!
//! Ledger operations log as JSON lines. The filter comes from `RUST_LOG`,
//! falling back to [`DEFAULT_FILTER`].

use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

pub fn init() {
    init_with(default_filter());
}

/// Install a JSON subscriber using `filter`. No-op if one is already set.
pub fn init_with(filter: EnvFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_target(true)
        .try_init();
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_with(EnvFilter::new("debug"));
        init();
        ::tracing::info!(owner = "product#1", "subscriber installed");
    }
}

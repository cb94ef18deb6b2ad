//! Tracing bootstrap for the prober binary.

// crates.io
use tracing_subscriber::EnvFilter;

/// Install the global subscriber; `RUST_LOG` is honoured, defaulting to `info`.
///
/// Repeated calls become no-ops so tests can initialise freely.
pub fn init() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

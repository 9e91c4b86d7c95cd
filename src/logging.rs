//! Diagnostic logging setup.
//!
//! Logs go to stderr so stdout carries only answers. `RUST_LOG` overrides
//! the default level.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter without `--verbose`.
pub const DEFAULT_FILTER: &str = "warn";

/// Default filter with `--verbose`.
pub const VERBOSE_FILTER: &str = "warn,kb_rag=debug";

/// Installs the global subscriber. Later calls are no-ops.
pub fn init(verbose: bool) {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}

// lib: framelink user library - framed point-to-point messaging over TCP
//
// Re-exports the frame protocol and the transport, and owns process-wide
// logging setup for binaries and tests built on top of it.

// Re-export core protocol and types
pub use framelink_core::*;

// Re-export transport abstractions
pub use framelink_transport::*;

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `debug`, `framelink_transport=trace`).
pub const LOG_ENV: &str = "FRAMELINK_LOG";

const DEFAULT_LOG_FILTER: &str = "info";

static LOGGING: OnceCell<()> = OnceCell::new();

/// Install the global fmt subscriber. Later calls are no-ops, as is a call
/// made after some other subscriber was already installed.
pub fn init_logging() {
    LOGGING.get_or_init(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
            .is_ok();

        if installed {
            tracing::debug!(filter_env = LOG_ENV, "logging initialised");
        }
    });
}

// Transport module: framed message transport over blocking byte streams

// Connection diagnostics: `info` when the transport's debug flag is set, `trace` otherwise
macro_rules! diag {
    ($debug:expr, $($arg:tt)+) => {
        if $debug {
            tracing::info!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    };
}

pub mod config;
pub mod error;
pub mod stream;
pub mod tcp;
pub mod traits;

pub use config::*;
pub use error::*;
pub use stream::*;
pub use tcp::*;
pub use traits::*;

// Error taxonomy: construction failures vs failures on an established connection
use framelink_core::FrameError;
use std::io;
use thiserror::Error;

/// Failed to establish the connection. No transport is returned.
#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error("failed to resolve {host}:{port}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind listener on port {port}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept a peer on port {port}")]
    Accept {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to configure connection to {peer}")]
    Configure {
        peer: String,
        #[source]
        source: io::Error,
    },
}

impl ConstructionError {
    /// The underlying OS error, whichever stage failed.
    pub fn io_error(&self) -> &io::Error {
        match self {
            ConstructionError::Resolve { source, .. }
            | ConstructionError::Connect { source, .. }
            | ConstructionError::Bind { source, .. }
            | ConstructionError::Accept { source, .. }
            | ConstructionError::Configure { source, .. } => source,
        }
    }
}

/// A send or receive failed on an established connection.
///
/// Everything except `Closed` and `MessageTooLarge` leaves the framing state
/// of the connection unspecified; the caller should close it.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("message of {len} bytes does not fit in a 4-byte length prefix")]
    MessageTooLarge { len: usize },

    #[error("peer announced a {len} byte frame, limit is {max}")]
    FrameTooLarge { len: u32, max: u32 },

    #[error("connection ended mid-frame: expected {expected} bytes, got {received}")]
    Truncated { expected: usize, received: usize },

    #[error("read timed out")]
    TimedOut,

    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::TimedOut,
            _ => TransportError::Io(err),
        }
    }
}

impl From<FrameError> for TransportError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::PayloadTooLarge { len } => TransportError::MessageTooLarge { len },
            FrameError::ExceedsLimit { len, max } => TransportError::FrameTooLarge { len, max },
        }
    }
}

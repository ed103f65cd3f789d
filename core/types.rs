// Core types used across all framelink components
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which side of the connection a transport was built as.
/// Fixed at construction and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Actively connects to a remote host:port.
    Connector,
    /// Binds a local port on every interface and waits for one peer.
    Listener,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Connector => write!(f, "CONNECTOR"),
            Role::Listener => write!(f, "LISTENER"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}', expected connector or listener")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "connector" | "connect" | "client" => Ok(Role::Connector),
            "listener" | "listen" | "server" => Ok(Role::Listener),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// Outcome of a single receive.
///
/// `Message(vec![])` is a frame whose length prefix was zero; it is never
/// confused with `EndOfStream`, which means the peer closed its side cleanly
/// before starting another frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Message(Vec<u8>),
    EndOfStream,
}

impl Received {
    pub fn into_message(self) -> Option<Vec<u8>> {
        match self {
            Received::Message(bytes) => Some(bytes),
            Received::EndOfStream => None,
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Received::EndOfStream)
    }
}

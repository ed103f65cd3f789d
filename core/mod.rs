// Core module: frame header codec and shared types (NO I/O dependencies)
pub mod types;
pub mod protocol;

pub use types::*;
pub use protocol::*;

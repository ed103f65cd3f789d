// Frame protocol - pure data structures, no I/O
//
// Frame := LENGTH (4 bytes, unsigned, big-endian) || PAYLOAD (LENGTH bytes)
use thiserror::Error;

/// Size of the length prefix on the wire.
pub const HEADER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("payload of {len} bytes does not fit in a 4-byte length prefix")]
    PayloadTooLarge { len: usize },

    #[error("frame announces {len} bytes, limit is {max}")]
    ExceedsLimit { len: u32, max: u32 },
}

// Length prefix (4 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub len: u32,
}

impl FrameHeader {
    pub fn for_payload(len: usize) -> Result<Self, FrameError> {
        let len = u32::try_from(len).map_err(|_| FrameError::PayloadTooLarge { len })?;
        Ok(FrameHeader { len })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        self.len.to_be_bytes()
    }

    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        FrameHeader {
            len: u32::from_be_bytes(bytes),
        }
    }

    /// Reject frames above a receive-side limit, if one is configured.
    pub fn check_limit(&self, max: Option<u32>) -> Result<(), FrameError> {
        match max {
            Some(max) if self.len > max => Err(FrameError::ExceedsLimit { len: self.len, max }),
            _ => Ok(()),
        }
    }

    pub fn payload_len(&self) -> usize {
        self.len as usize
    }
}

/// Build a complete frame (prefix followed by payload) in one buffer.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let header = FrameHeader::for_payload(payload.len())?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(payload);
    Ok(bytes)
}

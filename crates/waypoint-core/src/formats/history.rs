//! Binary history files.
//!
//! Format: Header (5 bytes) + postcard-serialized `HistoryStore`.
//! - 4 bytes: Magic ("WPHS")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is parsed, so a
//! corrupted or hostile file cannot trigger large allocations.

use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES};
use crate::replay::HistoryStore;
use crate::WaypointError;

/// Maximum accepted file size (64 MB).
pub const MAX_HISTORY_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

const HEADER_SIZE: usize = 5;

/// The header preceding every history payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl HistoryHeader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), WaypointError> {
        if &self.magic != MAGIC_BYTES {
            return Err(WaypointError::DeserializationError(
                "not a history file (bad magic bytes)".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(WaypointError::DeserializationError(format!(
                "unsupported history version {} (expected {FORMAT_VERSION})",
                self.version
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WaypointError> {
        let Some(header) = bytes.get(..HEADER_SIZE) else {
            return Err(WaypointError::DeserializationError(
                "history header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for HistoryHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a store to bytes (header + payload).
pub fn history_to_bytes(store: &HistoryStore) -> Result<Vec<u8>, WaypointError> {
    let payload =
        postcard::to_stdvec(store).map_err(|e| WaypointError::SerializationError(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&HistoryHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Deserialize a store from bytes.
pub fn history_from_bytes(bytes: &[u8]) -> Result<HistoryStore, WaypointError> {
    if bytes.len() > MAX_HISTORY_PAYLOAD_SIZE {
        return Err(WaypointError::DeserializationError(format!(
            "history of {} bytes exceeds the {MAX_HISTORY_PAYLOAD_SIZE} byte limit",
            bytes.len()
        )));
    }
    HistoryHeader::from_bytes(bytes)?.validate()?;

    postcard::from_bytes(&bytes[HEADER_SIZE..])
        .map_err(|e| WaypointError::DeserializationError(format!("corrupt history payload: {e}")))
}

//! # History Files
//!
//! Reading and writing recorded histories. Binary files start with the
//! `WPHS` magic; anything else is parsed as JSON.

use std::path::Path;
use waypoint_core::primitives::MAGIC_BYTES;
use waypoint_core::{HistoryStore, WaypointError, history_from_bytes, history_to_bytes};

/// Maximum history file size (64 MB).
const MAX_HISTORY_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// On-disk encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFormat {
    Binary,
    Json,
}

impl HistoryFormat {
    /// Detect the encoding from the leading bytes.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(MAGIC_BYTES) {
            HistoryFormat::Binary
        } else {
            HistoryFormat::Json
        }
    }

    pub fn parse(name: &str) -> Result<Self, WaypointError> {
        match name {
            "binary" | "bin" => Ok(HistoryFormat::Binary),
            "json" => Ok(HistoryFormat::Json),
            other => Err(WaypointError::InvalidConfig(format!(
                "unknown history format '{other}' (use binary or json)"
            ))),
        }
    }
}

/// Decode a history from bytes in either format.
pub fn decode_history(bytes: &[u8]) -> Result<HistoryStore, WaypointError> {
    match HistoryFormat::detect(bytes) {
        HistoryFormat::Binary => history_from_bytes(bytes),
        HistoryFormat::Json => serde_json::from_slice(bytes)
            .map_err(|e| WaypointError::DeserializationError(format!("history json: {e}"))),
    }
}

/// Encode a history in `format`.
pub fn encode_history(store: &HistoryStore, format: HistoryFormat) -> Result<Vec<u8>, WaypointError> {
    match format {
        HistoryFormat::Binary => history_to_bytes(store),
        HistoryFormat::Json => serde_json::to_vec_pretty(store)
            .map_err(|e| WaypointError::SerializationError(format!("history json: {e}"))),
    }
}

pub fn load_history(path: &Path) -> Result<HistoryStore, WaypointError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| WaypointError::IoError(format!("{}: {e}", path.display())))?;
    if metadata.len() > MAX_HISTORY_FILE_SIZE {
        return Err(WaypointError::DeserializationError(format!(
            "history file {} exceeds {MAX_HISTORY_FILE_SIZE} bytes",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)
        .map_err(|e| WaypointError::IoError(format!("{}: {e}", path.display())))?;
    let store = decode_history(&bytes)?;
    tracing::debug!(
        path = %path.display(),
        patterns = store.len(),
        records = store.record_count(),
        "history loaded"
    );
    Ok(store)
}

pub fn save_history(
    path: &Path,
    store: &HistoryStore,
    format: HistoryFormat,
) -> Result<(), WaypointError> {
    let bytes = encode_history(store, format)?;
    std::fs::write(path, bytes)
        .map_err(|e| WaypointError::IoError(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::{ActionKind, ActionRecord, Match, Region, Similarity};

    fn store() -> HistoryStore {
        let mut store = HistoryStore::new();
        store.record(
            "ok_button",
            ActionRecord::new(
                ActionKind::Find,
                vec![Match::new(Region::new(1, 2, 3, 4), Similarity::from_percent(91))],
            )
            .in_state("Dialog"),
        );
        store
    }

    #[test]
    fn detects_binary_by_magic() {
        let bytes = encode_history(&store(), HistoryFormat::Binary).expect("encode");
        assert_eq!(HistoryFormat::detect(&bytes), HistoryFormat::Binary);
        assert_eq!(HistoryFormat::detect(b"{}"), HistoryFormat::Json);
    }

    #[test]
    fn json_and_binary_decode_to_the_same_store() {
        let original = store();
        let json = encode_history(&original, HistoryFormat::Json).expect("json");
        let binary = encode_history(&original, HistoryFormat::Binary).expect("binary");
        assert_eq!(decode_history(&json).expect("json"), decode_history(&binary).expect("binary"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_history(b"not a history").is_err());
    }

    #[test]
    fn format_names() {
        assert_eq!(HistoryFormat::parse("bin").expect("bin"), HistoryFormat::Binary);
        assert!(HistoryFormat::parse("yaml").is_err());
    }
}

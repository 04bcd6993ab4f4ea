//! # Formats
//!
//! On-disk representation of recorded histories. Pure transformations only;
//! file I/O lives in the app layer.

mod history;

pub use history::{
    HistoryHeader, MAX_HISTORY_PAYLOAD_SIZE, history_from_bytes, history_to_bytes,
};

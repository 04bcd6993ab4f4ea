//! # Engine Primitives
//!
//! Hardcoded runtime constants for the waypoint engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Configuration layers may override the defaults per step, but never the
//! bounds.

/// Upper bound of the similarity scale, in basis points (100.00%).
pub const SIMILARITY_SCALE: u16 = 10_000;

/// Default minimum similarity for Find-family steps (70.00%).
pub const DEFAULT_MIN_SIMILARITY: u16 = 7_000;

/// Interval between provider calls while a step polls under `max_wait`.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Maximum number of hops in a single navigation plan.
///
/// Plans are computationally bounded; longer paths are reported as
/// unreachable.
pub const MAX_PATH_LENGTH: usize = 1000;

/// Maximum number of steps in one flattened action chain.
pub const MAX_CHAIN_STEPS: usize = 256;

/// Maximum number of fixpoint passes performed by match fusion.
pub const MAX_FUSION_PASSES: usize = 64;

/// Magic bytes for the binary history file header.
///
/// - File Header = Magic Bytes ("WPHS") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"WPHS";

/// Current history file format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for state and pattern names.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum number of registered states in one graph.
pub const MAX_STATES: usize = 100_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_similarity_is_on_scale() {
        assert!(DEFAULT_MIN_SIMILARITY <= SIMILARITY_SCALE);
    }

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"WPHS");
    }
}

//! # Core Type Definitions
//!
//! This module contains the value types shared by every engine component:
//! - Graph identifiers (`StateId`, `TransitionId`)
//! - Geometry (`Region`, `Location`) and similarity scores (`Similarity`)
//! - Perception targets and outcomes (`Pattern`, `Match`, `ObjectCollection`)
//! - Error types (`WaypointError`, `AdapterError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they key `BTreeMap`/`BTreeSet` collections
//! - Are value objects: copies never alias the original

mod element;
mod geometry;

pub use element::{Match, ObjectCollection, Pattern};
pub use geometry::{Location, Region};

use crate::primitives::SIMILARITY_SCALE;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Identifier of a registered State.
///
/// Assigned sequentially at registration; lower ids were registered first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(pub u64);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a registered Transition. Encodes insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub u64);

// =============================================================================
// SIMILARITY
// =============================================================================

/// Match similarity in basis points (`0..=10000`, where 10000 is 100%).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Similarity(u16);

impl Similarity {
    /// A perfect score, used for targets that are known rather than searched.
    pub const EXACT: Self = Self(SIMILARITY_SCALE);

    /// Create a score from basis points, clamped to the scale.
    #[must_use]
    pub const fn from_basis_points(bp: u16) -> Self {
        if bp > SIMILARITY_SCALE {
            Self(SIMILARITY_SCALE)
        } else {
            Self(bp)
        }
    }

    /// Create a score from a whole percentage, clamped to 100.
    #[must_use]
    pub const fn from_percent(percent: u8) -> Self {
        Self::from_basis_points((percent as u16).saturating_mul(100))
    }

    /// Get the raw basis point value.
    #[must_use]
    pub const fn basis_points(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by Perception Provider and Actuator implementations.
///
/// These indicate that the automation environment itself is broken
/// (no display, lost input device). They are never used for "not found".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The environment cannot serve the request (no display, no session).
    #[error("Environment unavailable: {0}")]
    Environment(String),

    /// The adapter does not implement the requested primitive.
    #[error("Unsupported primitive: {0}")]
    Unsupported(String),
}

/// Errors that can occur in the waypoint engine.
///
/// - Perception misses and failed navigation are NOT errors; they are
///   reported through `ActionResult` and `NavigationOutcome`
/// - Configuration errors are raised at registration time only
/// - Adapter errors are propagated, never swallowed
#[derive(Debug, Error)]
pub enum WaypointError {
    /// A definition references a state that was never registered.
    #[error("Unknown state: {0}")]
    UnknownState(String),

    /// Two states were registered under the same name.
    #[error("Duplicate state: {0}")]
    DuplicateState(String),

    /// A state was registered without an incoming verification chain.
    #[error("State '{0}' has no incoming verification chain")]
    MissingVerification(String),

    /// A transition definition is structurally invalid.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A configuration value is out of bounds or malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A perception or actuation adapter failed.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_clamps_to_scale() {
        assert_eq!(Similarity::from_basis_points(20_000), Similarity::EXACT);
        assert_eq!(Similarity::from_percent(250), Similarity::EXACT);
        assert_eq!(Similarity::from_percent(85).basis_points(), 8_500);
    }

    #[test]
    fn similarity_display() {
        assert_eq!(Similarity::from_basis_points(8_750).to_string(), "87.50%");
    }

    #[test]
    fn adapter_error_converts() {
        let err: WaypointError = AdapterError::Environment("no display".into()).into();
        assert!(matches!(err, WaypointError::Adapter(_)));
        assert!(err.to_string().contains("no display"));
    }
}

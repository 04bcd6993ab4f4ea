//! # Adapter Contracts
//!
//! The engine never touches the screen or input devices itself. It consumes
//! two injected adapters:
//! - `PerceptionProvider`: locates patterns on screen (or in recorded history)
//! - `Actuator`: performs input primitives
//!
//! Adapters return `AdapterError` only when the environment itself is broken.
//! "Not found" is an empty match list; a primitive that ran but had no effect
//! returns `Ok(false)`.

use crate::action::{ActionKind, FindStrategy, MouseButton};
use crate::{AdapterError, Location, Match, Pattern, Region, Similarity};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// PERCEPTION
// =============================================================================

/// Parameters forwarded to the perception provider for one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindOptions {
    /// Kind of the step that triggered the search.
    pub kind: ActionKind,
    pub strategy: FindStrategy,
    pub min_similarity: Similarity,
    /// Names of the states active when the search was issued.
    pub active_states: Vec<String>,
}

/// Locates patterns.
pub trait PerceptionProvider: Send {
    /// Find candidate matches of `pattern`, restricted to `search_region`
    /// when one is given.
    fn find(
        &mut self,
        pattern: &Pattern,
        search_region: Option<Region>,
        options: &FindOptions,
    ) -> Result<Vec<Match>, AdapterError>;
}

// =============================================================================
// ACTUATION
// =============================================================================

/// Performs input primitives.
pub trait Actuator: Send {
    fn click(
        &mut self,
        location: Location,
        clicks: u32,
        button: MouseButton,
    ) -> Result<bool, AdapterError>;

    fn move_to(&mut self, location: Location) -> Result<bool, AdapterError>;

    fn type_text(&mut self, text: &str, modifiers: &[String]) -> Result<bool, AdapterError>;

    fn drag(&mut self, from: Location, to: Location) -> Result<bool, AdapterError>;

    fn key_down(&mut self, key: &str, modifiers: &[String]) -> Result<bool, AdapterError>;

    fn key_up(&mut self, key: &str) -> Result<bool, AdapterError>;

    /// Visual feedback only. Adapters without a display may ignore it.
    fn highlight(&mut self, _region: Region, _duration: Duration) -> Result<bool, AdapterError> {
        Ok(true)
    }
}

/// A primitive performed by [`RecordingActuator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "primitive", rename_all = "snake_case")]
pub enum Primitive {
    Click {
        at: Location,
        clicks: u32,
        button: MouseButton,
    },
    Move {
        to: Location,
    },
    Type {
        text: String,
        modifiers: Vec<String>,
    },
    Drag {
        from: Location,
        to: Location,
    },
    KeyDown {
        key: String,
        modifiers: Vec<String>,
    },
    KeyUp {
        key: String,
    },
    Highlight {
        region: Region,
    },
}

/// Actuator used in replay mode: performs nothing and logs every primitive.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    performed: Vec<Primitive>,
}

impl RecordingActuator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Primitives in the order they were requested.
    #[must_use]
    pub fn performed(&self) -> &[Primitive] {
        &self.performed
    }

    /// Drain the log.
    pub fn take(&mut self) -> Vec<Primitive> {
        std::mem::take(&mut self.performed)
    }

    fn log(&mut self, primitive: Primitive) -> Result<bool, AdapterError> {
        tracing::debug!(?primitive, "replay actuation");
        self.performed.push(primitive);
        Ok(true)
    }
}

impl Actuator for RecordingActuator {
    fn click(
        &mut self,
        location: Location,
        clicks: u32,
        button: MouseButton,
    ) -> Result<bool, AdapterError> {
        self.log(Primitive::Click {
            at: location,
            clicks,
            button,
        })
    }

    fn move_to(&mut self, location: Location) -> Result<bool, AdapterError> {
        self.log(Primitive::Move { to: location })
    }

    fn type_text(&mut self, text: &str, modifiers: &[String]) -> Result<bool, AdapterError> {
        self.log(Primitive::Type {
            text: text.to_string(),
            modifiers: modifiers.to_vec(),
        })
    }

    fn drag(&mut self, from: Location, to: Location) -> Result<bool, AdapterError> {
        self.log(Primitive::Drag { from, to })
    }

    fn key_down(&mut self, key: &str, modifiers: &[String]) -> Result<bool, AdapterError> {
        self.log(Primitive::KeyDown {
            key: key.to_string(),
            modifiers: modifiers.to_vec(),
        })
    }

    fn key_up(&mut self, key: &str) -> Result<bool, AdapterError> {
        self.log(Primitive::KeyUp {
            key: key.to_string(),
        })
    }

    fn highlight(&mut self, region: Region, _duration: Duration) -> Result<bool, AdapterError> {
        self.log(Primitive::Highlight { region })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_actuator_keeps_order() {
        let mut actuator = RecordingActuator::new();
        actuator
            .click(Location::new(1, 2), 2, MouseButton::Right)
            .expect("click");
        actuator.type_text("abc", &["shift".to_string()]).expect("type");
        actuator.key_up("enter").expect("key up");

        assert_eq!(actuator.performed().len(), 3);
        assert_eq!(
            actuator.performed()[0],
            Primitive::Click {
                at: Location::new(1, 2),
                clicks: 2,
                button: MouseButton::Right
            }
        );

        let drained = actuator.take();
        assert_eq!(drained.len(), 3);
        assert!(actuator.performed().is_empty());
    }
}

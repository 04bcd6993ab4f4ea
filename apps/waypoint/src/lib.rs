//! # Waypoint
//!
//! The application layer around `waypoint-core`: the declarative model
//! loader, history file I/O, the state monitor and the CLI.

pub mod cli;
pub mod history;
pub mod model;
pub mod monitor;

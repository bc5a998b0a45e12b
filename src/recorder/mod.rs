//! Recorder module for capturing browser interactions as recipes
//!
//! This module provides:
//! - DOM snapshots delivered by the driver with each interaction
//! - Unique CSS selector synthesis for the interacted element
//! - Step stream reduction (one fill per field)
//! - The capture state machine and the recording controller

pub mod commands;
pub mod dom;
pub mod reducer;
pub mod selector;
pub mod session;

pub use commands::{parse_command, spawn_command_reader, ControlCommand};
pub use dom::{Document, DomNode, NodePath};
pub use reducer::{collapse_fills, Reducer};
pub use selector::SelectorSynthesizer;
pub use session::{Capture, RecordOptions, Recorder, RecorderState, RecordingOutcome, RecordingSession};
